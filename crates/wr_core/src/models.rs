use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Host every admitted article URL has to reference.
pub const ARTICLE_HOST: &str = "mp.weixin.qq.com";

/// Topic used when an album page carries no label.
pub const DEFAULT_TOPIC: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub content: String,
    pub url: String,
    pub topic: String,
    pub publish_time: DateTime<Utc>,
    pub create_time: DateTime<Utc>,
}

impl Article {
    /// Placeholder title for the `position`-th (1-based) item of a listing.
    pub fn untitled(position: usize) -> String {
        format!("Untitled article {}", position)
    }

    pub fn is_platform_url(url: &str) -> bool {
        !url.is_empty() && url.contains(ARTICLE_HOST)
    }
}

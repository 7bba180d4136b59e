use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use scraper::Selector;
use sha2::{Digest, Sha256};
use wr_core::{Article, Error, Result};
use crate::cancel::Cancellation;

pub mod weixin;

pub use weixin::{PipelineConfig, WeixinAlbumScraper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMetadata {
    pub name: &'static str,
    pub emoji: &'static str,
}

#[async_trait]
pub trait Scraper: Send + Sync {
    fn source_metadata(&self) -> SourceMetadata;

    /// Returns true if this scraper can handle the given URL
    fn can_handle(&self, url: &str) -> bool;

    /// Fetches every article reachable from a listing URL.
    async fn fetch_articles(&self, url: &str, cancel: Cancellation) -> Result<Vec<Article>>;

    /// Returns a list of CLI shorthand names for this scraper
    fn cli_names(&self) -> Vec<&str> {
        vec![]
    }
}

/// How article ids are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdScheme {
    /// `article_<hash>` from the article URL; stable across runs.
    #[default]
    UrlDigest,
    /// `article_<unix seconds>_<ordinal>`; may collide between runs in the same second.
    Timestamped,
}

impl std::str::FromStr for IdScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "url" | "url-digest" => Ok(IdScheme::UrlDigest),
            "timestamp" | "timestamped" => Ok(IdScheme::Timestamped),
            other => Err(Error::InvalidInput(format!("Unknown id scheme: {}", other))),
        }
    }
}

/// Shared state of one extraction call.
#[derive(Debug, Clone)]
pub struct ExtractionRun {
    pub started_at: DateTime<Utc>,
    pub id_scheme: IdScheme,
}

impl ExtractionRun {
    pub fn new(id_scheme: IdScheme) -> Self {
        Self::at(Utc::now(), id_scheme)
    }

    pub fn at(started_at: DateTime<Utc>, id_scheme: IdScheme) -> Self {
        Self { started_at, id_scheme }
    }

    pub fn article_id(&self, url: &str, ordinal: usize) -> String {
        match self.id_scheme {
            IdScheme::UrlDigest => {
                let digest = Sha256::digest(url.as_bytes());
                let hex = digest.iter().take(10).map(|b| format!("{:02x}", b)).collect::<String>();
                format!("article_{}", hex)
            }
            IdScheme::Timestamped => format!("article_{}_{}", self.started_at.timestamp(), ordinal),
        }
    }

    pub fn article(&self, ordinal: usize, title: String, url: String, topic: &str, publish_time: Option<DateTime<Utc>>) -> Article {
        Article {
            id: self.article_id(&url, ordinal),
            title,
            author: String::new(),
            content: String::new(),
            url,
            topic: topic.to_string(),
            publish_time: publish_time.unwrap_or(self.started_at),
            create_time: self.started_at,
        }
    }
}

/// Common utilities for scrapers
pub(crate) mod utils {
    use super::*;

    pub fn selector(selector: &str) -> Result<Selector> {
        Selector::parse(selector)
            .map_err(|e| Error::Parse(format!("Invalid selector {}: {}", selector, e)))
    }

    /// Parses a `YYYY-MM-DD` listing date as midnight UTC.
    pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
        let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()?;
        Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
    }

    pub fn parse_unix_seconds(value: &str) -> Option<DateTime<Utc>> {
        let seconds = value.trim().parse::<i64>().ok()?;
        Utc.timestamp_opt(seconds, 0).single()
    }

    pub fn title_or_placeholder(title: Option<&str>, position: usize) -> String {
        match title.map(str::trim) {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => Article::untitled(position),
        }
    }
}

use async_trait::async_trait;
use crate::models::Article;
use crate::Result;

#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Insert or replace articles by id. All rows land or none do.
    async fn upsert_articles(&self, articles: &[Article]) -> Result<()>;

    /// All stored articles, newest `create_time` first.
    async fn list_articles(&self) -> Result<Vec<Article>>;

    /// Stored articles of one topic, newest `create_time` first.
    async fn list_by_topic(&self, topic: &str) -> Result<Vec<Article>>;

    /// Distinct non-empty topics in ascending order.
    async fn list_topics(&self) -> Result<Vec<String>>;
}

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use wr_core::{Article, ArticleStorage, Result};

#[derive(Default)]
pub struct MemoryStore {
    articles: Vec<Article>,
}

impl MemoryStore {
    pub fn upsert(&mut self, incoming: &[Article]) {
        for article in incoming {
            if let Some(existing) = self.articles.iter_mut().find(|a| a.id == article.id) {
                *existing = article.clone();
            } else {
                self.articles.push(article.clone());
            }
        }
    }

    fn sorted<'a>(&self, articles: impl Iterator<Item = &'a Article>) -> Vec<Article> {
        let mut articles = articles.cloned().collect::<Vec<_>>();
        articles.sort_by(|a, b| b.create_time.cmp(&a.create_time));
        articles
    }

    pub fn list(&self) -> Vec<Article> {
        self.sorted(self.articles.iter())
    }

    pub fn list_by_topic(&self, topic: &str) -> Vec<Article> {
        self.sorted(self.articles.iter().filter(|a| a.topic == topic))
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics = self.articles.iter()
            .map(|a| a.topic.clone())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>();
        topics.sort();
        topics.dedup();
        topics
    }
}

/// Process-local store, used by tests and `--storage memory`.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStorage for InMemoryStorage {
    async fn upsert_articles(&self, articles: &[Article]) -> Result<()> {
        self.store.write().await.upsert(articles);
        Ok(())
    }

    async fn list_articles(&self) -> Result<Vec<Article>> {
        Ok(self.store.read().await.list())
    }

    async fn list_by_topic(&self, topic: &str) -> Result<Vec<Article>> {
        Ok(self.store.read().await.list_by_topic(topic))
    }

    async fn list_topics(&self) -> Result<Vec<String>> {
        Ok(self.store.read().await.topics())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn article(id: &str, topic: &str, minutes: i64) -> Article {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes);
        Article {
            id: id.to_string(),
            title: format!("Article {}", id),
            author: String::new(),
            content: String::new(),
            url: format!("https://mp.weixin.qq.com/s/{}", id),
            topic: topic.to_string(),
            publish_time: created,
            create_time: created,
        }
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = InMemoryStorage::new();
        storage.upsert_articles(&[article("a", "Rust", 0), article("b", "Go", 5)]).await.unwrap();

        let listed = storage.list_articles().await.unwrap();
        assert_eq!(listed.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(storage.list_topics().await.unwrap(), vec!["Go", "Rust"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let storage = InMemoryStorage::new();
        storage.upsert_articles(&[article("a", "Rust", 0)]).await.unwrap();

        let mut renamed = article("a", "Rust", 0);
        renamed.title = "Renamed".to_string();
        storage.upsert_articles(&[renamed]).await.unwrap();

        let listed = storage.list_articles().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Renamed");
    }

    #[tokio::test]
    async fn test_list_by_topic() {
        let storage = InMemoryStorage::new();
        storage
            .upsert_articles(&[article("a", "Rust", 0), article("b", "Go", 1), article("c", "Rust", 2)])
            .await
            .unwrap();

        let rust = storage.list_by_topic("Rust").await.unwrap();
        assert_eq!(rust.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), vec!["c", "a"]);
    }
}

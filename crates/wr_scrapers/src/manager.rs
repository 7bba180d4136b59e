use std::sync::Arc;
use tracing::info;
use wr_core::{Article, ArticleStorage, Error, Result};
use crate::cancel::Cancellation;
use crate::fetcher::{FetcherConfig, PageFetcher};
use crate::scrapers::{PipelineConfig, Scraper, WeixinAlbumScraper};

/// Routes listing URLs to a scraper and persists what comes back.
pub struct ScraperManager {
    storage: Arc<dyn ArticleStorage>,
    scrapers: Vec<Arc<dyn Scraper>>,
}

impl ScraperManager {
    pub fn new(storage: Arc<dyn ArticleStorage>) -> Self {
        Self {
            storage,
            scrapers: Vec::new(),
        }
    }

    /// Manager with the WeChat album scraper talking to the real platform.
    pub fn with_default_scrapers(
        storage: Arc<dyn ArticleStorage>,
        fetcher: &FetcherConfig,
        pipeline: PipelineConfig,
    ) -> Result<Self> {
        let source = Arc::new(PageFetcher::new(fetcher)?);
        let mut manager = Self::new(storage);
        manager.add_scraper(Arc::new(WeixinAlbumScraper::new(source, pipeline)));
        Ok(manager)
    }

    pub fn add_scraper(&mut self, scraper: Arc<dyn Scraper>) {
        self.scrapers.push(scraper);
    }

    pub fn scrapers(&self) -> &[Arc<dyn Scraper>] {
        &self.scrapers
    }

    pub fn storage(&self) -> Arc<dyn ArticleStorage> {
        self.storage.clone()
    }

    pub fn get_scraper_for_url(&self, url: &str) -> Result<Arc<dyn Scraper>> {
        self.scrapers
            .iter()
            .find(|s| s.can_handle(url))
            .cloned()
            .ok_or_else(|| Error::InvalidInput(format!("No scraper found for URL: {}", url)))
    }

    /// Scrapes `url` and upserts the result in one batch.
    pub async fn fetch_and_store(&self, url: &str, cancel: Cancellation) -> Result<Vec<Article>> {
        let scraper = self.get_scraper_for_url(url)?;
        let meta = scraper.source_metadata();
        let articles = scraper.fetch_articles(url, cancel).await?;

        self.storage.upsert_articles(&articles).await?;
        info!("{} 💾 Stored {} articles from {}", meta.emoji, articles.len(), meta.name);
        Ok(articles)
    }
}

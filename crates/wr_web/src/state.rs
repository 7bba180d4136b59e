use std::path::PathBuf;
use std::sync::Arc;
use wr_core::{ArticleStorage, Result};
use wr_scrapers::{FetcherConfig, PageFetcher, ScraperManager};
use crate::proxy::Upstream;

pub struct AppState {
    pub manager: Arc<ScraperManager>,
    /// Client used by the article and resource proxies.
    pub upstream: Arc<dyn Upstream>,
    /// Root holding `static/` and `templates/index.html`.
    pub static_dir: PathBuf,
}

impl AppState {
    /// State whose proxies talk to the platform with a desktop browser profile.
    pub fn new(manager: ScraperManager, static_dir: impl Into<PathBuf>) -> Result<Self> {
        let upstream = PageFetcher::new(&FetcherConfig::browser())?;
        Ok(Self::with_upstream(manager, Arc::new(upstream), static_dir))
    }

    pub fn with_upstream(
        manager: ScraperManager,
        upstream: Arc<dyn Upstream>,
        static_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            manager: Arc::new(manager),
            upstream,
            static_dir: static_dir.into(),
        }
    }

    pub fn storage(&self) -> Arc<dyn ArticleStorage> {
        self.manager.storage()
    }
}

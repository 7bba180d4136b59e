pub mod cancel;
pub mod cli;
pub mod fetcher;
pub mod logging;
pub mod manager;
pub mod scrapers;

pub use cancel::{cancellation, CancelHandle, Cancellation};
pub use cli::{handle_command, ScraperArgs, ScraperCommands};
pub use fetcher::{FetcherConfig, PageFetcher, PageRequest, PageResponse, PageSource};
pub use manager::ScraperManager;
pub use scrapers::{IdScheme, PipelineConfig, Scraper, WeixinAlbumScraper};

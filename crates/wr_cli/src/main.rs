use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use wr_scrapers::cli::{handle_command, ScraperArgs};
use wr_scrapers::scrapers::weixin::MIN_PAGE_DELAY;
use wr_scrapers::{FetcherConfig, IdScheme, PipelineConfig, ScraperManager};
use wr_web::AppState;

/// Parses `--page-delay`; only delays at or above the album API minimum are accepted.
fn parse_page_delay(value: &str) -> std::result::Result<Duration, String> {
    let delay = humantime::parse_duration(value).map_err(|e| e.to_string())?;
    if delay < MIN_PAGE_DELAY {
        return Err(format!(
            "page delay must be at least {}",
            humantime::format_duration(MIN_PAGE_DELAY)
        ));
    }
    Ok(delay)
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Scrapes WeChat article albums into a local store", long_about = None)]
pub struct Cli {
    /// Storage backend: sqlite or memory
    #[arg(long, global = true, env = "WR_STORAGE", default_value = "sqlite")]
    storage: String,
    /// SQLite database file
    #[arg(long, global = true, env = "WR_DATABASE", default_value = "data.db")]
    database: PathBuf,
    /// Override the user agent sent to the platform
    #[arg(long, global = true, env = "WR_USER_AGENT")]
    user_agent: Option<String>,
    /// Per-request timeout (e.g. 10s, 1m)
    #[arg(long, global = true, env = "WR_TIMEOUT", value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
    /// Pause between album API pages (at least 2s)
    #[arg(long, global = true, env = "WR_PAGE_DELAY", default_value = "2s", value_parser = parse_page_delay)]
    page_delay: Duration,
    /// Article id scheme: url or timestamp
    #[arg(long, global = true, env = "WR_ID_SCHEME", default_value = "url")]
    id_scheme: IdScheme,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API, proxies and static front end
    Serve {
        #[arg(long, env = "WR_BIND", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,
        /// Directory holding static/ and templates/index.html
        #[arg(long, env = "WR_STATIC_DIR", default_value = "web")]
        static_dir: PathBuf,
    },
    /// Scrape from the command line
    Scrape(ScraperArgs),
}

impl Cli {
    fn fetcher_config(&self) -> FetcherConfig {
        let mut config = FetcherConfig::default();
        if let Some(user_agent) = &self.user_agent {
            config = config.with_user_agent(user_agent.clone());
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        config
    }

    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            page_delay: self.page_delay,
            id_scheme: self.id_scheme,
            ..PipelineConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wr_scrapers::logging::init_logging();
    let cli = Cli::parse();

    let storage = wr_storage::create_storage(cli.storage.as_str(), Some(cli.database.as_path())).await?;
    info!("💾 Storage initialized (using {})", cli.storage);

    let manager = ScraperManager::with_default_scrapers(storage, &cli.fetcher_config(), cli.pipeline_config())?;
    let scraper_names = manager
        .scrapers()
        .iter()
        .map(|s| s.source_metadata().name)
        .collect::<Vec<_>>();
    info!("🦗 Scrapers initialized: {}", scraper_names.join(", "));

    match cli.command {
        Commands::Serve { bind, static_dir } => {
            let state = AppState::new(manager, static_dir)?;
            wr_web::serve(state, bind).await?;
        }
        Commands::Scrape(args) => handle_command(args, &manager).await?,
    }

    Ok(())
}

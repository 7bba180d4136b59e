use clap::{Args, Subcommand};
use wr_core::{Article, Result};
use crate::cancel::cancellation;
use crate::manager::ScraperManager;

#[derive(Args, Debug, Clone)]
pub struct ScraperArgs {
    #[command(subcommand)]
    pub command: ScraperCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ScraperCommands {
    /// Scrape an album URL and store its articles
    Url {
        url: String,
    },
    /// Print stored articles, newest first
    Articles {
        /// Only articles of this topic
        #[arg(long)]
        topic: Option<String>,
    },
    /// Print stored topics
    Topics,
    /// List available scrapers
    List,
}

fn print_article(article: &Article) {
    println!(
        "{} [{}] {} - {}",
        article.publish_time.format("%Y-%m-%d"),
        article.topic,
        article.title,
        article.url
    );
}

pub async fn handle_command(args: ScraperArgs, manager: &ScraperManager) -> Result<()> {
    match args.command {
        ScraperCommands::Url { url } => {
            let (handle, cancel) = cancellation();
            let interrupt = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, stopping after the current page");
                    handle.cancel();
                }
            });

            let result = manager.fetch_and_store(&url, cancel).await;
            interrupt.abort();

            let articles = result?;
            println!("Found {} articles", articles.len());
            for article in &articles {
                print_article(article);
            }
        }
        ScraperCommands::Articles { topic } => {
            let storage = manager.storage();
            let articles = match topic {
                Some(topic) => storage.list_by_topic(&topic).await?,
                None => storage.list_articles().await?,
            };
            for article in &articles {
                print_article(article);
            }
        }
        ScraperCommands::Topics => {
            for topic in manager.storage().list_topics().await? {
                println!("{}", topic);
            }
        }
        ScraperCommands::List => {
            println!("Available scrapers:");
            for scraper in manager.scrapers() {
                let meta = scraper.source_metadata();
                println!("  {} {} ({})", meta.emoji, meta.name, scraper.cli_names().join(", "));
            }
        }
    }
    Ok(())
}

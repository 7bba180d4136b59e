use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wr_core::{Article, Error, Result, ARTICLE_HOST};
use crate::cancel::Cancellation;
use crate::fetcher::{PageRequest, PageSource};
use crate::logging::Logger;
use crate::scrapers::{ExtractionRun, IdScheme, Scraper, SourceMetadata};

pub mod album;
pub mod pagination;

pub use album::{parse_album_page, AlbumPage, ArticleSet, Cursor, ExtractionStrategy};
pub use pagination::{PaginationWalker, WalkFailure, WalkRequest, ALBUM_API, MIN_PAGE_DELAY};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub album_page_size: u32,
    /// Gap between two album API requests; never shorter than [`MIN_PAGE_DELAY`].
    pub page_delay: Duration,
    pub id_scheme: IdScheme,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            album_page_size: 10,
            page_delay: MIN_PAGE_DELAY,
            id_scheme: IdScheme::default(),
        }
    }
}

/// Album scraper for `mp.weixin.qq.com` pages.
pub struct WeixinAlbumScraper {
    source: Arc<dyn PageSource>,
    config: PipelineConfig,
}

impl WeixinAlbumScraper {
    pub fn new(source: Arc<dyn PageSource>, config: PipelineConfig) -> Self {
        Self { source, config }
    }

    pub fn album_id(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()?
            .query_pairs()
            .find(|(key, _)| key == "album_id")
            .map(|(_, value)| value.into_owned())
            .filter(|id| !id.is_empty())
    }

    /// Fetches the album page, extracts the seed articles and walks the album
    /// API for the rest. Only the initial page can fail the call; a failed
    /// walk is logged and whatever was collected is still returned.
    pub async fn fetch_articles(&self, source_url: &str, cancel: Cancellation) -> Result<Vec<Article>> {
        if !source_url.contains(ARTICLE_HOST) {
            return Err(Error::InvalidInput(format!("Not a WeChat article link: {}", source_url)));
        }

        let album_id = Self::album_id(source_url);
        let logger = Logger::new().with_prefix(format!("[album:{}]", album_id.as_deref().unwrap_or("-")));
        let run = ExtractionRun::new(self.config.id_scheme);

        logger.info(&format!("🦗 Fetching {}", source_url));
        let body = self.source.fetch(&PageRequest::new(source_url)).await?;
        let page = parse_album_page(&body, &run)?;
        logger.info(&format!(
            "📰 Topic '{}': {} seed articles ({})",
            page.topic,
            page.articles.len(),
            page.strategy.map(|s| s.name()).unwrap_or("no strategy matched")
        ));

        let mut articles = page.articles;
        if articles.is_empty() {
            return Ok(articles);
        }

        if let Some(album_id) = album_id {
            let walker = PaginationWalker::new(self.source.clone(), self.config.album_page_size, self.config.page_delay)
                .with_logger(logger.clone());
            let request = WalkRequest {
                album_id,
                topic: page.topic.clone(),
                cursor: page.cursor,
                first_ordinal: articles.len(),
            };
            match walker.walk(request, &run, cancel).await {
                Ok(more) => articles.extend(more),
                Err(WalkFailure { collected, error }) => {
                    logger.warn(&format!("⚠️ Failed to fetch more articles: {}", error));
                    articles.extend(collected);
                }
            }
        }

        let mut seen = HashSet::new();
        articles.retain(|a| seen.insert(a.url.clone()));
        logger.info(&format!("✨ {} articles in total", articles.len()));
        Ok(articles)
    }
}

#[async_trait]
impl Scraper for WeixinAlbumScraper {
    fn source_metadata(&self) -> SourceMetadata {
        SourceMetadata {
            name: "WeChat album",
            emoji: "💬",
        }
    }

    fn can_handle(&self, url: &str) -> bool {
        url.contains(ARTICLE_HOST)
    }

    fn cli_names(&self) -> Vec<&str> {
        vec!["weixin", "wechat"]
    }

    async fn fetch_articles(&self, url: &str, cancel: Cancellation) -> Result<Vec<Article>> {
        WeixinAlbumScraper::fetch_articles(self, url, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::pagination::tests::{item, page, ScriptedSource};
    use serde_json::json;

    const ALBUM_URL: &str = "https://mp.weixin.qq.com/mp/appmsgalbum?__biz=MzA&action=getalbum&album_id=3040291357#wechat_redirect";

    fn album_html(items: usize) -> Vec<u8> {
        let items = (1..=items)
            .map(|n| {
                format!(
                    r#"<li class="album__list-item js_album_item js_wx_tap_highlight wx_tap_cell"
                           data-link="https://mp.weixin.qq.com/s/article-{n}" data-title="Article {n}"
                           data-msgid="{msgid}" data-itemidx="1">
                         <span class="album__item-info-time">2023-07-0{n}</span>
                       </li>"#,
                    n = n,
                    msgid = 2_247_480_000u64 + n as u64
                )
            })
            .collect::<String>();
        format!(
            r#"<html><body><div id="js_tag_name">Weekly Rust</div>
               <ul class="album__list js_album_list">{}</ul></body></html>"#,
            items
        )
        .into_bytes()
    }

    fn scraper(source: Arc<ScriptedSource>) -> WeixinAlbumScraper {
        WeixinAlbumScraper::new(source, PipelineConfig::default())
    }

    #[test]
    fn test_album_id() {
        assert_eq!(WeixinAlbumScraper::album_id(ALBUM_URL).as_deref(), Some("3040291357"));
        assert_eq!(WeixinAlbumScraper::album_id("https://mp.weixin.qq.com/s/abc"), None);
        assert_eq!(WeixinAlbumScraper::album_id("https://mp.weixin.qq.com/mp/appmsgalbum?album_id="), None);
    }

    #[tokio::test]
    async fn test_rejects_foreign_urls() {
        let source = ScriptedSource::new(vec![]);
        let err = scraper(source.clone())
            .fetch_articles("https://example.com/album", Cancellation::never())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn test_initial_page_failure_is_fatal() {
        let source = ScriptedSource::new(vec![Err(Error::HttpStatus(502))]);
        let err = scraper(source)
            .fetch_articles(ALBUM_URL, Cancellation::never())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HttpStatus(502)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeds_then_album_pages() {
        let source = ScriptedSource::new(vec![
            Ok(album_html(3)),
            page((4..=13).map(item).collect(), "1"),
            page((11..=15).map(item).collect(), "0"),
        ]);

        let articles = scraper(source.clone())
            .fetch_articles(ALBUM_URL, Cancellation::never())
            .await
            .unwrap();

        assert_eq!(articles.len(), 15);
        assert_eq!(source.call_count(), 3);
        assert!(articles.iter().all(|a| a.topic == "Weekly Rust"));

        // the walk resumes after the last item of the album page
        let query = source.query(1);
        assert_eq!(query["begin_msgid"], "2247480003");
        assert_eq!(query["begin_itemidx"], "1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pagination_error_keeps_seeds() {
        let source = ScriptedSource::new(vec![
            Ok(album_html(3)),
            Ok(json!({ "base_resp": { "ret": -1 } }).to_string().into_bytes()),
        ]);

        let articles = scraper(source.clone())
            .fetch_articles(ALBUM_URL, Cancellation::never())
            .await
            .unwrap();

        assert_eq!(articles.len(), 3);
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_merged_set_has_unique_urls() {
        let source = ScriptedSource::new(vec![
            Ok(album_html(3)),
            page((1..=5).map(item).collect(), "0"),
        ]);

        let articles = scraper(source)
            .fetch_articles(ALBUM_URL, Cancellation::never())
            .await
            .unwrap();

        assert_eq!(articles.len(), 5);
        let urls = articles.iter().map(|a| a.url.as_str()).collect::<HashSet<_>>();
        assert_eq!(urls.len(), 5);
        // seeds win over their album API duplicates
        assert_eq!(articles[0].publish_time.format("%Y-%m-%d").to_string(), "2023-07-01");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timestamped_ids_are_unique_when_items_are_skipped() {
        let html = r#"<html><body><div id="js_tag_name">Weekly Rust</div>
            <ul class="album__list js_album_list">
              <li class="album__list-item js_album_item js_wx_tap_highlight wx_tap_cell"
                  data-link="https://example.com/elsewhere" data-title="Foreign" data-msgid="1" data-itemidx="1"></li>
              <li class="album__list-item js_album_item js_wx_tap_highlight wx_tap_cell"
                  data-link="https://mp.weixin.qq.com/s/article-1" data-title="One" data-msgid="2" data-itemidx="1"></li>
              <li class="album__list-item js_album_item js_wx_tap_highlight wx_tap_cell"
                  data-link="https://mp.weixin.qq.com/s/article-2" data-title="Two" data-msgid="3" data-itemidx="1"></li>
            </ul></body></html>"#;
        let source = ScriptedSource::new(vec![
            Ok(html.as_bytes().to_vec()),
            page((3..=4).map(item).collect(), "0"),
        ]);
        let config = PipelineConfig {
            id_scheme: IdScheme::Timestamped,
            ..PipelineConfig::default()
        };

        let articles = WeixinAlbumScraper::new(source, config)
            .fetch_articles(ALBUM_URL, Cancellation::never())
            .await
            .unwrap();

        assert_eq!(articles.len(), 4);
        let ids = articles.iter().map(|a| a.id.as_str()).collect::<HashSet<_>>();
        assert_eq!(ids.len(), 4, "duplicate ids: {:?}", articles.iter().map(|a| &a.id).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_no_seeds_skips_pagination() {
        let source = ScriptedSource::new(vec![Ok(b"<html><body><p>empty album</p></body></html>".to_vec())]);

        let articles = scraper(source.clone())
            .fetch_articles(ALBUM_URL, Cancellation::never())
            .await
            .unwrap();

        assert!(articles.is_empty());
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_without_album_id_only_seeds_are_returned() {
        let source = ScriptedSource::new(vec![Ok(album_html(2))]);

        let articles = scraper(source.clone())
            .fetch_articles("https://mp.weixin.qq.com/s/some-article", Cancellation::never())
            .await
            .unwrap();

        assert_eq!(articles.len(), 2);
        assert_eq!(source.call_count(), 1);
    }
}

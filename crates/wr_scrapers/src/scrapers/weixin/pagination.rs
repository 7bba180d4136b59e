//! Album "load more" API walker.
//!
//! Pages through `appmsgalbum?action=getalbum` with `begin_msgid` /
//! `begin_itemidx` cursors taken from the last item of each response.
//! URLs are deduplicated for the whole walk and consecutive requests are
//! spaced by a fixed delay so the endpoint does not start refusing us.

use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wr_core::{Article, Error, Result};
use crate::cancel::Cancellation;
use crate::fetcher::{PageRequest, PageSource};
use crate::logging::Logger;
use crate::scrapers::{utils, ExtractionRun};
use super::album::Cursor;

pub const ALBUM_API: &str = "https://mp.weixin.qq.com/mp/appmsgalbum";

/// Shortest allowed gap between two album API requests. The endpoint starts
/// refusing clients that page faster than this.
pub const MIN_PAGE_DELAY: Duration = Duration::from_secs(2);

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct AlbumResponse {
    #[serde(default)]
    pub base_resp: BaseResp,
    #[serde(default)]
    pub getalbum_resp: GetAlbumResp,
}

#[derive(Debug, Default, Deserialize)]
pub struct BaseResp {
    #[serde(default)]
    pub ret: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct GetAlbumResp {
    #[serde(default)]
    pub article_list: Vec<AlbumItem>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub continue_flag: String,
}

impl GetAlbumResp {
    /// Anything that does not parse as a non-zero integer means "no more pages".
    pub fn has_more(&self) -> bool {
        self.continue_flag.trim().parse::<i64>().unwrap_or(0) != 0
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlbumItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub create_time: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub msgid: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub itemidx: String,
}

impl AlbumItem {
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.msgid.clone(), self.itemidx.trim().parse().unwrap_or(0))
    }
}

pub fn album_page_url(album_id: &str, page_size: u32, cursor: Option<&Cursor>) -> Result<Url> {
    let mut url = Url::parse(ALBUM_API).map_err(|e| Error::Request(e.to_string()))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("action", "getalbum")
            .append_pair("album_id", album_id)
            .append_pair("count", &page_size.to_string())
            .append_pair("f", "json");
        if let Some(cursor) = cursor.filter(|c| c.is_usable()) {
            query
                .append_pair("begin_msgid", &cursor.msgid)
                .append_pair("begin_itemidx", &cursor.itemidx.to_string());
        }
    }
    Ok(url)
}

/// What to walk and where to start.
#[derive(Debug, Clone)]
pub struct WalkRequest {
    pub album_id: String,
    pub topic: String,
    pub cursor: Option<Cursor>,
    /// Ordinal given to the first article produced by the walk.
    pub first_ordinal: usize,
}

/// A walk that stopped on an error. Pages merged before the error are kept.
#[derive(Debug)]
pub struct WalkFailure {
    pub collected: Vec<Article>,
    pub error: Error,
}

pub struct PaginationWalker {
    source: Arc<dyn PageSource>,
    page_size: u32,
    page_delay: Duration,
    logger: Logger,
}

impl PaginationWalker {
    /// `page_delay` below [`MIN_PAGE_DELAY`] is raised to it.
    pub fn new(source: Arc<dyn PageSource>, page_size: u32, page_delay: Duration) -> Self {
        Self {
            source,
            page_size,
            page_delay: page_delay.max(MIN_PAGE_DELAY),
            logger: Logger::new(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    async fn fetch_page(&self, album_id: &str, cursor: Option<&Cursor>) -> Result<AlbumResponse> {
        let url = album_page_url(album_id, self.page_size, cursor)?;
        let request = PageRequest::new(url.to_string())
            .header("Accept", "application/json")
            .header("Referer", format!("{}?action=getalbum&album_id={}", ALBUM_API, album_id));

        let body = self.source.fetch(&request).await?;
        let response: AlbumResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::Parse(format!("Invalid album response: {}", e)))?;

        if response.base_resp.ret != 0 {
            return Err(Error::RemoteApi(response.base_resp.ret));
        }
        Ok(response)
    }

    pub async fn walk(
        &self,
        request: WalkRequest,
        run: &ExtractionRun,
        mut cancel: Cancellation,
    ) -> std::result::Result<Vec<Article>, WalkFailure> {
        let mut seen = HashSet::new();
        let mut collected: Vec<Article> = Vec::new();
        let mut cursor = request.cursor.filter(|c| c.is_usable());
        let mut page = 0usize;

        loop {
            page += 1;
            if cancel.is_cancelled() {
                return Err(WalkFailure { collected, error: Error::Cancelled });
            }

            let response = tokio::select! {
                response = self.fetch_page(&request.album_id, cursor.as_ref()) => response,
                _ = cancel.cancelled() => Err(Error::Cancelled),
            };
            let response = match response {
                Ok(response) => response.getalbum_resp,
                Err(error) => {
                    self.logger.error(&format!("❌ Album page {} failed: {}", page, error));
                    return Err(WalkFailure { collected, error });
                }
            };

            let mut new_items = 0usize;
            for item in &response.article_list {
                if !Article::is_platform_url(&item.url) || !seen.insert(item.url.clone()) {
                    continue;
                }
                let ordinal = request.first_ordinal + collected.len();
                let title = utils::title_or_placeholder(Some(item.title.as_str()), ordinal + 1);
                let publish_time = utils::parse_unix_seconds(&item.create_time);
                collected.push(run.article(ordinal, title, item.url.clone(), &request.topic, publish_time));
                new_items += 1;
            }

            self.logger.debug(&format!(
                "Album page {}: {} items, {} new",
                page,
                response.article_list.len(),
                new_items
            ));

            let last = match response.article_list.last() {
                Some(last) if new_items > 0 => last,
                _ => break,
            };
            cursor = Some(last.cursor());

            if !response.has_more() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.page_delay) => {}
                _ = cancel.cancelled() => {
                    return Err(WalkFailure { collected, error: Error::Cancelled });
                }
            }
        }

        self.logger.info(&format!("📚 Walked {} album pages, {} articles", page, collected.len()));
        Ok(collected)
    }
}

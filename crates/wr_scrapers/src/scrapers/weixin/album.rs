//! Album page extraction.
//!
//! An album page is turned into a topic label, the seed articles and the
//! cursor of the last listed item. Seeds come from the first
//! [`ExtractionStrategy`] in [`ExtractionStrategy::ORDERED`] that yields
//! anything; later strategies are fallbacks and never merged in.

use scraper::{ElementRef, Html};
use wr_core::{Article, Error, Result, ARTICLE_HOST, DEFAULT_TOPIC};
use crate::scrapers::utils;
use crate::scrapers::ExtractionRun;

const TOPIC_SELECTOR: &str = "#js_tag_name";
const ALBUM_ITEM_SELECTOR: &str =
    ".album__list.js_album_list .album__list-item.js_album_item.js_wx_tap_highlight.wx_tap_cell";
const ITEM_TIME_SELECTOR: &str = ".album__item-info-time";

/// Position of a listing item, used to resume the album API after it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cursor {
    pub msgid: String,
    pub itemidx: i64,
}

impl Cursor {
    pub fn new(msgid: impl Into<String>, itemidx: i64) -> Self {
        Self {
            msgid: msgid.into(),
            itemidx,
        }
    }

    /// The album API only honours a cursor with both parts set.
    pub fn is_usable(&self) -> bool {
        !self.msgid.is_empty() && self.itemidx > 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArticleSet {
    pub articles: Vec<Article>,
    pub cursor: Option<Cursor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// `data-link` / `data-title` attributes of the album list items.
    AlbumList,
    /// Any anchor pointing at the article host.
    PlatformLinks,
}

impl ExtractionStrategy {
    pub const ORDERED: [ExtractionStrategy; 2] = [ExtractionStrategy::AlbumList, ExtractionStrategy::PlatformLinks];

    pub fn name(&self) -> &'static str {
        match self {
            ExtractionStrategy::AlbumList => "album-list",
            ExtractionStrategy::PlatformLinks => "platform-links",
        }
    }

    /// `None` when the strategy found nothing on this page.
    pub fn extract(&self, document: &Html, topic: &str, run: &ExtractionRun) -> Result<Option<ArticleSet>> {
        let set = match self {
            ExtractionStrategy::AlbumList => extract_album_list(document, topic, run)?,
            ExtractionStrategy::PlatformLinks => extract_platform_links(document, topic, run)?,
        };
        Ok(Some(set).filter(|s| !s.articles.is_empty()))
    }
}

#[derive(Debug, Clone)]
pub struct AlbumPage {
    pub topic: String,
    pub articles: Vec<Article>,
    pub cursor: Option<Cursor>,
    pub strategy: Option<ExtractionStrategy>,
}

pub fn parse_album_page(body: &[u8], run: &ExtractionRun) -> Result<AlbumPage> {
    let html = std::str::from_utf8(body)
        .map_err(|e| Error::Parse(format!("Album page is not valid UTF-8: {}", e)))?;
    let document = Html::parse_document(html);
    let topic = extract_topic(&document)?;

    for strategy in ExtractionStrategy::ORDERED {
        if let Some(set) = strategy.extract(&document, &topic, run)? {
            return Ok(AlbumPage {
                topic,
                articles: set.articles,
                cursor: set.cursor,
                strategy: Some(strategy),
            });
        }
    }

    Ok(AlbumPage {
        topic,
        articles: Vec::new(),
        cursor: None,
        strategy: None,
    })
}

fn text_of(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn extract_topic(document: &Html) -> Result<String> {
    let selector = utils::selector(TOPIC_SELECTOR)?;
    let topic = document
        .select(&selector)
        .map(|el| text_of(&el))
        .last()
        .unwrap_or_default();

    Ok(if topic.is_empty() { DEFAULT_TOPIC.to_string() } else { topic })
}

fn extract_album_list(document: &Html, topic: &str, run: &ExtractionRun) -> Result<ArticleSet> {
    let item_selector = utils::selector(ALBUM_ITEM_SELECTOR)?;
    let time_selector = utils::selector(ITEM_TIME_SELECTOR)?;
    let mut set = ArticleSet::default();

    for (i, item) in document.select(&item_selector).enumerate() {
        let attrs = item.value();
        let link = match attrs.attr("data-link") {
            Some(link) if link.contains(ARTICLE_HOST) => link.trim().to_string(),
            _ => continue,
        };

        let title = utils::title_or_placeholder(attrs.attr("data-title"), i + 1);

        set.cursor = Some(Cursor {
            msgid: attrs.attr("data-msgid").unwrap_or_default().to_string(),
            itemidx: attrs
                .attr("data-itemidx")
                .and_then(|idx| idx.trim().parse().ok())
                .unwrap_or(0),
        });

        let publish_time = item
            .select(&time_selector)
            .next()
            .and_then(|el| utils::parse_date(&text_of(&el)));

        // ordinals count kept articles only, so the walk can continue from `len()`
        set.articles.push(run.article(set.articles.len(), title, link, topic, publish_time));
    }

    Ok(set)
}

fn extract_platform_links(document: &Html, topic: &str, run: &ExtractionRun) -> Result<ArticleSet> {
    let selector = utils::selector(&format!("a[href*='{}']", ARTICLE_HOST))?;
    let mut set = ArticleSet::default();

    for (i, anchor) in document.select(&selector).enumerate() {
        let link = match anchor.value().attr("href") {
            Some(link) if !link.trim_start().to_ascii_lowercase().starts_with("javascript:") => link.trim().to_string(),
            _ => continue,
        };

        let title = utils::title_or_placeholder(Some(text_of(&anchor).as_str()), i + 1);
        set.articles.push(run.article(set.articles.len(), title, link, topic, None));
    }

    Ok(set)
}

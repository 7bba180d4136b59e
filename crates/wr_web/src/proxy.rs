//! Same-origin proxies for platform articles and their resources.

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;
use wr_core::Result;
use wr_scrapers::fetcher::PLATFORM_REFERER;
use wr_scrapers::{PageFetcher, PageRequest, PageResponse};
use crate::handlers::ApiError;
use crate::rewrite::rewrite_article_html;
use crate::AppState;

pub const IMAGE_HOST: &str = "https://mmbiz.qpic.cn";
pub const AVATAR_HOST: &str = "https://mmbiz.qlogo.cn";
pub const ARTICLE_ORIGIN: &str = "https://mp.weixin.qq.com";

const FRAME_POLICY: &str = "frame-ancestors 'self'";
const RESOURCE_POLICY: &str = "frame-ancestors 'self'; img-src * data:; default-src 'self' 'unsafe-inline' 'unsafe-eval' https://*.weixin.qq.com https://*.qpic.cn";

/// Fetches upstream resources on behalf of the proxy routes.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn get(&self, request: &PageRequest) -> Result<PageResponse>;
}

#[async_trait]
impl Upstream for PageFetcher {
    async fn get(&self, request: &PageRequest) -> Result<PageResponse> {
        self.fetch_response(request).await
    }
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
}

fn target_url(query: ProxyQuery) -> std::result::Result<String, ApiError> {
    let raw = query
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("URL is required"))?;

    match Url::parse(&raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(raw),
        _ => Err(ApiError::bad_request(format!("Invalid URL: {}", raw))),
    }
}

fn platform_request(url: impl Into<String>) -> PageRequest {
    PageRequest::new(url).header("Referer", PLATFORM_REFERER)
}

fn resource_response(upstream: PageResponse) -> Response {
    let content_type = upstream
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_SECURITY_POLICY, HeaderValue::from_static(RESOURCE_POLICY)),
        ],
        upstream.body,
    )
        .into_response()
}

/// `GET /api/proxy?url=`: the article page, rewritten for embedding.
pub async fn proxy_article(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
) -> std::result::Result<Response, ApiError> {
    let url = target_url(query)?;
    debug!("🪞 Proxying article {}", url);

    let upstream = state.upstream.get(&platform_request(url.as_str())).await.map_err(|e| {
        warn!("⚠️ Article proxy failed for {}: {}", url, e);
        ApiError::from(e)
    })?;
    let html = String::from_utf8_lossy(&upstream.body);

    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
            (header::CONTENT_SECURITY_POLICY, FRAME_POLICY),
        ],
        rewrite_article_html(&html, &url),
    )
        .into_response())
}

/// `GET /api/proxy/image?url=`
pub async fn proxy_image(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
) -> std::result::Result<Response, ApiError> {
    let url = target_url(query)?;
    let upstream = state.upstream.get(&platform_request(url)).await?;
    Ok(resource_response(upstream))
}

async fn forward(
    state: &AppState,
    origin: &str,
    path: &str,
    query: Option<String>,
) -> std::result::Result<Response, ApiError> {
    let mut url = format!("{}/{}", origin, path.trim_start_matches('/'));
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(&query);
    }
    debug!("🪞 Forwarding to {}", url);

    let upstream = state.upstream.get(&platform_request(url.as_str())).await.map_err(|e| {
        warn!("⚠️ Resource proxy failed for {}: {}", url, e);
        ApiError::from(e)
    })?;
    Ok(resource_response(upstream))
}

/// `/wx-images/*path` → `mmbiz.qpic.cn`
pub async fn proxy_images(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> std::result::Result<Response, ApiError> {
    forward(&state, IMAGE_HOST, &path, query).await
}

/// `/wx-qim/*path` → `mmbiz.qlogo.cn`
pub async fn proxy_avatars(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> std::result::Result<Response, ApiError> {
    forward(&state, AVATAR_HOST, &path, query).await
}

/// `/wx-mp/*path` → `mp.weixin.qq.com`
pub async fn proxy_platform(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> std::result::Result<Response, ApiError> {
    forward(&state, ARTICLE_ORIGIN, &path, query).await
}

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod handlers;
pub mod proxy;
pub mod rewrite;
pub mod state;

pub use proxy::Upstream;
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();
    let static_files = ServeDir::new(state.static_dir.join("static"));
    let index = ServeFile::new(state.static_dir.join("templates").join("index.html"));

    Router::new()
        .route("/api/fetch", post(handlers::fetch_articles))
        .route("/api/articles", get(handlers::list_articles))
        .route("/api/topics", get(handlers::list_topics))
        .route("/api/proxy", get(proxy::proxy_article))
        .route("/api/proxy/image", get(proxy::proxy_image))
        .route("/wx-images/*path", get(proxy::proxy_images))
        .route("/wx-qim/*path", get(proxy::proxy_avatars))
        .route("/wx-mp/*path", get(proxy::proxy_platform))
        .nest_service("/static", static_files)
        .route_service("/", index)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("👋 Shutting down");
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🚀 Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tower::ServiceExt;
    use wr_core::{Article, Error, Result};
    use wr_scrapers::scrapers::SourceMetadata;
    use wr_scrapers::{Cancellation, PageRequest, PageResponse, Scraper, ScraperManager};
    use wr_storage::InMemoryStorage;

    struct FixedScraper {
        articles: Vec<Article>,
    }

    #[async_trait]
    impl Scraper for FixedScraper {
        fn source_metadata(&self) -> SourceMetadata {
            SourceMetadata { name: "fixed", emoji: "🧪" }
        }

        fn can_handle(&self, url: &str) -> bool {
            url.contains("mp.weixin.qq.com")
        }

        async fn fetch_articles(&self, url: &str, _cancel: Cancellation) -> Result<Vec<Article>> {
            if url.contains("broken") {
                return Err(Error::HttpStatus(502));
            }
            Ok(self.articles.clone())
        }
    }

    #[derive(Default)]
    struct FakeUpstream {
        requests: Mutex<Vec<PageRequest>>,
    }

    #[async_trait]
    impl Upstream for FakeUpstream {
        async fn get(&self, request: &PageRequest) -> Result<PageResponse> {
            self.requests.lock().unwrap().push(request.clone());
            if request.url.contains("missing") {
                return Err(Error::HttpStatus(404));
            }
            if request.url.ends_with(".png") || request.url.contains("wx_fmt") {
                return Ok(PageResponse {
                    content_type: Some("image/png".to_string()),
                    body: vec![0x89, b'P', b'N', b'G'],
                });
            }
            Ok(PageResponse {
                content_type: Some("text/html".to_string()),
                body: br#"<html><head></head><body><img data-src="https://mmbiz.qpic.cn/a.png"></body></html>"#.to_vec(),
            })
        }
    }

    fn article(id: &str, topic: &str, day: u32) -> Article {
        let at = Utc.with_ymd_and_hms(2024, 1, day, 8, 0, 0).unwrap();
        Article {
            id: id.to_string(),
            title: format!("Title {}", id),
            author: String::new(),
            content: String::new(),
            url: format!("https://mp.weixin.qq.com/s/{}", id),
            topic: topic.to_string(),
            publish_time: at,
            create_time: at,
        }
    }

    struct Harness {
        app: Router,
        upstream: Arc<FakeUpstream>,
        _static_dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let static_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(static_dir.path().join("static")).unwrap();
        std::fs::create_dir_all(static_dir.path().join("templates")).unwrap();
        std::fs::write(static_dir.path().join("static/app.js"), "console.log('hi');").unwrap();
        std::fs::write(static_dir.path().join("templates/index.html"), "<h1>reader</h1>").unwrap();

        let mut manager = ScraperManager::new(Arc::new(InMemoryStorage::new()));
        manager.add_scraper(Arc::new(FixedScraper {
            articles: vec![article("a", "Rust", 1), article("b", "Go", 2)],
        }));
        let upstream = Arc::new(FakeUpstream::default());
        let state = AppState::with_upstream(manager, upstream.clone(), static_dir.path());

        Harness {
            app: create_app(state),
            upstream,
            _static_dir: static_dir,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let (status, _, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post_fetch(app: &Router, body: &str) -> (StatusCode, Value) {
        let request = Request::post("/api/fetch")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, _, body) = send(app, request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_fetch_then_list() {
        let h = harness();

        let (status, body) = post_fetch(&h.app, &json!({ "url": "https://mp.weixin.qq.com/mp/appmsgalbum?album_id=1" }).to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Articles fetched and saved successfully");
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let (status, body) = get_json(&h.app, "/api/articles").await;
        assert_eq!(status, StatusCode::OK);
        let ids = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["id"].as_str().unwrap().to_string())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["b", "a"]);

        let (_, body) = get_json(&h.app, "/api/articles?topic=Rust").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["topic"], "Rust");

        let (_, body) = get_json(&h.app, "/api/topics").await;
        assert_eq!(body["data"], json!(["Go", "Rust"]));
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_input() {
        let h = harness();

        let (status, body) = post_fetch(&h.app, r#"{"url": ""}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "URL is required");

        let (status, body) = post_fetch(&h.app, "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = post_fetch(&h.app, r#"{"url": "https://example.com/"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_server_error() {
        let h = harness();
        let (status, body) = post_fetch(&h.app, r#"{"url": "https://mp.weixin.qq.com/broken"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(body.get("data").is_none());

        let (_, body) = get_json(&h.app, "/api/articles").await;
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_article_proxy_rewrites_page() {
        let h = harness();
        let request = Request::get("/api/proxy?url=https%3A%2F%2Fmp.weixin.qq.com%2Fs%2Fabc")
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&h.app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert_eq!(headers[header::CONTENT_SECURITY_POLICY], "frame-ancestors 'self'");

        let html = String::from_utf8(body).unwrap();
        assert!(html.contains(r#"src="/wx-images/a.png""#));
        assert!(html.contains(r#"<base target="_blank">"#));
        assert!(html.contains(r#"href="https://mp.weixin.qq.com/s/abc""#));

        let requests = h.upstream.requests.lock().unwrap();
        assert_eq!(requests[0].url, "https://mp.weixin.qq.com/s/abc");
        assert!(requests[0].headers.iter().any(|(k, _)| k == "Referer"));
    }

    #[tokio::test]
    async fn test_proxy_requires_url() {
        let h = harness();
        let (status, body) = get_json(&h.app, "/api/proxy").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "URL is required");

        let (status, _) = get_json(&h.app, "/api/proxy/image?url=ftp%3A%2F%2Fhost%2Fx").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h.upstream.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resource_proxies_forward_path_and_query() {
        let h = harness();
        let request = Request::get("/wx-images/sz_mmbiz_png/abc/640?wx_fmt=png")
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&h.app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert!(headers[header::CONTENT_SECURITY_POLICY]
            .to_str()
            .unwrap()
            .starts_with("frame-ancestors 'self'; img-src * data:"));
        assert_eq!(body, vec![0x89, b'P', b'N', b'G']);

        let request = Request::get("/wx-qim/head/1.png").body(Body::empty()).unwrap();
        let (status, _, _) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::OK);

        let request = Request::get("/wx-mp/s/missing").body(Body::empty()).unwrap();
        let (status, _, _) = send(&h.app, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let urls = h
            .upstream
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.clone())
            .collect::<Vec<_>>();
        assert_eq!(
            urls,
            vec![
                "https://mmbiz.qpic.cn/sz_mmbiz_png/abc/640?wx_fmt=png",
                "https://mmbiz.qlogo.cn/head/1.png",
                "https://mp.weixin.qq.com/s/missing",
            ]
        );
    }

    #[tokio::test]
    async fn test_serves_index_and_static_files() {
        let h = harness();

        let (status, _, body) = send(&h.app, Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"<h1>reader</h1>");

        let (status, _, body) = send(&h.app, Request::get("/static/app.js").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"console.log('hi');");
    }
}

//! HTTP access to the platform.
//!
//! Every outbound request goes through a [`PageFetcher`] built once from a
//! [`FetcherConfig`]. The platform filters on client identity, so the header
//! table imitates the WeChat in-app browser by default. Response bodies are
//! decoded by the client (gzip, brotli, deflate) and failures are reported
//! with distinct [`Error`] kinds; nothing is retried.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use wr_core::{Error, Result};

pub const WECHAT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 MicroMessenger/7.0.20.1781(0x6700143B) NetType/WIFI MiniProgramEnv/Windows WindowsWechat/WMPF WindowsWechat(0x6309092b) XWEB/9053";

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const PLATFORM_REFERER: &str = "https://mp.weixin.qq.com/";

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Headers sent with every request. `Accept-Encoding` is ignored here,
    /// the client negotiates it so that it can decode the body.
    pub headers: Vec<(String, String)>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: WECHAT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
            headers: vec![
                ("Accept".to_string(), "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7".to_string()),
                ("Accept-Language".to_string(), "zh-CN,zh;q=0.9,en;q=0.8".to_string()),
                ("Connection".to_string(), "keep-alive".to_string()),
                ("Referer".to_string(), PLATFORM_REFERER.to_string()),
                ("Sec-Fetch-Dest".to_string(), "document".to_string()),
                ("Sec-Fetch-Mode".to_string(), "navigate".to_string()),
                ("Sec-Fetch-Site".to_string(), "same-origin".to_string()),
                ("Sec-Fetch-User".to_string(), "?1".to_string()),
                ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
            ],
        }
    }
}

impl FetcherConfig {
    /// Desktop browser profile used when proxying article pages.
    pub fn browser() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            headers: vec![
                ("Accept".to_string(), "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string()),
                ("Accept-Language".to_string(), "zh-CN,zh;q=0.9".to_string()),
                ("Connection".to_string(), "keep-alive".to_string()),
                ("Referer".to_string(), PLATFORM_REFERER.to_string()),
            ],
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn header_map(&self) -> Result<HeaderMap> {
        header_map(&self.headers)
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Request(format!("Invalid header name '{}': {}", name, e)))?;
        if name == ACCEPT_ENCODING {
            continue;
        }
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Request(format!("Invalid value for header '{}': {}", name, e)))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// A single GET with optional per-request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl PageRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct PageResponse {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Returns the decoded body of a successful, non-empty response.
    async fn fetch(&self, request: &PageRequest) -> Result<Vec<u8>>;
}

#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .default_headers(config.header_map()?)
            .build()
            .map_err(Error::from_reqwest)?;
        Ok(Self { client })
    }

    /// Fetches a page keeping the upstream content type next to the body.
    pub async fn fetch_response(&self, request: &PageRequest) -> Result<PageResponse> {
        debug!("🌐 GET {}", request.url);
        let response = self
            .client
            .get(request.url.as_str())
            .headers(header_map(&request.headers)?)
            .send()
            .await
            .map_err(Error::from_reqwest)?;

        let status = response.status();
        debug!("🌐 {} answered {}", request.url, status);
        if !status.is_success() {
            return Err(Error::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(Error::from_reqwest)?;

        if body.is_empty() {
            return Err(Error::EmptyBody);
        }

        Ok(PageResponse {
            content_type,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    async fn fetch(&self, request: &PageRequest) -> Result<Vec<u8>> {
        Ok(self.fetch_response(request).await?.body)
    }
}

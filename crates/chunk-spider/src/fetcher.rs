//! HTTP fetching behind an abstract interface.
//!
//! The engine and the prober only see the [`Fetcher`] trait. [`HttpFetcher`]
//! is the reqwest-backed implementation: redirects are followed, certificate
//! validation is off by default, and every request carries a browser-like
//! user agent because some targets block default client signatures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};

use crate::types::{FetchError, SpiderError, SpiderResult};

/// Standard Chrome user-agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/131.0.0.0 Safari/537.36";

/// A single HTTP GET response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// Requested URL.
    pub url: String,
    /// HTTP status code of the final response.
    pub status: u16,
    /// Content-Type header, empty when absent.
    pub content_type: String,
    /// Raw, undecoded body.
    pub body: Vec<u8>,
}

/// One network round trip per call.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET a URL. Only transport-level failures are errors; any status code
    /// and any body length is returned as a reply.
    async fn get(&self, url: &str) -> Result<HttpReply, FetchError>;
}

/// GET a URL that is expected to hold crawlable content.
///
/// Fails when the body is empty or the status code is not `2xx`.
pub async fn fetch_resource(fetcher: &dyn Fetcher, url: &str) -> Result<HttpReply, FetchError> {
    let reply = fetcher.get(url).await?;
    if reply.body.is_empty() {
        return Err(FetchError::EmptyBody);
    }
    if reply.status / 100 != 2 {
        return Err(FetchError::Status(reply.status));
    }
    Ok(reply)
}

/// Settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Proxy endpoint used for both HTTP and HTTPS, e.g. `http://localhost:8080`.
    pub proxy: Option<String>,
    pub user_agent: String,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout_ms: Option<u64>,
    pub max_redirects: usize,
    pub accept_invalid_certs: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
            timeout_ms: None,
            max_redirects: 10,
            accept_invalid_certs: true,
        }
    }
}

/// reqwest-backed [`Fetcher`].
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client from the given settings.
    pub fn new(config: &FetcherConfig) -> SpiderResult<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|e| SpiderError::Client(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|e| SpiderError::Client(format!("invalid header value for '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers);

        if let Some(timeout_ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| SpiderError::Client(format!("invalid proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| SpiderError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<HttpReply, FetchError> {
        let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        let resp = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
            .to_vec();

        tracing::debug!("GET {url} -> {status} ({} bytes, {content_type:?})", body.len());

        Ok(HttpReply {
            url: url.to_string(),
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(HttpReply);

    #[async_trait]
    impl Fetcher for Fixed {
        async fn get(&self, _url: &str) -> Result<HttpReply, FetchError> {
            Ok(self.0.clone())
        }
    }

    fn reply(status: u16, body: &[u8]) -> HttpReply {
        HttpReply {
            url: "https://example.com/a.js".to_string(),
            status,
            content_type: "application/javascript".to_string(),
            body: body.to_vec(),
        }
    }

    #[test]
    fn test_http_fetcher_creation() {
        let fetcher = HttpFetcher::new(&FetcherConfig::default());
        assert!(fetcher.is_ok());
    }

    #[test]
    fn test_http_fetcher_rejects_bad_header() {
        let config = FetcherConfig {
            headers: vec![("bad header".to_string(), "x".to_string())],
            ..FetcherConfig::default()
        };
        assert!(matches!(HttpFetcher::new(&config), Err(SpiderError::Client(_))));
    }

    #[test]
    fn test_http_fetcher_rejects_bad_proxy() {
        let config = FetcherConfig {
            proxy: Some("not a proxy url".to_string()),
            ..FetcherConfig::default()
        };
        assert!(HttpFetcher::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_fetch_resource_accepts_2xx() {
        let fetcher = Fixed(reply(200, b"var a = 1;"));
        let got = fetch_resource(&fetcher, "https://example.com/a.js").await.unwrap();
        assert_eq!(got.body, b"var a = 1;");
    }

    #[tokio::test]
    async fn test_fetch_resource_rejects_non_2xx() {
        let fetcher = Fixed(reply(404, b"not found"));
        let err = fetch_resource(&fetcher, "https://example.com/a.js").await.unwrap_err();
        assert_eq!(err, FetchError::Status(404));
    }

    #[tokio::test]
    async fn test_fetch_resource_rejects_empty_body() {
        let fetcher = Fixed(reply(200, b""));
        let err = fetch_resource(&fetcher, "https://example.com/a.js").await.unwrap_err();
        assert_eq!(err, FetchError::EmptyBody);
    }
}

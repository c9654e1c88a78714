use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use std::time::Duration;

use crate::error::{CacheError, Result};
use crate::types::{CacheRequest, CachedResponse, ResponseSource};

/// Performs the actual network request for the context.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Any HTTP answer is `Ok`, whatever its status; `Err` means no answer.
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse>;
}

/// Fetches paths against one application origin.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    origin: String,
}

impl HttpFetcher {
    pub fn new(origin: &str, timeout: Duration) -> Result<Self> {
        Self::with_headers(origin, timeout, HeaderMap::new())
    }

    /// Sends `headers` with every request, e.g. the remote store's credentials.
    pub fn with_headers(origin: &str, timeout: Duration, headers: HeaderMap) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, request: &CacheRequest) -> String {
        if request.path.starts_with('/') {
            format!("{}{}", self.origin, request.path)
        } else {
            format!("{}/{}", self.origin, request.path)
        }
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse> {
        let url = self.url_for(request);
        let response = self
            .client
            .request(request.method.clone(), &url)
            .send()
            .await
            .map_err(|e| CacheError::Network(format!("{} {}: {}", request.method, url, e)))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();
        debug!("[BackgroundCache] {} {} -> {}", request.method, url, status);

        Ok(CachedResponse {
            status,
            content_type,
            body,
            source: ResponseSource::Network,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;

    #[tokio::test]
    async fn fetches_relative_paths_against_the_origin() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/manifest.json");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"name":"PocketLedger"}"#);
            })
            .await;

        let fetcher = HttpFetcher::new(&server.base_url(), Duration::from_secs(5)).unwrap();
        let response = fetcher.fetch(&CacheRequest::get("/manifest.json")).await.unwrap();

        assert!(response.is_ok());
        assert_eq!(response.content_type.as_deref(), Some("application/json"));
        assert_eq!(response.body, br#"{"name":"PocketLedger"}"#.to_vec());
        assert_eq!(response.source, ResponseSource::Network);
    }

    #[tokio::test]
    async fn default_headers_go_out_with_every_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/expenses").header("apikey", "anon-key");
                then.status(200).body("[]");
            })
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", reqwest::header::HeaderValue::from_static("anon-key"));
        let fetcher =
            HttpFetcher::with_headers(&server.base_url(), Duration::from_secs(5), headers).unwrap();
        let response = fetcher.fetch(&CacheRequest::get("/rest/v1/expenses")).await.unwrap();

        mock.assert_async().await;
        assert!(response.is_ok());
    }
}

use reqwest::Method;

/// An outbound request seen by the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    pub method: Method,
    /// Path (with query) relative to the application origin, e.g. `/offline`.
    pub path: String,
    /// Page navigation rather than a subresource; falls back to the offline page.
    pub navigate: bool,
}

impl CacheRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            navigate: false,
        }
    }

    pub fn navigation(path: impl Into<String>) -> Self {
        Self {
            navigate: true,
            ..Self::get(path)
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    /// Path without the query string.
    pub fn pathname(&self) -> &str {
        self.path.split(['?', '#']).next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl CachedResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn from_cache(&self) -> Self {
        Self {
            source: ResponseSource::Cache,
            ..self.clone()
        }
    }
}

use crate::errors::{DomError, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout_ms: u64,
}

impl FetchRequest {
    pub fn get(url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: HttpMethod::Get,
            headers: Vec::new(),
            body: None,
            timeout_ms: 30000,
        }
    }

    pub fn post(url: &str, body: String) -> Self {
        Self {
            url: url.to_string(),
            method: HttpMethod::Post,
            headers: Vec::new(),
            body: Some(body),
            timeout_ms: 30000,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Network collaborator seam.
///
/// The chain only sees this trait; production uses [`HttpFetcher`], tests
/// plug in scripted fakes.
#[async_trait]
pub trait FetchBackend: Send + Sync {
    /// Perform a request and buffer the whole response body
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;

    /// Perform a request and yield body chunks as they arrive
    async fn fetch_stream(&self, request: FetchRequest) -> Result<ByteStream>;
}

/// reqwest-backed fetch implementation
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn builder(&self, request: &FetchRequest) -> Result<reqwest::RequestBuilder> {
        let url = Url::parse(&request.url)
            .map_err(|e| DomError::NetworkError(format!("{}: {}", request.url, e)))?;
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        Ok(builder)
    }

    async fn send(&self, request: &FetchRequest) -> Result<reqwest::Response> {
        let builder = self.builder(request)?;
        let response = tokio::time::timeout(
            Duration::from_millis(request.timeout_ms),
            builder.send(),
        )
        .await
        .map_err(|_| DomError::TimeoutExceeded(request.url.clone()))?
        .map_err(|e| DomError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomError::NetworkError(format!(
                "{} returned {}",
                request.url, status
            )));
        }
        Ok(response)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchBackend for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let response = self.send(&request).await?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| DomError::NetworkError(e.to_string()))?;
        Ok(FetchResponse {
            status,
            body: body.to_vec(),
        })
    }

    async fn fetch_stream(&self, request: FetchRequest) -> Result<ByteStream> {
        let response = self.send(&request).await?;
        let stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| DomError::NetworkError(e.to_string()))
            })
            .boxed();
        Ok(stream)
    }
}

use crate::config::Sanitizer;
use serde_json::Value;
use std::sync::Arc;

/// Custom request-body serializer for [`send`](crate::handle::Handle::send)
pub type Serializer = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Options for the fetch-driven operations.
///
/// `fallback` is applied to the target as placeholder text before the
/// request settles; `error_text` replaces it if the request fails.
/// `event` names a document event dispatched on the target once the
/// request succeeds. Setting `sanitizer` runs fetched HTML through that
/// hook instead of the configured one; `sanitize` alone uses the
/// configured hook.
#[derive(Clone, Default)]
pub struct FetchOptions {
    pub fallback: Option<String>,
    pub error_text: Option<String>,
    pub sanitize: bool,
    pub sanitizer: Option<Sanitizer>,
    pub headers: Vec<(String, String)>,
    pub event: Option<String>,
    pub timeout_ms: Option<u64>,
    pub serializer: Option<Serializer>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(mut self, text: &str) -> Self {
        self.fallback = Some(text.to_string());
        self
    }

    pub fn with_error_text(mut self, text: &str) -> Self {
        self.error_text = Some(text.to_string());
        self
    }

    pub fn with_sanitize(mut self) -> Self {
        self.sanitize = true;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_event(mut self, name: &str) -> Self {
        self.event = Some(name.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = Some(serializer);
        self
    }
}

impl std::fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOptions")
            .field("fallback", &self.fallback)
            .field("error_text", &self.error_text)
            .field("sanitize", &self.sanitize)
            .field("sanitizer", &self.sanitizer.is_some())
            .field("headers", &self.headers)
            .field("event", &self.event)
            .field("timeout_ms", &self.timeout_ms)
            .field("serializer", &self.serializer.is_some())
            .finish()
    }
}

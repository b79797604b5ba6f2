use crate::errors::DomError;
use std::sync::{Arc, RwLock};

/// Replaceable error reporter: `(error, context)`.
///
/// The context string is the operation name plus the originating selector,
/// e.g. `"text #headline"` or `"find_all .item"`.
pub type ErrorHandler = Arc<dyn Fn(&DomError, &str) + Send + Sync>;

/// Pluggable HTML sanitizer hook
pub type Sanitizer = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Policy for `become_` when the replacement count differs from the
/// target count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BecomePolicy {
    /// Cycle through the replacements for surplus targets (default)
    Cycle,
    /// Remove surplus targets outright
    Remove,
    /// Leave surplus targets untouched
    LeaveUnmatched,
}

/// Configuration injected at page construction.
///
/// There is deliberately no module-level singleton; every handle lineage
/// carries an `Arc<ChainConfig>` and reports failures through it.
pub struct ChainConfig {
    error_handler: RwLock<ErrorHandler>,
    pub become_policy: BecomePolicy,
    pub sanitizer: Sanitizer,
    pub fetch_timeout_ms: u64,
}

impl ChainConfig {
    pub fn new() -> Self {
        Self {
            error_handler: RwLock::new(Arc::new(default_error_handler)),
            become_policy: BecomePolicy::Cycle,
            sanitizer: Arc::new(|html| crate::dom::sanitize::clean_html(html)),
            fetch_timeout_ms: 30000,
        }
    }

    pub fn with_become_policy(mut self, policy: BecomePolicy) -> Self {
        self.become_policy = policy;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout_ms: u64) -> Self {
        self.fetch_timeout_ms = timeout_ms;
        self
    }

    pub fn with_error_handler(self, handler: ErrorHandler) -> Self {
        self.set_error_handler(handler);
        self
    }

    /// Replace the error handler for every lineage sharing this config
    pub fn set_error_handler(&self, handler: ErrorHandler) {
        let mut guard = self
            .error_handler
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *guard = handler;
    }

    /// Route a failure through the configured handler
    pub fn report(&self, err: &DomError, context: &str) {
        let handler = {
            let guard = self
                .error_handler
                .read()
                .unwrap_or_else(|e| e.into_inner());
            guard.clone()
        };
        handler(err, context);
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_error_handler(err: &DomError, context: &str) {
    tracing::error!(kind = err.kind(), context, "{err}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn replacing_the_handler_affects_later_reports() {
        let hits = Arc::new(AtomicUsize::new(0));
        let config = ChainConfig::new();
        config.report(&DomError::NoElementsFound("#a".into()), "find #a");

        let seen = hits.clone();
        config.set_error_handler(Arc::new(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        config.report(&DomError::NoElementsFound("#a".into()), "find #a");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

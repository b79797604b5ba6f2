use crate::errors::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;

/// A deferred-lane argument: either already resolved, or a pending
/// computation awaited right before the deferred callback runs.
pub enum Lazy {
    Ready(Value),
    Pending(BoxFuture<'static, Result<Value>>),
}

impl Lazy {
    pub fn ready(value: Value) -> Self {
        Lazy::Ready(value)
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value>> + Send + 'static,
    {
        Lazy::Pending(Box::pin(future))
    }

    pub async fn resolve(self) -> Result<Value> {
        match self {
            Lazy::Ready(value) => Ok(value),
            Lazy::Pending(future) => future.await,
        }
    }
}

impl std::fmt::Debug for Lazy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lazy::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Lazy::Pending(_) => f.debug_tuple("Pending").finish(),
        }
    }
}

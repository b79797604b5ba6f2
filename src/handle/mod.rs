pub mod net_ops;
pub mod ops;
pub mod registry;
pub mod traverse;

pub use net_ops::JsonCallback;
pub use ops::{Keyframes, TransitionOptions};
pub use registry::{OpCx, OpFn, OpRegistry};

use crate::config::ChainConfig;
use crate::dom::document::Document;
use crate::dom::node::NodeId;
use crate::net::FetchBackend;
use crate::queue::{Lazy, OpEntry, Sequencer};
use crate::errors::Result;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::{Arc, RwLock as StdRwLock};
use tokio::sync::RwLock;

/// The element set a handle currently refers to. Non-empty by construction;
/// an empty resolution fails at construction or traversal time, never at
/// use time.
#[derive(Debug, Clone)]
pub enum Target {
    Single(NodeId),
    Many(Vec<NodeId>),
}

impl Target {
    pub fn nodes(&self) -> Vec<NodeId> {
        match self {
            Target::Single(id) => vec![*id],
            Target::Many(ids) => ids.clone(),
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Target::Single(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Target::Single(_) => 1,
            Target::Many(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The chainable object wrapping one or more document nodes.
///
/// Every operation method schedules work on the lineage's [`Sequencer`] and
/// synchronously returns a chainable handle; effects are never visible
/// immediately after the call returns. Clones share the target, queue and
/// configuration, so a chain keeps one external identity across target
/// switches.
#[derive(Clone)]
pub struct Handle {
    pub(crate) doc: Arc<RwLock<Document>>,
    pub(crate) target: Arc<StdRwLock<Target>>,
    pub(crate) seq: Sequencer,
    pub(crate) registry: Arc<OpRegistry>,
    pub(crate) config: Arc<ChainConfig>,
    pub(crate) fetcher: Arc<dyn FetchBackend>,
    pub(crate) origin: String,
    pub(crate) fixed: bool,
}

impl Handle {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        doc: Arc<RwLock<Document>>,
        target: Target,
        seq: Sequencer,
        registry: Arc<OpRegistry>,
        config: Arc<ChainConfig>,
        fetcher: Arc<dyn FetchBackend>,
        origin: String,
        fixed: bool,
    ) -> Self {
        Self {
            doc,
            target: Arc::new(StdRwLock::new(target)),
            seq,
            registry,
            config,
            fetcher,
            origin,
            fixed,
        }
    }

    // ---- raw accessors (interop outside the chain abstraction) ----

    /// Snapshot of the current target
    pub fn target(&self) -> Target {
        self.target
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.target().nodes()
    }

    /// The single wrapped node, if the target is single
    pub fn node(&self) -> Option<NodeId> {
        match self.target() {
            Target::Single(id) => Some(id),
            Target::Many(_) => None,
        }
    }

    pub fn is_single(&self) -> bool {
        self.target().is_single()
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Wait until every queued operation of this lineage has settled
    pub async fn idle(&self) {
        self.seq.idle().await;
    }

    // ---- dispatch plumbing ----

    pub(crate) fn op_context(&self, name: &str) -> String {
        format!("{} {}", name, self.origin)
    }

    /// Enqueue an operation; the closure receives a handle clone at drain
    /// time and reads the then-current target.
    pub(crate) fn enqueue_op<F, Fut>(&self, name: &str, f: F) -> Handle
    where
        F: FnOnce(Handle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handle = self.clone();
        self.seq.enqueue(OpEntry::new(self.op_context(name), move || {
            Box::pin(f(handle))
        }));
        self.clone()
    }

    fn dispatch_registry(&self, name: &str, args: Value) -> Handle {
        let registry = self.registry.clone();
        let name_owned = name.to_string();
        self.enqueue_op(name, move |h| async move {
            let cx = OpCx {
                doc: h.doc.clone(),
                nodes: h.nodes(),
                config: h.config.clone(),
            };
            registry.invoke(&name_owned, cx, args).await
        })
    }

    /// Fixed sub-handle for one element, sharing this lineage's queue.
    /// Used for per-element callback fan-out.
    pub(crate) fn element_handle(&self, node: NodeId) -> Handle {
        Handle {
            doc: self.doc.clone(),
            target: Arc::new(StdRwLock::new(Target::Single(node))),
            seq: self.seq.clone(),
            registry: self.registry.clone(),
            config: self.config.clone(),
            fetcher: self.fetcher.clone(),
            origin: self.origin.clone(),
            fixed: true,
        }
    }

    // ---- content ----

    pub fn text(&self, value: &str) -> Handle {
        self.dispatch_registry("text", json!([value]))
    }

    /// Set inner HTML without sanitization
    pub fn html(&self, value: &str) -> Handle {
        self.dispatch_registry("html", json!([value]))
    }

    /// Set inner HTML after running it through the configured sanitizer
    pub fn sanitize(&self, value: &str) -> Handle {
        self.dispatch_registry("sanitize", json!([value]))
    }

    pub fn val(&self, value: &str) -> Handle {
        self.dispatch_registry("val", json!([value]))
    }

    // ---- styling ----

    pub fn css(&self, name: &str, value: &str) -> Handle {
        self.dispatch_registry("css", json!([name, value]))
    }

    pub fn add_class(&self, name: &str) -> Handle {
        self.dispatch_registry("add_class", json!([name]))
    }

    pub fn remove_class(&self, name: &str) -> Handle {
        self.dispatch_registry("remove_class", json!([name]))
    }

    pub fn toggle_class(&self, name: &str) -> Handle {
        self.dispatch_registry("toggle_class", json!([name]))
    }

    // ---- attributes ----

    pub fn set(&self, name: &str, value: &str) -> Handle {
        self.dispatch_registry("set", json!([name, value]))
    }

    pub fn unset(&self, name: &str) -> Handle {
        self.dispatch_registry("unset", json!([name]))
    }

    /// Toggle a boolean attribute
    pub fn toggle(&self, name: &str) -> Handle {
        self.dispatch_registry("toggle", json!([name]))
    }

    pub fn data(&self, key: &str, value: &str) -> Handle {
        self.dispatch_registry("data", json!([key, value]))
    }

    // ---- structure ----

    /// Append parsed fragment content to each target
    pub fn attach(&self, html: &str) -> Handle {
        self.dispatch_registry("attach", json!([html]))
    }

    pub fn clone_to(&self, selector: &str) -> Handle {
        self.dispatch_registry("clone_to", json!([selector]))
    }

    pub fn move_to(&self, selector: &str) -> Handle {
        self.dispatch_registry("move_to", json!([selector]))
    }

    /// Replace each target with the parsed replacement content; surplus
    /// targets follow the configured
    /// [`BecomePolicy`](crate::config::BecomePolicy).
    pub fn become_(&self, html: &str) -> Handle {
        self.dispatch_registry("become", json!([html]))
    }

    /// Remove each target from the document
    pub fn purge(&self) -> Handle {
        self.dispatch_registry("purge", json!([]))
    }

    // ---- timing ----

    /// Queue a timed delay; later operations wait for it
    pub fn wait(&self, ms: u64) -> Handle {
        self.enqueue_op("wait", move |_| async move {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
            Ok(())
        })
    }

    // ---- escape hatches ----

    /// Queue arbitrary code in declaration order with the other operations
    pub fn run<F, Fut>(&self, f: F) -> Handle
    where
        F: FnOnce(Handle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.enqueue_op("run", f)
    }

    /// Execute immediately, bypassing the queue
    pub async fn now<R>(&self, f: impl FnOnce(&mut Document, &[NodeId]) -> R) -> R {
        let nodes = self.nodes();
        let mut doc = self.doc.write().await;
        f(&mut doc, &nodes)
    }

    /// Queue on the deferred lane: runs once the main queue has drained
    pub fn later<F, Fut>(&self, f: F) -> Handle
    where
        F: FnOnce(Handle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handle = self.clone();
        self.seq
            .defer(self.op_context("later"), Vec::new(), move |_| {
                Box::pin(f(handle))
            });
        self.clone()
    }

    /// Deferred-lane entry whose arguments (possibly pending) are resolved
    /// before the callback runs
    pub fn later_with<F, Fut>(&self, args: Vec<Lazy>, f: F) -> Handle
    where
        F: FnOnce(Handle, Vec<Value>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handle = self.clone();
        self.seq
            .defer(self.op_context("later"), args, move |values| {
                Box::pin(f(handle, values))
            });
        self.clone()
    }
}

use crate::config::{ChainConfig, ErrorHandler};
use crate::dom::document::Document;
use crate::dom::events;
use crate::dom::node::NodeId;
use crate::dom::parse;
use crate::dom::selector::SelectorList;
use crate::errors::DomError;
use crate::handle::{Handle, OpFn, OpRegistry, Target};
use crate::net::{FetchBackend, HttpFetcher};
use crate::queue::Sequencer;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A loaded document plus the configuration shared by every handle lineage
/// created from it.
///
/// `find`/`find_all` are the construction surface: an empty resolution is
/// reported through the configured error handler and yields `None`, so the
/// caller null-checks once at construction instead of at every use.
pub struct Page {
    doc: Arc<RwLock<Document>>,
    config: Arc<ChainConfig>,
    registry: Arc<OpRegistry>,
    fetcher: Arc<dyn FetchBackend>,
    id: Uuid,
}

impl Page {
    /// Parse an HTML document with default configuration
    pub fn from_html(html: &str) -> Self {
        Self::with_config(html, ChainConfig::new())
    }

    pub fn with_config(html: &str, config: ChainConfig) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(page = %id, "parsing document");
        Self {
            doc: Arc::new(RwLock::new(parse::parse_document(html))),
            config: Arc::new(config),
            registry: Arc::new(OpRegistry::standard()),
            fetcher: Arc::new(HttpFetcher::new()),
            id,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn FetchBackend>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> Arc<ChainConfig> {
        self.config.clone()
    }

    /// Shared document, for interop outside the chain abstraction
    pub fn document(&self) -> Arc<RwLock<Document>> {
        self.doc.clone()
    }

    /// Replace the error handler for every lineage of this page
    pub fn set_error_handler(&self, handler: ErrorHandler) {
        self.config.set_error_handler(handler);
    }

    /// Register or overwrite a named operation for every handle of this page
    pub fn override_op(&self, name: &str, op: OpFn) {
        self.registry.register(name, op);
    }

    // ---- construction surface ----

    /// Handle over the first element matching the selector
    pub async fn find(&self, selector: &str) -> Option<Handle> {
        let context = format!("find {selector}");
        let nodes = self.resolve(selector, &context).await?;
        let first = nodes.first().copied()?;
        Some(self.new_handle(Target::Single(first), selector))
    }

    /// Handle over every element matching the selector
    pub async fn find_all(&self, selector: &str) -> Option<Handle> {
        let context = format!("find_all {selector}");
        let nodes = self.resolve(selector, &context).await?;
        Some(self.new_handle(Target::Many(nodes), selector))
    }

    /// Handle over existing nodes; empty input is reported like a failed find
    pub fn handle_for(&self, nodes: Vec<NodeId>, origin: &str) -> Option<Handle> {
        if nodes.is_empty() {
            self.config.report(
                &DomError::NoElementsFound(origin.to_string()),
                &format!("handle_for {origin}"),
            );
            return None;
        }
        let target = if nodes.len() == 1 {
            Target::Single(nodes[0])
        } else {
            Target::Many(nodes)
        };
        Some(self.new_handle(target, origin))
    }

    async fn resolve(&self, selector: &str, context: &str) -> Option<Vec<NodeId>> {
        let parsed = match SelectorList::parse(selector) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.config.report(&err, context);
                return None;
            }
        };
        let doc = self.doc.read().await;
        let nodes = doc.query(doc.root(), &parsed);
        if nodes.is_empty() {
            self.config
                .report(&DomError::NoElementsFound(selector.to_string()), context);
            return None;
        }
        Some(nodes)
    }

    fn new_handle(&self, target: Target, origin: &str) -> Handle {
        Handle::new(
            self.doc.clone(),
            target,
            Sequencer::new(self.config.clone()),
            self.registry.clone(),
            self.config.clone(),
            self.fetcher.clone(),
            origin.to_string(),
            false,
        )
    }

    // ---- interop helpers ----

    /// Fire a synthetic event on a node, bubbling to the root
    pub async fn dispatch(&self, node: NodeId, event: &str, detail: Value) {
        events::dispatch(&self.doc, node, event, detail).await;
    }

    /// Serialized document
    pub async fn html(&self) -> String {
        let doc = self.doc.read().await;
        doc.outer_html(doc.root())
    }

    /// Text content of the first element matching the selector
    pub async fn text_content(&self, selector: &str) -> Option<String> {
        let doc = self.doc.read().await;
        let node = doc.first_match(selector)?;
        Some(doc.text(node))
    }

    /// Attribute of the first element matching the selector
    pub async fn attribute(&self, selector: &str, name: &str) -> Option<String> {
        let doc = self.doc.read().await;
        let node = doc.first_match(selector)?;
        doc.attribute(node, name)
    }
}

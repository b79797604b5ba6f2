use crate::dom::document::Document;
use crate::dom::node::NodeId;
use crate::dom::selector::SelectorList;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A synthetic DOM event delivered to listeners while it bubbles from the
/// target up to the document root.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    /// Node the event was dispatched on
    pub target: NodeId,
    /// Node whose listener is currently being invoked
    pub current: NodeId,
    pub detail: Value,
}

pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Clone)]
pub(crate) struct Listener {
    pub id: u64,
    pub once: bool,
    /// Delegated listeners only fire when the event target matches
    pub filter: Option<SelectorList>,
    pub callback: EventCallback,
}

/// Fire an event on `target`, bubbling to the root.
///
/// Listener callbacks run outside the document lock so they are free to
/// enqueue further chain operations.
pub async fn dispatch(doc: &Arc<RwLock<Document>>, target: NodeId, name: &str, detail: Value) {
    let plan = {
        let guard = doc.read().await;
        guard.dispatch_plan(target, name)
    };
    if plan.is_empty() {
        return;
    }

    let mut fired_once: Vec<(NodeId, u64)> = Vec::new();
    for (current, listener) in &plan {
        let event = Event {
            name: name.to_string(),
            target,
            current: *current,
            detail: detail.clone(),
        };
        (listener.callback)(&event);
        if listener.once {
            fired_once.push((*current, listener.id));
        }
    }

    if !fired_once.is_empty() {
        let mut guard = doc.write().await;
        guard.remove_listener_ids(name, &fired_once);
    }
}

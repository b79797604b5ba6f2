use crate::dom::events::{self, EventCallback};
use crate::dom::selector::SelectorList;
use crate::handle::Handle;
use futures::future::join_all;
use serde_json::Value;
use std::time::Duration;

/// Ordered style snapshots applied in sequence by [`Handle::transition`]
#[derive(Debug, Clone, Default)]
pub struct Keyframes {
    pub(crate) frames: Vec<Vec<(String, String)>>,
}

impl Keyframes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(mut self, styles: &[(&str, &str)]) -> Self {
        self.frames.push(
            styles
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TransitionOptions {
    pub duration_ms: u64,
}

impl TransitionOptions {
    pub fn duration(duration_ms: u64) -> Self {
        Self { duration_ms }
    }
}

impl Handle {
    // ---- event binding ----

    pub fn on(&self, event: &str, callback: EventCallback) -> Handle {
        self.bind(event, false, None, callback, "on")
    }

    /// Listener removed after its first invocation
    pub fn once(&self, event: &str, callback: EventCallback) -> Handle {
        self.bind(event, true, None, callback, "once")
    }

    /// Delegated listener: fires only when the bubbling event's target
    /// matches the sub-selector
    pub fn delegate(&self, event: &str, sub_selector: &str, callback: EventCallback) -> Handle {
        let event = event.to_string();
        let sub_selector = sub_selector.to_string();
        self.enqueue_op("delegate", move |h| async move {
            let filter = SelectorList::parse(&sub_selector)?;
            let nodes = h.nodes();
            let mut doc = h.doc.write().await;
            for node in nodes {
                doc.add_listener(node, &event, false, Some(filter.clone()), callback.clone());
            }
            Ok(())
        })
    }

    /// Remove every listener for the event on each target
    pub fn off(&self, event: &str) -> Handle {
        let event = event.to_string();
        self.enqueue_op("off", move |h| async move {
            let nodes = h.nodes();
            let mut doc = h.doc.write().await;
            for node in nodes {
                doc.remove_listeners(node, &event);
            }
            Ok(())
        })
    }

    /// Dispatch a synthetic event on each target as a queued step
    pub fn fire(&self, event: &str, detail: Value) -> Handle {
        let event = event.to_string();
        self.enqueue_op("fire", move |h| async move {
            for node in h.nodes() {
                events::dispatch(&h.doc, node, &event, detail.clone()).await;
            }
            Ok(())
        })
    }

    fn bind(
        &self,
        event: &str,
        once: bool,
        filter: Option<SelectorList>,
        callback: EventCallback,
        name: &str,
    ) -> Handle {
        let event = event.to_string();
        self.enqueue_op(name, move |h| async move {
            let nodes = h.nodes();
            let mut doc = h.doc.write().await;
            for node in nodes {
                doc.add_listener(node, &event, once, filter.clone(), callback.clone());
            }
            Ok(())
        })
    }

    // ---- animation ----

    /// Step through the keyframes over the given duration. A collection
    /// target settles when all members' animations finish, not just the
    /// first.
    pub fn transition(&self, keyframes: Keyframes, options: TransitionOptions) -> Handle {
        self.enqueue_op("transition", move |h| async move {
            if keyframes.is_empty() {
                return Ok(());
            }
            let step = options.duration_ms / keyframes.len() as u64;
            let animations = h.nodes().into_iter().map(|node| {
                let doc = h.doc.clone();
                let frames = keyframes.frames.clone();
                async move {
                    for frame in frames {
                        tokio::time::sleep(Duration::from_millis(step)).await;
                        let mut guard = doc.write().await;
                        for (name, value) in &frame {
                            guard.with_element(node, |el| el.set_style(name, value));
                        }
                    }
                }
            });
            join_all(animations).await;
            Ok(())
        })
    }
}

use crate::dom::document::Document;
use crate::dom::node::NodeId;
use crate::dom::selector::SelectorList;
use crate::errors::{DomError, Result};
use crate::handle::{Handle, Target};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
enum SwitchMode {
    /// A single target stepping to exactly one node stays single
    Preserve,
    /// Always narrow to the first computed node
    First,
    /// Always become a collection
    Collection,
}

/// Target switching: traversal operations compute a new target from the
/// current one and rebind the handle to it, on the same sequencer, so
/// ordering is preserved across switches.
///
/// An empty computed target signals `NoElementsFound` and leaves the prior
/// target untouched; a fixed handle signals `HandleIsFixed` and never
/// traverses.
impl Handle {
    fn switch<F>(&self, name: &str, mode: SwitchMode, compute: F) -> Handle
    where
        F: FnOnce(&Document, &[NodeId]) -> Result<Vec<NodeId>> + Send + 'static,
    {
        let context = self.op_context(name);
        self.enqueue_op(name, move |h| async move {
            if h.fixed {
                return Err(DomError::HandleIsFixed(context));
            }
            let (nodes, was_single) = {
                let target = h.target.read().unwrap_or_else(|e| e.into_inner());
                (target.nodes(), target.is_single())
            };
            let computed = {
                let doc = h.doc.read().await;
                compute(&doc, &nodes)?
            };
            if computed.is_empty() {
                return Err(DomError::NoElementsFound(context));
            }
            let new_target = match mode {
                SwitchMode::First => Target::Single(computed[0]),
                SwitchMode::Preserve if was_single && computed.len() == 1 => {
                    Target::Single(computed[0])
                }
                _ => Target::Many(computed),
            };
            *h.target.write().unwrap_or_else(|e| e.into_inner()) = new_target;
            Ok(())
        })
    }

    pub fn next(&self) -> Handle {
        self.switch("next", SwitchMode::Preserve, |doc, nodes| {
            Ok(step_each(nodes, false, |n| {
                doc.next_element_sibling(n).into_iter().collect()
            }))
        })
    }

    pub fn prev(&self) -> Handle {
        self.switch("prev", SwitchMode::Preserve, |doc, nodes| {
            Ok(step_each(nodes, false, |n| {
                doc.prev_element_sibling(n).into_iter().collect()
            }))
        })
    }

    /// First element child of each target
    pub fn first(&self) -> Handle {
        self.switch("first", SwitchMode::Preserve, |doc, nodes| {
            Ok(step_each(nodes, false, |n| {
                doc.first_element_child(n).into_iter().collect()
            }))
        })
    }

    /// Last element child of each target
    pub fn last(&self) -> Handle {
        self.switch("last", SwitchMode::Preserve, |doc, nodes| {
            Ok(step_each(nodes, false, |n| {
                doc.last_element_child(n).into_iter().collect()
            }))
        })
    }

    /// Parent of each target; duplicates collapse since siblings share one
    pub fn parent(&self) -> Handle {
        self.switch("parent", SwitchMode::Preserve, |doc, nodes| {
            Ok(step_each(nodes, true, |n| {
                doc.parent_element(n).into_iter().collect()
            }))
        })
    }

    /// Closest ancestor matching the sub-selector
    pub fn ancestor(&self, selector: &str) -> Handle {
        let selector = selector.to_string();
        self.switch("ancestor", SwitchMode::Preserve, move |doc, nodes| {
            let sel = SelectorList::parse(&selector)?;
            Ok(step_each(nodes, true, |n| {
                let mut current = doc.parent_element(n);
                while let Some(a) = current {
                    if sel.matches(doc, a) {
                        return vec![a];
                    }
                    current = doc.parent_element(a);
                }
                Vec::new()
            }))
        })
    }

    /// All element children of each target
    pub fn kids(&self) -> Handle {
        self.switch("kids", SwitchMode::Collection, |doc, nodes| {
            Ok(step_each(nodes, false, |n| doc.element_children(n)))
        })
    }

    pub fn siblings(&self) -> Handle {
        self.switch("siblings", SwitchMode::Collection, |doc, nodes| {
            Ok(step_each(nodes, true, |n| doc.sibling_elements(n)))
        })
    }

    /// First descendant matching the sub-selector
    pub fn pick(&self, selector: &str) -> Handle {
        let selector = selector.to_string();
        self.switch("pick", SwitchMode::First, move |doc, nodes| {
            let sel = SelectorList::parse(&selector)?;
            Ok(step_each(nodes, true, |n| doc.query(n, &sel)))
        })
    }

    /// All descendants matching the sub-selector
    pub fn pick_all(&self, selector: &str) -> Handle {
        let selector = selector.to_string();
        self.switch("pick_all", SwitchMode::Collection, move |doc, nodes| {
            let sel = SelectorList::parse(&selector)?;
            Ok(step_each(nodes, true, |n| doc.query(n, &sel)))
        })
    }
}

fn step_each(
    nodes: &[NodeId],
    dedup: bool,
    step: impl Fn(NodeId) -> Vec<NodeId>,
) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for &node in nodes {
        for result in step(node) {
            if !dedup || seen.insert(result) {
                out.push(result);
            }
        }
    }
    out
}

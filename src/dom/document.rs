use crate::dom::events::{EventCallback, Listener};
use crate::dom::node::{ElementData, NodeData, NodeId, NodeKind};
use crate::dom::selector::SelectorList;
use std::collections::HashMap;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// An in-memory document: an arena of element and text nodes plus the
/// listener table backing synthetic events.
///
/// Detached nodes stay in the arena without a parent; the arena is never
/// compacted, node ids stay valid for the document's lifetime.
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    listeners: HashMap<(NodeId, String), Vec<Listener>>,
    next_listener_id: u64,
}

impl Document {
    /// An empty document with a bare `<html>` root
    pub fn new() -> Self {
        let root_data = NodeData {
            id: NodeId(0),
            kind: NodeKind::Element(ElementData::new("html")),
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root_data],
            root: NodeId(0),
            listeners: HashMap::new(),
            next_listener_id: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.0)
    }

    // ---- construction ----

    pub fn create_element(&mut self, tag_name: &str) -> NodeId {
        self.push_node(NodeKind::Element(ElementData::new(tag_name)))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push_node(NodeKind::Text(text.into()))
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            id,
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    // ---- structure ----

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(child.0) {
            node.parent = Some(parent);
        }
    }

    pub fn insert_before(&mut self, reference: NodeId, child: NodeId) {
        let Some(parent) = self.node(reference).and_then(|n| n.parent) else {
            return;
        };
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(parent.0) {
            let pos = node
                .children
                .iter()
                .position(|&c| c == reference)
                .unwrap_or(node.children.len());
            node.children.insert(pos, child);
        }
        if let Some(node) = self.nodes.get_mut(child.0) {
            node.parent = Some(parent);
        }
    }

    /// Unlink a node from its parent; the subtree stays in the arena
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.retain(|&c| c != id);
        }
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.parent = None;
        }
    }

    /// Insert `new` where `old` sits and detach `old`
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) {
        self.insert_before(old, new);
        self.detach(old);
    }

    /// Deep-copy a subtree; the copy is detached. Listeners are not copied.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let (kind, children) = match self.node(id) {
            Some(node) => (node.kind.clone(), node.children.clone()),
            None => return id,
        };
        let copy = self.push_node(kind);
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    // ---- element state ----

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.node(id)
            .and_then(|n| n.as_element())
            .map(|el| el.tag_name.as_str())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<String> {
        let el = self.node(id)?.as_element()?;
        self.attribute_of(el, name)
    }

    /// Attribute lookup with `class`/`style` synthesized from their
    /// structured forms
    pub fn attribute_of(&self, el: &ElementData, name: &str) -> Option<String> {
        match name {
            "class" => el.class_attr(),
            "style" => el.style_attr(),
            _ => el.attributes.get(name).cloned(),
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(el) = self.nodes.get_mut(id.0).and_then(|n| n.as_element_mut()) else {
            return;
        };
        match name {
            "class" => {
                el.classes = value.split_whitespace().map(str::to_string).collect();
            }
            "style" => {
                el.styles = value
                    .split(';')
                    .filter_map(|decl| {
                        let (n, v) = decl.split_once(':')?;
                        Some((n.trim().to_string(), v.trim().to_string()))
                    })
                    .collect();
            }
            _ => {
                el.attributes.insert(name.to_string(), value.to_string());
            }
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        let Some(el) = self.nodes.get_mut(id.0).and_then(|n| n.as_element_mut()) else {
            return;
        };
        match name {
            "class" => el.classes.clear(),
            "style" => el.styles.clear(),
            _ => {
                el.attributes.remove(name);
            }
        }
    }

    /// Boolean-attribute toggle: present becomes absent and vice versa
    pub fn toggle_attribute(&mut self, id: NodeId, name: &str) {
        if self.attribute(id, name).is_some() {
            self.remove_attribute(id, name);
        } else {
            self.set_attribute(id, name, "");
        }
    }

    pub fn has_class(&self, id: NodeId, name: &str) -> bool {
        self.node(id)
            .and_then(|n| n.as_element())
            .map(|el| el.has_class(name))
            .unwrap_or(false)
    }

    pub fn with_element<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut ElementData) -> R,
    ) -> Option<R> {
        self.nodes.get_mut(id.0).and_then(|n| n.as_element_mut()).map(f)
    }

    // ---- text ----

    /// Concatenated text of all descendant text nodes, in document order
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else { return };
        match &node.kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Element(_) => {
                for &child in &node.children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Replace all children with a single text node
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        self.clear_children(id);
        let text_node = self.create_text(text);
        self.append_child(id, text_node);
    }

    /// Replace all children with parsed fragment content
    pub fn set_inner_html(&mut self, id: NodeId, html: &str) {
        self.clear_children(id);
        for node in crate::dom::parse::import_fragment(self, html) {
            self.append_child(id, node);
        }
    }

    pub fn clear_children(&mut self, id: NodeId) {
        let children = match self.node(id) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for child in children {
            self.detach(child);
        }
    }

    // ---- queries & traversal ----

    pub fn matches(&self, id: NodeId, selector: &SelectorList) -> bool {
        selector.matches(self, id)
    }

    /// All descendants of `scope` (excluding it) matching the selector,
    /// in document order
    pub fn query(&self, scope: NodeId, selector: &SelectorList) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&id| selector.matches(self, id))
            .collect()
    }

    /// First match anywhere in the document; parses the selector text.
    /// Intended for interop and tests; chain code parses selectors once.
    pub fn first_match(&self, selector: &str) -> Option<NodeId> {
        let sel = SelectorList::parse(selector).ok()?;
        self.query(self.root, &sel).into_iter().next()
    }

    pub fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(scope, &mut out);
        out
    }

    fn walk(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(id) else { return };
        for &child in &node.children {
            out.push(child);
            self.walk(child, out);
        }
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id)?.parent?;
        self.node(parent)?.is_element().then_some(parent)
    }

    /// True when `node` sits inside the subtree rooted at `ancestor`
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.node(node).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).and_then(|n| n.parent);
        }
        false
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|n| {
                n.children
                    .iter()
                    .copied()
                    .filter(|&c| self.node(c).map(NodeData::is_element).unwrap_or(false))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.element_children(id).into_iter().next()
    }

    pub fn last_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.element_children(id).into_iter().last()
    }

    pub fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id)?.parent?;
        let siblings = self.element_children(parent);
        let pos = siblings.iter().position(|&s| s == id)?;
        siblings.get(pos + 1).copied()
    }

    pub fn prev_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id)?.parent?;
        let siblings = self.element_children(parent);
        let pos = siblings.iter().position(|&s| s == id)?;
        pos.checked_sub(1).and_then(|p| siblings.get(p)).copied()
    }

    /// All element siblings excluding the node itself
    pub fn sibling_elements(&self, id: NodeId) -> Vec<NodeId> {
        match self.node(id).and_then(|n| n.parent) {
            Some(parent) => self
                .element_children(parent)
                .into_iter()
                .filter(|&s| s != id)
                .collect(),
            None => Vec::new(),
        }
    }

    // ---- listeners ----

    pub fn add_listener(
        &mut self,
        id: NodeId,
        event: &str,
        once: bool,
        filter: Option<SelectorList>,
        callback: EventCallback,
    ) -> u64 {
        let listener_id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners
            .entry((id, event.to_string()))
            .or_default()
            .push(Listener {
                id: listener_id,
                once,
                filter,
                callback,
            });
        listener_id
    }

    pub fn remove_listeners(&mut self, id: NodeId, event: &str) {
        self.listeners.remove(&(id, event.to_string()));
    }

    /// Listeners to invoke for an event on `target`, bubbling order:
    /// target first, then each ancestor up to the root. Delegated
    /// listeners are filtered against the target here.
    pub(crate) fn dispatch_plan(&self, target: NodeId, event: &str) -> Vec<(NodeId, Listener)> {
        let mut plan = Vec::new();
        let mut current = Some(target);
        while let Some(id) = current {
            if let Some(listeners) = self.listeners.get(&(id, event.to_string())) {
                for listener in listeners {
                    let applies = match &listener.filter {
                        Some(filter) => filter.matches(self, target),
                        None => true,
                    };
                    if applies {
                        plan.push((id, listener.clone()));
                    }
                }
            }
            current = self.node(id).and_then(|n| n.parent);
        }
        plan
    }

    pub(crate) fn remove_listener_ids(&mut self, event: &str, fired: &[(NodeId, u64)]) {
        for (node, listener_id) in fired {
            if let Some(listeners) = self.listeners.get_mut(&(*node, event.to_string())) {
                listeners.retain(|l| l.id != *listener_id);
            }
        }
    }

    // ---- serialization ----

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(node) = self.node(id) {
            for &child in &node.children {
                self.serialize(child, &mut out);
            }
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize(id, &mut out);
        out
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else { return };
        match &node.kind {
            NodeKind::Text(t) => out.push_str(&escape_text(t)),
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag_name);
                let mut names: Vec<&String> = el.attributes.keys().collect();
                names.sort();
                for name in names {
                    if let Some(value) = el.attributes.get(name) {
                        out.push_str(&format!(" {}=\"{}\"", name, escape_attr(value)));
                    }
                }
                if let Some(class) = el.class_attr() {
                    out.push_str(&format!(" class=\"{}\"", escape_attr(&class)));
                }
                if let Some(style) = el.style_attr() {
                    out.push_str(&format!(" style=\"{}\"", escape_attr(&style)));
                }
                if VOID_ELEMENTS.contains(&el.tag_name.as_str()) {
                    out.push('>');
                    return;
                }
                out.push('>');
                for &child in &node.children {
                    self.serialize(child, out);
                }
                out.push_str(&format!("</{}>", el.tag_name));
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse::parse_document;

    #[test]
    fn structural_ops_keep_links_consistent() {
        let mut doc = Document::new();
        let root = doc.root();
        let list = doc.create_element("ul");
        doc.append_child(root, list);
        let a = doc.create_element("li");
        let b = doc.create_element("li");
        doc.append_child(list, a);
        doc.append_child(list, b);
        doc.set_text(a, "first");
        doc.set_text(b, "second");

        assert_eq!(doc.element_children(list), vec![a, b]);
        assert_eq!(doc.next_element_sibling(a), Some(b));
        assert_eq!(doc.prev_element_sibling(b), Some(a));

        let c = doc.create_element("li");
        doc.insert_before(b, c);
        assert_eq!(doc.element_children(list), vec![a, c, b]);

        doc.detach(c);
        assert_eq!(doc.element_children(list), vec![a, b]);
        assert!(doc.node(c).unwrap().parent.is_none());
    }

    #[test]
    fn clone_subtree_is_deep_and_detached() {
        let doc_src = "<html><body><div id='d'><span>hi</span></div></body></html>";
        let mut doc = parse_document(doc_src);
        let div = doc.first_match("#d").unwrap();
        let copy = doc.clone_subtree(div);

        assert!(doc.node(copy).unwrap().parent.is_none());
        assert_eq!(doc.text(copy), "hi");
        // mutating the copy leaves the original alone
        doc.set_text(copy, "bye");
        assert_eq!(doc.text(div), "hi");
    }

    #[test]
    fn class_and_style_round_trip_through_attributes() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        doc.append_child(doc.root(), el);

        doc.set_attribute(el, "class", "a b");
        assert!(doc.has_class(el, "a"));
        doc.with_element(el, |e| e.toggle_class("b"));
        assert_eq!(doc.attribute(el, "class").as_deref(), Some("a"));

        doc.with_element(el, |e| e.set_style("color", "red"));
        assert_eq!(doc.attribute(el, "style").as_deref(), Some("color: red"));

        assert_eq!(
            doc.outer_html(el),
            "<div class=\"a\" style=\"color: red\"></div>"
        );
    }

    #[test]
    fn text_concatenates_descendants() {
        let doc = parse_document("<html><body><p>a<b>b</b>c</p></body></html>");
        let p = doc.first_match("p").unwrap();
        assert_eq!(doc.text(p), "abc");
    }
}

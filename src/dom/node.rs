use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Index of a node inside a [`Document`](crate::dom::Document) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag_name: String,
    pub attributes: HashMap<String, String>,
    pub classes: Vec<String>,
    pub styles: Vec<(String, String)>,
}

impl ElementData {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into().to_ascii_lowercase(),
            attributes: HashMap::new(),
            classes: Vec::new(),
            styles: Vec::new(),
        }
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.iter().any(|c| c == name)
    }

    pub fn add_class(&mut self, name: &str) {
        if !self.has_class(name) {
            self.classes.push(name.to_string());
        }
    }

    pub fn remove_class(&mut self, name: &str) {
        self.classes.retain(|c| c != name);
    }

    pub fn toggle_class(&mut self, name: &str) {
        if self.has_class(name) {
            self.remove_class(name);
        } else {
            self.add_class(name);
        }
    }

    pub fn style(&self, name: &str) -> Option<&str> {
        self.styles
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_style(&mut self, name: &str, value: &str) {
        if let Some(entry) = self.styles.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value.to_string();
        } else {
            self.styles.push((name.to_string(), value.to_string()));
        }
    }

    /// The `class` attribute as it would serialize
    pub fn class_attr(&self) -> Option<String> {
        if self.classes.is_empty() {
            None
        } else {
            Some(self.classes.join(" "))
        }
    }

    /// The `style` attribute as it would serialize
    pub fn style_attr(&self) -> Option<String> {
        if self.styles.is_empty() {
            None
        } else {
            let parts: Vec<String> = self
                .styles
                .iter()
                .map(|(n, v)| format!("{}: {}", n, v))
                .collect();
            Some(parts.join("; "))
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeData {
    pub id: NodeId,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl NodeData {
    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element(_))
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(el) => Some(el),
            NodeKind::Text(_) => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.kind {
            NodeKind::Element(el) => Some(el),
            NodeKind::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(t) => Some(t),
            NodeKind::Element(_) => None,
        }
    }
}

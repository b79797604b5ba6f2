use crate::dom::document::Document;
use crate::dom::node::NodeId;
use scraper::{Html, Node};

/// Parse a complete HTML document into an arena [`Document`].
///
/// Parsing is error-tolerant (html5ever underneath); malformed input yields
/// whatever the parser recovers.
pub fn parse_document(html: &str) -> Document {
    let parsed = Html::parse_document(html);
    let mut doc = Document::new();
    let root = doc.root();

    // html5ever guarantees a single <html> element under the tree root
    for node_ref in parsed.tree.root().children() {
        if let Node::Element(el) = node_ref.value() {
            for (name, value) in el.attrs() {
                doc.set_attribute(root, name, value);
            }
            for child in node_ref.children() {
                if let Some(id) = import_node(&mut doc, child) {
                    doc.append_child(root, id);
                }
            }
        }
    }
    doc
}

/// Parse an HTML fragment into detached nodes inside `doc`.
///
/// Returns the top-level imported node ids in source order; callers decide
/// where to attach them.
pub fn import_fragment(doc: &mut Document, html: &str) -> Vec<NodeId> {
    let parsed = Html::parse_fragment(html);
    let mut out = Vec::new();
    // parse_fragment wraps content in a synthetic <html> element
    for node_ref in parsed.tree.root().children() {
        if let Node::Element(_) = node_ref.value() {
            for child in node_ref.children() {
                if let Some(id) = import_node(doc, child) {
                    out.push(id);
                }
            }
        }
    }
    out
}

fn import_node(doc: &mut Document, node_ref: ego_tree::NodeRef<'_, Node>) -> Option<NodeId> {
    match node_ref.value() {
        Node::Element(el) => {
            let id = doc.create_element(el.name());
            for (name, value) in el.attrs() {
                doc.set_attribute(id, name, value);
            }
            for child in node_ref.children() {
                if let Some(child_id) = import_node(doc, child) {
                    doc.append_child(id, child_id);
                }
            }
            Some(id)
        }
        Node::Text(text) => {
            let content = String::from(&*text.text);
            // inter-element whitespace is noise for text() and serialization
            if content.trim().is_empty() {
                None
            } else {
                Some(doc.create_text(content))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imports_document_structure() {
        let doc = parse_document(
            "<html><body><div id='a' class='x y'><p>hello</p></div></body></html>",
        );
        let div = doc.first_match("#a").unwrap();
        assert_eq!(doc.tag_name(div), Some("div"));
        assert!(doc.has_class(div, "x"));
        assert!(doc.has_class(div, "y"));
        assert_eq!(doc.text(div), "hello");
    }

    #[test]
    fn imports_fragment_as_detached_nodes() {
        let mut doc = parse_document("<html><body></body></html>");
        let body = doc.first_match("body").unwrap();
        let nodes = import_fragment(&mut doc, "<span>a</span><span>b</span>");
        assert_eq!(nodes.len(), 2);
        for id in &nodes {
            assert!(doc.node(*id).unwrap().parent.is_none());
            doc.append_child(body, *id);
        }
        assert_eq!(doc.text(body), "ab");
    }

    #[test]
    fn survives_malformed_markup() {
        let doc = parse_document("<html><body><p>unclosed<div>ok</div></body>");
        assert!(doc.first_match("div").is_some());
    }
}

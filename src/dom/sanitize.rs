use crate::dom::document::Document;
use crate::dom::node::NodeId;
use crate::dom::parse;

const STRIPPED_TAGS: &[&str] = &["script", "style", "iframe", "object", "embed"];
const URL_ATTRIBUTES: &[&str] = &["href", "src", "action"];

/// Default sanitizer hook: parses the fragment, drops script-capable
/// subtrees, strips inline event handlers and `javascript:` URLs, and
/// serializes the remainder.
///
/// A browser-grade sanitizer is an external collaborator; swap this out via
/// [`ChainConfig::with_sanitizer`](crate::config::ChainConfig::with_sanitizer).
pub fn clean_html(html: &str) -> String {
    let mut doc = Document::new();
    let root = doc.root();
    for id in parse::import_fragment(&mut doc, html) {
        doc.append_child(root, id);
    }
    scrub(&mut doc, root);
    doc.inner_html(root)
}

fn scrub(doc: &mut Document, id: NodeId) {
    let children = match doc.node(id) {
        Some(node) => node.children.clone(),
        None => return,
    };
    for child in children {
        let tag = doc.tag_name(child).map(str::to_string);
        match tag {
            Some(tag) if STRIPPED_TAGS.contains(&tag.as_str()) => {
                doc.detach(child);
            }
            Some(_) => {
                scrub_attributes(doc, child);
                scrub(doc, child);
            }
            None => {}
        }
    }
}

fn scrub_attributes(doc: &mut Document, id: NodeId) {
    let names: Vec<String> = doc
        .node(id)
        .and_then(|n| n.as_element())
        .map(|el| el.attributes.keys().cloned().collect())
        .unwrap_or_default();
    for name in names {
        if name.starts_with("on") {
            doc.remove_attribute(id, &name);
            continue;
        }
        if URL_ATTRIBUTES.contains(&name.as_str()) {
            let value = doc.attribute(id, &name).unwrap_or_default();
            if value.trim_start().to_ascii_lowercase().starts_with("javascript:") {
                doc.remove_attribute(id, &name);
            }
        }
    }
}

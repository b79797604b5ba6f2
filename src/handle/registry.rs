use crate::config::ChainConfig;
use crate::dom::document::Document;
use crate::dom::node::NodeId;
use crate::dom::selector::SelectorList;
use crate::errors::{DomError, Result};
use crate::queue::OpFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Execution context handed to a registry operation: the shared document,
/// the node set resolved from the handle's target at drain time, and the
/// lineage configuration.
pub struct OpCx {
    pub doc: Arc<tokio::sync::RwLock<Document>>,
    pub nodes: Vec<NodeId>,
    pub config: Arc<ChainConfig>,
}

pub type OpFn = Arc<dyn Fn(OpCx, Value) -> OpFuture + Send + Sync>;

/// Named DOM-mutation operations, keyed by method name.
///
/// Handles dispatch the plain mutation methods (`text`, `css`, `set`, ...)
/// through this table, so registering a name again overwrites the built-in
/// behavior for every handle sharing the registry.
pub struct OpRegistry {
    ops: RwLock<HashMap<String, OpFn>>,
}

macro_rules! register_standard {
    ($registry:expr, $( $name:literal => $func:ident ),+ $(,)?) => {
        $(
            $registry.register($name, Arc::new(|cx, args| Box::pin($func(cx, args))));
        )+
    };
}

impl OpRegistry {
    /// Registry preloaded with the built-in operation set
    pub fn standard() -> Self {
        let registry = Self {
            ops: RwLock::new(HashMap::new()),
        };
        register_standard!(registry,
            "text" => op_text,
            "html" => op_html,
            "sanitize" => op_sanitize,
            "val" => op_val,
            "css" => op_css,
            "add_class" => op_add_class,
            "remove_class" => op_remove_class,
            "toggle_class" => op_toggle_class,
            "set" => op_set,
            "unset" => op_unset,
            "toggle" => op_toggle,
            "data" => op_data,
            "attach" => op_attach,
            "clone_to" => op_clone_to,
            "move_to" => op_move_to,
            "become" => op_become,
            "purge" => op_purge,
        );
        registry
    }

    /// Register or overwrite an operation
    pub fn register(&self, name: &str, op: OpFn) {
        let mut ops = self.ops.write().unwrap_or_else(|e| e.into_inner());
        ops.insert(name.to_string(), op);
    }

    pub fn names(&self) -> Vec<String> {
        let ops = self.ops.read().unwrap_or_else(|e| e.into_inner());
        ops.keys().cloned().collect()
    }

    pub fn invoke(&self, name: &str, cx: OpCx, args: Value) -> OpFuture {
        let op = {
            let ops = self.ops.read().unwrap_or_else(|e| e.into_inner());
            ops.get(name).cloned()
        };
        match op {
            Some(op) => op(cx, args),
            None => {
                let name = name.to_string();
                Box::pin(async move { Err(DomError::operation(&name, "unknown operation")) })
            }
        }
    }
}

// ---- argument helpers ----

fn str_arg(op: &str, args: &Value, idx: usize) -> Result<String> {
    args.get(idx)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DomError::operation(op, format!("missing string argument {idx}")))
}

/// Like `str_arg` but stringifies non-string JSON values
fn stringy_arg(op: &str, args: &Value, idx: usize) -> Result<String> {
    match args.get(idx) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(v) => Ok(v.to_string()),
        None => Err(DomError::operation(op, format!("missing argument {idx}"))),
    }
}

// ---- built-in operations ----

async fn op_text(cx: OpCx, args: Value) -> Result<()> {
    let value = str_arg("text", &args, 0)?;
    let mut doc = cx.doc.write().await;
    for node in cx.nodes {
        doc.set_text(node, &value);
    }
    Ok(())
}

async fn op_html(cx: OpCx, args: Value) -> Result<()> {
    let value = str_arg("html", &args, 0)?;
    let mut doc = cx.doc.write().await;
    for node in cx.nodes {
        doc.set_inner_html(node, &value);
    }
    Ok(())
}

async fn op_sanitize(cx: OpCx, args: Value) -> Result<()> {
    let value = str_arg("sanitize", &args, 0)?;
    let clean = (cx.config.sanitizer)(&value);
    let mut doc = cx.doc.write().await;
    for node in cx.nodes {
        doc.set_inner_html(node, &clean);
    }
    Ok(())
}

async fn op_val(cx: OpCx, args: Value) -> Result<()> {
    let value = stringy_arg("val", &args, 0)?;
    let mut doc = cx.doc.write().await;
    for node in cx.nodes {
        doc.set_attribute(node, "value", &value);
    }
    Ok(())
}

async fn op_css(cx: OpCx, args: Value) -> Result<()> {
    let name = str_arg("css", &args, 0)?;
    let value = str_arg("css", &args, 1)?;
    let mut doc = cx.doc.write().await;
    for node in cx.nodes {
        doc.with_element(node, |el| el.set_style(&name, &value));
    }
    Ok(())
}

async fn op_add_class(cx: OpCx, args: Value) -> Result<()> {
    let name = str_arg("add_class", &args, 0)?;
    let mut doc = cx.doc.write().await;
    for node in cx.nodes {
        doc.with_element(node, |el| el.add_class(&name));
    }
    Ok(())
}

async fn op_remove_class(cx: OpCx, args: Value) -> Result<()> {
    let name = str_arg("remove_class", &args, 0)?;
    let mut doc = cx.doc.write().await;
    for node in cx.nodes {
        doc.with_element(node, |el| el.remove_class(&name));
    }
    Ok(())
}

async fn op_toggle_class(cx: OpCx, args: Value) -> Result<()> {
    let name = str_arg("toggle_class", &args, 0)?;
    let mut doc = cx.doc.write().await;
    for node in cx.nodes {
        doc.with_element(node, |el| el.toggle_class(&name));
    }
    Ok(())
}

async fn op_set(cx: OpCx, args: Value) -> Result<()> {
    let name = str_arg("set", &args, 0)?;
    let value = stringy_arg("set", &args, 1)?;
    let mut doc = cx.doc.write().await;
    for node in cx.nodes {
        doc.set_attribute(node, &name, &value);
    }
    Ok(())
}

async fn op_unset(cx: OpCx, args: Value) -> Result<()> {
    let name = str_arg("unset", &args, 0)?;
    let mut doc = cx.doc.write().await;
    for node in cx.nodes {
        doc.remove_attribute(node, &name);
    }
    Ok(())
}

async fn op_toggle(cx: OpCx, args: Value) -> Result<()> {
    let name = str_arg("toggle", &args, 0)?;
    let mut doc = cx.doc.write().await;
    for node in cx.nodes {
        doc.toggle_attribute(node, &name);
    }
    Ok(())
}

async fn op_data(cx: OpCx, args: Value) -> Result<()> {
    let key = str_arg("data", &args, 0)?;
    let value = stringy_arg("data", &args, 1)?;
    let name = format!("data-{key}");
    let mut doc = cx.doc.write().await;
    for node in cx.nodes {
        doc.set_attribute(node, &name, &value);
    }
    Ok(())
}

async fn op_attach(cx: OpCx, args: Value) -> Result<()> {
    let html = str_arg("attach", &args, 0)?;
    let mut doc = cx.doc.write().await;
    for node in cx.nodes {
        // fresh import per node so targets never share subtrees
        let imported = crate::dom::parse::import_fragment(&mut doc, &html);
        for child in imported {
            doc.append_child(node, child);
        }
    }
    Ok(())
}

async fn op_clone_to(cx: OpCx, args: Value) -> Result<()> {
    let selector_text = str_arg("clone_to", &args, 0)?;
    let selector = SelectorList::parse(&selector_text)?;
    let mut doc = cx.doc.write().await;
    let destinations = doc.query(doc.root(), &selector);
    if destinations.is_empty() {
        return Err(DomError::NoElementsFound(selector_text));
    }
    for dest in destinations {
        for &node in &cx.nodes {
            let copy = doc.clone_subtree(node);
            doc.append_child(dest, copy);
        }
    }
    Ok(())
}

async fn op_move_to(cx: OpCx, args: Value) -> Result<()> {
    let selector_text = str_arg("move_to", &args, 0)?;
    let selector = SelectorList::parse(&selector_text)?;
    let mut doc = cx.doc.write().await;
    let dest = doc
        .query(doc.root(), &selector)
        .into_iter()
        .next()
        .ok_or(DomError::NoElementsFound(selector_text))?;
    // moving a node under its own subtree would cycle the arena
    if cx
        .nodes
        .iter()
        .any(|&n| n == dest || doc.is_descendant_of(dest, n))
    {
        return Err(DomError::operation(
            "move_to",
            "destination is inside the moved subtree",
        ));
    }
    for node in cx.nodes {
        doc.append_child(dest, node);
    }
    Ok(())
}

/// Replace each target with parsed replacement content.
///
/// When the replacement count differs from the target count the configured
/// [`BecomePolicy`](crate::config::BecomePolicy) decides what happens to the
/// surplus targets.
async fn op_become(cx: OpCx, args: Value) -> Result<()> {
    use crate::config::BecomePolicy;

    let html = str_arg("become", &args, 0)?;
    let mut doc = cx.doc.write().await;
    let templates = crate::dom::parse::import_fragment(&mut doc, &html);
    if templates.is_empty() {
        return Err(DomError::operation("become", "replacement content is empty"));
    }
    for (i, node) in cx.nodes.into_iter().enumerate() {
        if i >= templates.len() {
            match cx.config.become_policy {
                BecomePolicy::Cycle => {}
                BecomePolicy::Remove => {
                    doc.detach(node);
                    continue;
                }
                BecomePolicy::LeaveUnmatched => continue,
            }
        }
        let template = templates[i % templates.len()];
        let copy = doc.clone_subtree(template);
        doc.replace_node(node, copy);
    }
    Ok(())
}

async fn op_purge(cx: OpCx, _args: Value) -> Result<()> {
    let mut doc = cx.doc.write().await;
    for node in cx.nodes {
        doc.detach(node);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse::parse_document;
    use serde_json::json;

    fn cx_for(html: &str, selector: &str) -> (Arc<tokio::sync::RwLock<Document>>, Vec<NodeId>) {
        let doc = parse_document(html);
        let sel = SelectorList::parse(selector).unwrap();
        let nodes = doc.query(doc.root(), &sel);
        (Arc::new(tokio::sync::RwLock::new(doc)), nodes)
    }

    fn make_cx(doc: &Arc<tokio::sync::RwLock<Document>>, nodes: &[NodeId]) -> OpCx {
        OpCx {
            doc: doc.clone(),
            nodes: nodes.to_vec(),
            config: Arc::new(ChainConfig::new()),
        }
    }

    #[tokio::test]
    async fn built_in_mutations_apply_to_every_target() {
        let (doc, nodes) = cx_for(
            "<html><body><p class='x'>a</p><p class='x'>b</p></body></html>",
            ".x",
        );
        let registry = OpRegistry::standard();

        registry
            .invoke("text", make_cx(&doc, &nodes), json!(["hi"]))
            .await
            .unwrap();
        registry
            .invoke("add_class", make_cx(&doc, &nodes), json!(["ready"]))
            .await
            .unwrap();
        registry
            .invoke("css", make_cx(&doc, &nodes), json!(["color", "red"]))
            .await
            .unwrap();

        let guard = doc.read().await;
        for node in nodes {
            assert_eq!(guard.text(node), "hi");
            assert!(guard.has_class(node, "ready"));
            assert_eq!(guard.attribute(node, "style").as_deref(), Some("color: red"));
        }
    }

    #[tokio::test]
    async fn become_cycles_replacements_over_surplus_targets() {
        let (doc, nodes) = cx_for(
            "<html><body><p class='x'>a</p><p class='x'>b</p><p class='x'>c</p></body></html>",
            ".x",
        );
        let registry = OpRegistry::standard();
        registry
            .invoke("become", make_cx(&doc, &nodes), json!(["<span>s</span>"]))
            .await
            .unwrap();

        let guard = doc.read().await;
        let body = guard.first_match("body").unwrap();
        let spans = guard.element_children(body);
        assert_eq!(spans.len(), 3);
        for span in spans {
            assert_eq!(guard.tag_name(span), Some("span"));
        }
    }

    #[tokio::test]
    async fn move_to_rejects_a_destination_inside_the_moved_subtree() {
        let (doc, nodes) = cx_for(
            "<html><body><div id='outer'><div id='inner'></div></div></body></html>",
            "#outer",
        );
        let registry = OpRegistry::standard();
        let err = registry
            .invoke("move_to", make_cx(&doc, &nodes), json!(["#inner"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "OperationFailed");

        // the tree is untouched and still finitely walkable
        let guard = doc.read().await;
        let outer = guard.first_match("#outer").unwrap();
        assert_eq!(guard.tag_name(guard.parent_element(outer).unwrap()), Some("body"));
        assert!(guard.first_match("#inner").is_some());
    }

    #[tokio::test]
    async fn overriding_an_operation_replaces_the_builtin() {
        let (doc, nodes) = cx_for("<html><body><p id='p'>a</p></body></html>", "#p");
        let registry = OpRegistry::standard();
        registry.register(
            "text",
            Arc::new(|cx: OpCx, _args| {
                Box::pin(async move {
                    let mut doc = cx.doc.write().await;
                    for node in cx.nodes {
                        doc.set_text(node, "patched");
                    }
                    Ok(())
                })
            }),
        );

        registry
            .invoke("text", make_cx(&doc, &nodes), json!(["ignored"]))
            .await
            .unwrap();
        let guard = doc.read().await;
        assert_eq!(guard.text(nodes[0]), "patched");
    }

    #[tokio::test]
    async fn unknown_operation_fails_with_context() {
        let (doc, nodes) = cx_for("<html><body><p id='p'>a</p></body></html>", "#p");
        let registry = OpRegistry::standard();
        let err = registry
            .invoke("nope", make_cx(&doc, &nodes), json!([]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "OperationFailed");
    }
}

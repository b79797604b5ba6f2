use crate::dom::document::Document;
use crate::dom::node::NodeId;
use crate::errors::{DomError, Result};

/// A parsed CSS selector list, e.g. `div.item, #main > span[role=tab]`.
///
/// Supported syntax: tag, `*`, `#id`, `.class`, `[attr]`, `[attr=value]`,
/// compound selectors, descendant and `>` combinators, and comma-separated
/// lists. Matching runs over the in-memory arena, the same way element
/// filtering works elsewhere in the crate.
#[derive(Debug, Clone)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

#[derive(Debug, Clone)]
struct ComplexSelector {
    /// Compound parts, leftmost first
    parts: Vec<CompoundSelector>,
    /// `combinators[i]` sits between `parts[i]` and `parts[i + 1]`
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default)]
struct CompoundSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DomError::InvalidSelector(input.to_string()));
        }
        let mut selectors = Vec::new();
        for part in trimmed.split(',') {
            selectors.push(parse_complex(part.trim(), input)?);
        }
        Ok(Self { selectors })
    }

    /// True if `node` matches any selector in the list
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.selectors
            .iter()
            .any(|sel| sel.matches(doc, node, sel.parts.len() - 1))
    }
}

impl ComplexSelector {
    fn matches(&self, doc: &Document, node: NodeId, idx: usize) -> bool {
        if !self.parts[idx].matches(doc, node) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match self.combinators[idx - 1] {
            Combinator::Child => doc
                .parent_element(node)
                .map(|p| self.matches(doc, p, idx - 1))
                .unwrap_or(false),
            Combinator::Descendant => {
                let mut ancestor = doc.parent_element(node);
                while let Some(a) = ancestor {
                    if self.matches(doc, a, idx - 1) {
                        return true;
                    }
                    ancestor = doc.parent_element(a);
                }
                false
            }
        }
    }
}

impl CompoundSelector {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let el = match doc.node(node).and_then(|n| n.as_element()) {
            Some(el) => el,
            None => return false,
        };
        if let Some(tag) = &self.tag {
            if tag != "*" && el.tag_name != *tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.attributes.get("id") != Some(id) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| el.has_class(c)) {
            return false;
        }
        for (name, expected) in &self.attrs {
            let actual = doc.attribute_of(el, name);
            match (actual, expected) {
                (None, _) => return false,
                (Some(_), None) => {}
                (Some(actual), Some(expected)) => {
                    if actual != *expected {
                        return false;
                    }
                }
            }
        }
        true
    }
}

fn parse_complex(part: &str, original: &str) -> Result<ComplexSelector> {
    if part.is_empty() {
        return Err(DomError::InvalidSelector(original.to_string()));
    }
    let mut parts = Vec::new();
    let mut combinators = Vec::new();
    // Normalize "a > b" / "a>b" into tokens separated by single spaces
    let mut pending = Combinator::Descendant;
    let mut first = true;
    for token in part.replace('>', " > ").split_whitespace() {
        if token == ">" {
            if first || pending == Combinator::Child {
                return Err(DomError::InvalidSelector(original.to_string()));
            }
            pending = Combinator::Child;
            continue;
        }
        let compound = parse_compound(token, original)?;
        if !first {
            combinators.push(pending);
        }
        parts.push(compound);
        pending = Combinator::Descendant;
        first = false;
    }
    if parts.is_empty() || pending == Combinator::Child {
        return Err(DomError::InvalidSelector(original.to_string()));
    }
    Ok(ComplexSelector { parts, combinators })
}

fn parse_compound(token: &str, original: &str) -> Result<CompoundSelector> {
    let mut compound = CompoundSelector::default();
    let chars: Vec<char> = token.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '#' => {
                let (name, next) = read_name(&chars, i + 1);
                if name.is_empty() {
                    return Err(DomError::InvalidSelector(original.to_string()));
                }
                compound.id = Some(name);
                i = next;
            }
            '.' => {
                let (name, next) = read_name(&chars, i + 1);
                if name.is_empty() {
                    return Err(DomError::InvalidSelector(original.to_string()));
                }
                compound.classes.push(name);
                i = next;
            }
            '[' => {
                let close = chars[i..]
                    .iter()
                    .position(|&c| c == ']')
                    .map(|p| p + i)
                    .ok_or_else(|| DomError::InvalidSelector(original.to_string()))?;
                let body: String = chars[i + 1..close].iter().collect();
                if body.is_empty() {
                    return Err(DomError::InvalidSelector(original.to_string()));
                }
                match body.split_once('=') {
                    Some((name, value)) => {
                        let value = value.trim_matches(|c| c == '"' || c == '\'');
                        compound
                            .attrs
                            .push((name.trim().to_string(), Some(value.to_string())));
                    }
                    None => compound.attrs.push((body.trim().to_string(), None)),
                }
                i = close + 1;
            }
            '*' => {
                compound.tag = Some("*".to_string());
                i += 1;
            }
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => {
                let (name, next) = read_name(&chars, i);
                if compound.tag.is_some() {
                    return Err(DomError::InvalidSelector(original.to_string()));
                }
                compound.tag = Some(name.to_ascii_lowercase());
                i = next;
            }
            _ => return Err(DomError::InvalidSelector(original.to_string())),
        }
    }
    if compound.is_empty() {
        return Err(DomError::InvalidSelector(original.to_string()));
    }
    Ok(compound)
}

fn read_name(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len()
        && (chars[end].is_ascii_alphanumeric() || chars[end] == '-' || chars[end] == '_')
    {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

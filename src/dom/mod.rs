pub mod document;
pub mod events;
pub mod node;
pub mod parse;
pub mod sanitize;
pub mod selector;

pub use document::Document;
pub use events::{Event, EventCallback};
pub use node::{ElementData, NodeData, NodeId, NodeKind};
pub use selector::SelectorList;

pub mod types;

pub use types::{DomError, Result};

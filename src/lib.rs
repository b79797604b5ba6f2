pub mod config;
pub mod dom;
pub mod errors;
pub mod handle;
pub mod net;
pub mod queue;
pub mod session;
pub mod testing;

pub use config::{BecomePolicy, ChainConfig, ErrorHandler, Sanitizer};
pub use dom::{Document, Event, EventCallback, NodeId, SelectorList};
pub use errors::{DomError, Result};
pub use handle::{Handle, JsonCallback, Keyframes, OpCx, OpFn, OpRegistry, Target, TransitionOptions};
pub use net::{FetchBackend, FetchOptions, FetchRequest, FetchResponse, HttpFetcher};
pub use queue::{Lazy, OpEntry, Sequencer};
pub use session::Page;

pub mod lazy;
pub mod sequencer;

pub use lazy::Lazy;
pub use sequencer::{DeferredAction, OpAction, OpEntry, OpFuture, Sequencer};

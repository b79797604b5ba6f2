use crate::config::ChainConfig;
use crate::errors::Result;
use crate::queue::lazy::Lazy;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use uuid::Uuid;

pub type OpFuture = BoxFuture<'static, Result<()>>;

/// Closure producing the operation's future; built at enqueue time,
/// invoked by the drain loop when its turn comes.
pub type OpAction = Box<dyn FnOnce() -> OpFuture + Send>;

/// Deferred-lane callback, invoked with its resolved arguments
pub type DeferredAction = Box<dyn FnOnce(Vec<Value>) -> OpFuture + Send>;

/// One scheduled unit of work plus its error-reporting context
/// (operation name + originating selector).
pub struct OpEntry {
    pub context: String,
    pub action: OpAction,
}

impl OpEntry {
    pub fn new<F>(context: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> OpFuture + Send + 'static,
    {
        Self {
            context: context.into(),
            action: Box::new(action),
        }
    }
}

struct DeferredEntry {
    context: String,
    args: Vec<Lazy>,
    action: DeferredAction,
}

struct QueueState {
    main: VecDeque<OpEntry>,
    deferred: VecDeque<DeferredEntry>,
    running: bool,
}

enum Item {
    Main(OpEntry),
    Deferred(DeferredEntry),
}

/// Per-handle-lineage operation queue with a single active drain loop.
///
/// Entries execute strictly in enqueue order; asynchronous operations are
/// awaited before the next entry starts. A failing entry is routed to the
/// configured error handler and the loop keeps going; one bad step never
/// aborts the rest of a chain. Independent sequencers never serialize
/// against each other.
///
/// The deferred lane drains only while the main queue is empty; main-queue
/// work arriving mid-drain takes priority until the main queue re-empties.
#[derive(Clone)]
pub struct Sequencer {
    inner: Arc<SequencerInner>,
}

struct SequencerInner {
    id: Uuid,
    state: Mutex<QueueState>,
    idle: Notify,
    config: Arc<ChainConfig>,
}

impl Sequencer {
    pub fn new(config: Arc<ChainConfig>) -> Self {
        Self {
            inner: Arc::new(SequencerInner {
                id: Uuid::new_v4(),
                state: Mutex::new(QueueState {
                    main: VecDeque::new(),
                    deferred: VecDeque::new(),
                    running: false,
                }),
                idle: Notify::new(),
                config,
            }),
        }
    }

    pub fn lineage_id(&self) -> Uuid {
        self.inner.id
    }

    /// Append a main-queue entry and make sure a drain loop is active
    pub fn enqueue(&self, entry: OpEntry) {
        tracing::trace!(lineage = %self.inner.id, context = %entry.context, "enqueue");
        let mut state = lock_state(&self.inner);
        state.main.push_back(entry);
        self.kick(state);
    }

    /// Append a deferred-lane entry; runs once the main queue has drained
    pub fn defer<F>(&self, context: impl Into<String>, args: Vec<Lazy>, action: F)
    where
        F: FnOnce(Vec<Value>) -> OpFuture + Send + 'static,
    {
        let entry = DeferredEntry {
            context: context.into(),
            args,
            action: Box::new(action),
        };
        let mut state = lock_state(&self.inner);
        state.deferred.push_back(entry);
        self.kick(state);
    }

    fn kick(&self, mut state: MutexGuard<'_, QueueState>) {
        if !state.running {
            state.running = true;
            drop(state);
            let inner = self.inner.clone();
            tokio::spawn(async move {
                Self::drain(inner).await;
            });
        }
    }

    /// Wait until both queues are empty and the drain loop has stopped
    pub async fn idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            {
                let state = lock_state(&self.inner);
                if state.main.is_empty() && state.deferred.is_empty() && !state.running {
                    return;
                }
            }
            notified.await;
        }
    }

    async fn drain(inner: Arc<SequencerInner>) {
        loop {
            // Main entries always win over deferred ones, so deferred
            // draining pauses whenever new main work arrives.
            let item = {
                let mut state = lock_state(&inner);
                if let Some(entry) = state.main.pop_front() {
                    Item::Main(entry)
                } else if let Some(entry) = state.deferred.pop_front() {
                    Item::Deferred(entry)
                } else {
                    state.running = false;
                    inner.idle.notify_waiters();
                    return;
                }
            };

            match item {
                Item::Main(entry) => {
                    let context = entry.context;
                    if let Err(err) = (entry.action)().await {
                        inner.config.report(&err, &context);
                    }
                }
                Item::Deferred(entry) => {
                    let context = entry.context;
                    let mut resolved = Vec::with_capacity(entry.args.len());
                    let mut failed = false;
                    for arg in entry.args {
                        match arg.resolve().await {
                            Ok(value) => resolved.push(value),
                            Err(err) => {
                                inner.config.report(&err, &context);
                                failed = true;
                                break;
                            }
                        }
                    }
                    if !failed {
                        if let Err(err) = (entry.action)(resolved).await {
                            inner.config.report(&err, &context);
                        }
                    }
                }
            }
        }
    }
}

fn lock_state(inner: &SequencerInner) -> MutexGuard<'_, QueueState> {
    inner.state.lock().unwrap_or_else(|e| e.into_inner())
}

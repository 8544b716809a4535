//! Order book synchronizer
//!
//! Bootstraps the book from a REST snapshot while buffering live deltas,
//! bridges the snapshot to the delta stream by sequence id, validates
//! continuity of every applied delta, and re-bootstraps when continuity is
//! lost.

mod machine;

pub use machine::Synchronizer;

use tokio::sync::mpsc;

use crate::fixed::SymbolScales;
use crate::orderbook::OrderBook;
use crate::parser::{DeltaMeta, OrderBookSnapshot};

/// Synchronizer lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Stopped,
    Bootstrapping,
    Live,
}

/// Monotonic health counters.
///
/// Reset to zero on `start`, never decremented. These are the sole
/// machine-readable health surface of the synchronizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub ws_messages: u64,
    pub accepted_deltas: u64,
    pub dropped_deltas: u64,
    pub resyncs: u64,
    pub snapshot_retries: u64,
}

/// A live payload retained while bootstrapping.
///
/// The raw text is kept so the full delta can be decoded at apply time; the
/// metadata is extracted eagerly so ordering decisions never need a full
/// decode.
#[derive(Debug, Clone)]
pub struct BufferedEvent {
    pub raw: String,
    pub meta: DeltaMeta,
}

/// Events delivered to the synchronizer's mailbox.
///
/// Draining the mailbox is the synchronizer's sole serialization context:
/// collaborator callbacks post here instead of touching state directly.
#[derive(Debug)]
pub enum SyncEvent {
    Start(String),
    Stop,
    Shutdown,
    LiveText {
        generation: u64,
        text: String,
    },
    SnapshotReady {
        generation: u64,
        snapshot: Option<OrderBookSnapshot>,
    },
}

/// Callback a live feed uses to deliver raw text frames. May be invoked from
/// any thread until the feed is stopped.
pub type OnText = Box<dyn Fn(String) + Send>;

/// Callback a snapshot source resolves exactly once, even on failure.
pub type OnSnapshot = Box<dyn FnOnce(Option<OrderBookSnapshot>) + Send>;

/// Observer invoked synchronously after every successful book mutation. The
/// references are valid only for the duration of the call.
pub type BookObserver = Box<dyn FnMut(&OrderBook, &SymbolScales, &SyncStats) + Send>;

/// Live delta transport capability.
pub trait LiveFeed: Send {
    /// Begin streaming depth deltas for `symbol`. After this returns the
    /// adapter may call `on_text` zero or more times until `stop`.
    fn start(&mut self, symbol: &str, on_text: OnText);

    /// Tear down the stream. The adapter must not invoke `on_text` afterwards.
    fn stop(&mut self);
}

/// One-shot depth snapshot transport capability.
pub trait SnapshotSource: Send {
    /// Fetch a fresh snapshot, resolving `on_result` exactly once. `None`
    /// signals any transport or decode failure.
    fn request(&mut self, on_result: OnSnapshot);
}

/// Clonable handle that posts commands onto the synchronizer's mailbox.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<SyncEvent>,
}

impl SyncHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SyncEvent>) -> Self {
        Self { tx }
    }

    /// Begin synchronizing `symbol`. Restarts the bootstrap if already running.
    pub fn start(&self, symbol: &str) {
        let _ = self.tx.send(SyncEvent::Start(symbol.to_string()));
    }

    /// Stop synchronizing. Safe and idempotent in any state.
    pub fn stop(&self) {
        let _ = self.tx.send(SyncEvent::Stop);
    }

    /// Stop and end the synchronizer's run loop.
    pub fn shutdown(&self) {
        let _ = self.tx.send(SyncEvent::Shutdown);
    }
}

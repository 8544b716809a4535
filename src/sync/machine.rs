//! The bootstrap-and-catch-up state machine.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    BookObserver, BufferedEvent, LiveFeed, OnSnapshot, OnText, SnapshotSource, SyncEvent,
    SyncHandle, SyncState, SyncStats,
};
use crate::fixed::SymbolScales;
use crate::orderbook::OrderBook;
use crate::parser::{self, DeltaMeta, OrderBookDelta, OrderBookSnapshot};

/// Keeps a local order book continuously in sync with the exchange.
///
/// All state lives behind a single mailbox: collaborator callbacks capture
/// the sender plus the generation current at initiation and post events;
/// [`Synchronizer::run`] (or [`Synchronizer::pump`]) drains them one at a
/// time. No locks guard the state — the mailbox is the discipline.
pub struct Synchronizer {
    state: SyncState,
    book: OrderBook,
    stats: SyncStats,
    scales: SymbolScales,
    symbol: String,
    /// Tag stamped on every outstanding async operation; results carrying an
    /// older tag are dropped without touching state.
    generation: u64,
    snapshot_in_flight: bool,
    buffered: VecDeque<BufferedEvent>,
    /// `first_update` of the earliest buffered event, the lower bound any
    /// acceptable snapshot must reach.
    first_buffered_update_id: Option<u64>,
    live_feed: Box<dyn LiveFeed>,
    snapshot_source: Box<dyn SnapshotSource>,
    on_book_updated: Option<BookObserver>,
    tx: mpsc::UnboundedSender<SyncEvent>,
    rx: mpsc::UnboundedReceiver<SyncEvent>,
}

impl Synchronizer {
    pub fn new(
        live_feed: Box<dyn LiveFeed>,
        snapshot_source: Box<dyn SnapshotSource>,
        scales: SymbolScales,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: SyncState::Stopped,
            book: OrderBook::new(),
            stats: SyncStats::default(),
            scales,
            symbol: String::new(),
            generation: 0,
            snapshot_in_flight: false,
            buffered: VecDeque::new(),
            first_buffered_update_id: None,
            live_feed,
            snapshot_source,
            on_book_updated: None,
            tx,
            rx,
        }
    }

    /// Handle for posting commands from outside the run loop.
    pub fn handle(&self) -> SyncHandle {
        SyncHandle::new(self.tx.clone())
    }

    /// Install the observer invoked after every successful book mutation.
    ///
    /// The observer must not re-enter the synchronizer; if it needs to, it
    /// has to go through a [`SyncHandle`].
    pub fn set_on_book_updated<F>(&mut self, observer: F)
    where
        F: FnMut(&OrderBook, &SymbolScales, &SyncStats) + Send + 'static,
    {
        self.on_book_updated = Some(Box::new(observer));
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    pub fn scales(&self) -> &SymbolScales {
        &self.scales
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drain the mailbox until shutdown.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            if !self.dispatch(event) {
                break;
            }
        }
    }

    /// Drain every event that is already queued, without blocking. Useful
    /// when the embedder drives the loop manually.
    pub fn pump(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            if !self.dispatch(event) {
                break;
            }
        }
    }

    fn dispatch(&mut self, event: SyncEvent) -> bool {
        match event {
            SyncEvent::Start(symbol) => self.on_start(symbol),
            SyncEvent::Stop => self.on_stop(),
            SyncEvent::Shutdown => {
                self.on_stop();
                return false;
            }
            SyncEvent::LiveText { generation, text } => self.on_live_text(generation, text),
            SyncEvent::SnapshotReady {
                generation,
                snapshot,
            } => self.on_snapshot_ready(generation, snapshot),
        }
        true
    }

    fn on_start(&mut self, symbol: String) {
        info!(symbol = %symbol, "starting order book sync");
        self.generation += 1;
        self.symbol = symbol;
        self.stats = SyncStats::default();
        self.begin_bootstrap_cycle();
    }

    fn on_stop(&mut self) {
        self.generation += 1;
        self.state = SyncState::Stopped;
        self.snapshot_in_flight = false;
        self.reset_buffer();
        self.symbol.clear();
        self.live_feed.stop();
    }

    fn restart_bootstrap(&mut self) {
        if self.state == SyncState::Stopped || self.symbol.is_empty() {
            return;
        }

        self.generation += 1;
        self.stats.resyncs += 1;
        self.begin_bootstrap_cycle();
    }

    fn reset_buffer(&mut self) {
        self.buffered.clear();
        self.first_buffered_update_id = None;
    }

    fn begin_bootstrap_cycle(&mut self) {
        debug!(
            symbol = %self.symbol,
            generation = self.generation,
            "beginning bootstrap cycle"
        );
        self.state = SyncState::Bootstrapping;
        self.snapshot_in_flight = false;
        self.reset_buffer();
        self.install_snapshot(&OrderBookSnapshot {
            last_update_id: 0,
            bids: Vec::new(),
            asks: Vec::new(),
        });
        self.live_feed.stop();
        self.start_live_feed();
        self.request_snapshot();
    }

    fn start_live_feed(&mut self) {
        let generation = self.generation;
        let tx = self.tx.clone();
        let on_text: OnText = Box::new(move |text| {
            let _ = tx.send(SyncEvent::LiveText { generation, text });
        });
        self.live_feed.start(&self.symbol, on_text);
    }

    fn request_snapshot(&mut self) {
        if self.snapshot_in_flight || self.state != SyncState::Bootstrapping {
            return;
        }

        self.snapshot_in_flight = true;
        let generation = self.generation;
        let tx = self.tx.clone();
        let on_result: OnSnapshot = Box::new(move |snapshot| {
            let _ = tx.send(SyncEvent::SnapshotReady {
                generation,
                snapshot,
            });
        });
        self.snapshot_source.request(on_result);
    }

    fn on_live_text(&mut self, generation: u64, text: String) {
        if generation != self.generation || self.state == SyncState::Stopped {
            return;
        }

        self.stats.ws_messages += 1;

        if self.state == SyncState::Bootstrapping {
            let Some(meta) = parser::decode_delta_meta(&text) else {
                self.stats.dropped_deltas += 1;
                return;
            };

            if self.first_buffered_update_id.is_none() {
                self.first_buffered_update_id = Some(meta.first_update);
            }

            self.buffered.push_back(BufferedEvent { raw: text, meta });
            if !self.snapshot_in_flight {
                self.request_snapshot();
            }
            return;
        }

        let Some(meta) = parser::decode_delta_meta(&text) else {
            self.stats.dropped_deltas += 1;
            return;
        };

        let delta = parser::decode_delta(&text, &self.scales);
        self.apply_delta_checked(delta, &meta);
    }

    fn on_snapshot_ready(&mut self, generation: u64, snapshot: Option<OrderBookSnapshot>) {
        if generation != self.generation || self.state != SyncState::Bootstrapping {
            return;
        }

        self.snapshot_in_flight = false;

        let Some(snapshot) = snapshot else {
            self.stats.snapshot_retries += 1;
            self.request_snapshot();
            return;
        };

        if let Some(first) = self.first_buffered_update_id {
            if snapshot.last_update_id < first {
                debug!(
                    snapshot_id = snapshot.last_update_id,
                    first_buffered = first,
                    "snapshot predates earliest buffered delta, retrying"
                );
                self.stats.snapshot_retries += 1;
                self.request_snapshot();
                return;
            }
        }

        self.install_snapshot(&snapshot);

        if self.first_buffered_update_id.is_none() {
            // Stay in bootstrap until at least one live event is buffered,
            // then snapshot again and validate the bridge against it.
            return;
        }

        while let Some(front) = self.buffered.front() {
            if front.meta.last_update > self.book.last_update_id() {
                break;
            }
            // Already reflected in the snapshot.
            self.stats.dropped_deltas += 1;
            self.buffered.pop_front();
        }

        if let Some(front) = self.buffered.front() {
            let expected = self.book.last_update_id().saturating_add(1);
            if !(front.meta.first_update <= expected && expected <= front.meta.last_update) {
                warn!(
                    snapshot_id = self.book.last_update_id(),
                    first_update = front.meta.first_update,
                    last_update = front.meta.last_update,
                    "snapshot does not bridge the buffered stream, resyncing"
                );
                self.restart_bootstrap();
                return;
            }
        }

        let mut first_after_snapshot = true;
        while let Some(event) = self.buffered.pop_front() {
            let mut meta = event.meta;
            if first_after_snapshot {
                // On futures streams, `pu` of the first event after a
                // snapshot need not equal the snapshot id; the bridge is
                // validated via [U, u] alone.
                meta.previous_last_update = None;
                first_after_snapshot = false;
            }

            let delta = parser::decode_delta(&event.raw, &self.scales);
            if !self.apply_delta_checked(delta, &meta) {
                return;
            }
        }

        self.reset_buffer();
        self.state = SyncState::Live;
        info!(
            symbol = %self.symbol,
            last_update_id = self.book.last_update_id(),
            "order book is live"
        );
    }

    /// Apply a delta if it is sequentially valid. Returns `false` when the
    /// caller must stop processing (resync started or machine stopped).
    fn apply_delta_checked(&mut self, delta: Option<OrderBookDelta>, meta: &DeltaMeta) -> bool {
        if self.state == SyncState::Stopped {
            return false;
        }

        let Some(delta) = delta else {
            self.stats.dropped_deltas += 1;
            return true;
        };

        let local = self.book.last_update_id();
        if delta.last_update < local {
            // Stale retransmission, already reflected in the book.
            self.stats.dropped_deltas += 1;
            return true;
        }

        let expected = local.saturating_add(1);
        let has_previous = matches!(meta.previous_last_update, Some(pu) if pu != 0);
        let sequential = if has_previous {
            meta.previous_last_update == Some(local)
                || (delta.first_update <= expected && expected <= delta.last_update)
        } else {
            delta.first_update <= expected
        };

        if !sequential {
            warn!(
                local_update_id = local,
                first_update = delta.first_update,
                last_update = delta.last_update,
                previous_last_update = ?meta.previous_last_update,
                "sequence gap detected, resyncing"
            );
            self.stats.dropped_deltas += 1;
            self.restart_bootstrap();
            return false;
        }

        self.book.apply_delta(&delta);
        self.stats.accepted_deltas += 1;
        self.notify_book_updated();
        true
    }

    fn install_snapshot(&mut self, snapshot: &OrderBookSnapshot) {
        self.book.apply_snapshot(snapshot);
        self.notify_book_updated();
    }

    fn notify_book_updated(&mut self) {
        if let Some(observer) = self.on_book_updated.as_mut() {
            observer(&self.book, &self.scales, &self.stats);
        }
    }
}

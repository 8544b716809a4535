//! End-to-end synchronizer scenarios, driven through the public API with
//! scripted collaborators. Payloads enter as JSON at the collaborator
//! boundary, exactly as they would off the wire.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use depthsync::fixed::SymbolScales;
use depthsync::orderbook::Level;
use depthsync::parser::{decode_snapshot, OrderBookSnapshot};
use depthsync::sync::{
    LiveFeed, OnSnapshot, OnText, SnapshotSource, SyncState, Synchronizer,
};

#[derive(Default)]
struct FeedInner {
    on_text: Option<OnText>,
    starts: usize,
}

/// Records `start` calls and lets the test push text frames by hand.
#[derive(Clone, Default)]
struct ScriptedFeed(Arc<Mutex<FeedInner>>);

impl ScriptedFeed {
    fn emit(&self, text: &str) {
        let inner = self.0.lock().unwrap();
        let on_text = inner.on_text.as_ref().expect("feed not started");
        on_text(text.to_string());
    }

    fn starts(&self) -> usize {
        self.0.lock().unwrap().starts
    }
}

impl LiveFeed for ScriptedFeed {
    fn start(&mut self, _symbol: &str, on_text: OnText) {
        let mut inner = self.0.lock().unwrap();
        inner.starts += 1;
        inner.on_text = Some(on_text);
    }

    fn stop(&mut self) {
        self.0.lock().unwrap().on_text = None;
    }
}

#[derive(Default)]
struct SnapshotInner {
    pending: VecDeque<OnSnapshot>,
    requests: usize,
}

/// Queues snapshot requests so the test decides when and how each resolves.
#[derive(Clone, Default)]
struct ScriptedSnapshots(Arc<Mutex<SnapshotInner>>);

impl ScriptedSnapshots {
    fn resolve_json(&self, raw: &str) {
        self.resolve(decode_snapshot(raw, &scales()));
    }

    fn resolve(&self, snapshot: Option<OrderBookSnapshot>) {
        let on_result = self
            .0
            .lock()
            .unwrap()
            .pending
            .pop_front()
            .expect("no pending snapshot request");
        on_result(snapshot);
    }

    fn requests(&self) -> usize {
        self.0.lock().unwrap().requests
    }
}

impl SnapshotSource for ScriptedSnapshots {
    fn request(&mut self, on_result: OnSnapshot) {
        let mut inner = self.0.lock().unwrap();
        inner.requests += 1;
        inner.pending.push_back(on_result);
    }
}

fn scales() -> SymbolScales {
    SymbolScales::new(100, 1000)
}

fn make_sync() -> (Synchronizer, ScriptedFeed, ScriptedSnapshots) {
    let feed = ScriptedFeed::default();
    let snapshots = ScriptedSnapshots::default();
    let sync = Synchronizer::new(
        Box::new(feed.clone()),
        Box::new(snapshots.clone()),
        scales(),
    );
    (sync, feed, snapshots)
}

fn price(text: &str) -> u64 {
    depthsync::fixed::parse_scaled(text, 100).unwrap()
}

fn qty(text: &str) -> u64 {
    depthsync::fixed::parse_scaled(text, 1000).unwrap()
}

#[test]
fn clean_bootstrap_goes_live() {
    let (mut sync, feed, snapshots) = make_sync();
    sync.handle().start("BTCUSDT");
    sync.pump();

    feed.emit(r#"{"U":100,"u":110,"pu":99,"b":[["30000.00","1.0"]],"a":[]}"#);
    sync.pump();
    snapshots.resolve_json(r#"{"lastUpdateId":105,"bids":[["30000.00","0.5"]],"asks":[]}"#);
    sync.pump();

    assert_eq!(sync.state(), SyncState::Live);
    let bids: Vec<Level> = sync.book().bids().collect();
    assert_eq!(bids, vec![Level::new(price("30000.00"), qty("1.0"))]);
    assert_eq!(sync.book().last_update_id(), 110);
    assert_eq!(sync.stats().accepted_deltas, 1);
    assert_eq!(sync.stats().dropped_deltas, 0);
}

#[test]
fn stale_snapshot_is_discarded_and_retried() {
    let (mut sync, feed, snapshots) = make_sync();
    sync.handle().start("BTCUSDT");
    sync.pump();

    feed.emit(r#"{"U":200,"u":210,"pu":199,"b":[],"a":[]}"#);
    sync.pump();

    // Snapshot predates the earliest buffered delta.
    snapshots.resolve_json(r#"{"lastUpdateId":150,"bids":[],"asks":[]}"#);
    sync.pump();
    assert_eq!(sync.state(), SyncState::Bootstrapping);
    assert_eq!(sync.stats().snapshot_retries, 1);

    snapshots.resolve_json(r#"{"lastUpdateId":205,"bids":[],"asks":[]}"#);
    sync.pump();
    assert_eq!(sync.state(), SyncState::Live);
    assert_eq!(sync.book().last_update_id(), 210);
}

#[test]
fn gap_in_live_triggers_resync() {
    let (mut sync, feed, snapshots) = make_sync();
    sync.handle().start("BTCUSDT");
    sync.pump();

    feed.emit(r#"{"U":496,"u":500,"pu":495,"b":[],"a":[]}"#);
    sync.pump();
    snapshots.resolve_json(r#"{"lastUpdateId":498,"bids":[],"asks":[]}"#);
    sync.pump();
    assert_eq!(sync.state(), SyncState::Live);
    assert_eq!(sync.book().last_update_id(), 500);
    let generation = sync.generation();

    feed.emit(r#"{"U":600,"u":610,"pu":550,"b":[],"a":[]}"#);
    sync.pump();

    assert_eq!(sync.state(), SyncState::Bootstrapping);
    assert_eq!(sync.stats().dropped_deltas, 1);
    assert_eq!(sync.stats().resyncs, 1);
    assert!(sync.generation() > generation);
    // A fresh bootstrap cycle restarted the collaborators.
    assert_eq!(feed.starts(), 2);
    assert_eq!(snapshots.requests(), 2);
}

#[test]
fn zero_qty_level_deletes_the_key() {
    let (mut sync, feed, snapshots) = make_sync();
    sync.handle().start("BTCUSDT");
    sync.pump();

    feed.emit(r#"{"U":100,"u":110,"pu":99,"b":[["30000.00","1.0"]],"a":[]}"#);
    sync.pump();
    snapshots.resolve_json(r#"{"lastUpdateId":105,"bids":[],"asks":[]}"#);
    sync.pump();
    assert_eq!(sync.state(), SyncState::Live);
    assert_eq!(sync.book().bid_levels(), 1);

    feed.emit(r#"{"U":111,"u":111,"pu":110,"b":[["30000.00","0"]],"a":[]}"#);
    sync.pump();

    assert_eq!(sync.book().bid_levels(), 0);
    assert_eq!(sync.stats().accepted_deltas, 2);
    assert_eq!(sync.state(), SyncState::Live);
}

#[test]
fn stale_retransmission_is_dropped_silently() {
    let (mut sync, feed, snapshots) = make_sync();
    sync.handle().start("BTCUSDT");
    sync.pump();

    feed.emit(r#"{"U":999,"u":1005,"pu":998,"b":[],"a":[]}"#);
    sync.pump();
    snapshots.resolve_json(r#"{"lastUpdateId":1000,"bids":[],"asks":[]}"#);
    sync.pump();
    assert_eq!(sync.state(), SyncState::Live);
    let accepted = sync.stats().accepted_deltas;

    feed.emit(r#"{"U":900,"u":950,"pu":899,"b":[["1.00","1.0"]],"a":[]}"#);
    sync.pump();

    assert_eq!(sync.state(), SyncState::Live);
    assert_eq!(sync.stats().dropped_deltas, 1);
    assert_eq!(sync.stats().resyncs, 0);
    assert_eq!(sync.stats().accepted_deltas, accepted);
    assert_eq!(sync.book().bid_levels(), 0);
}

#[test]
fn stop_start_cancels_in_flight_snapshot() {
    let (mut sync, _feed, snapshots) = make_sync();
    let handle = sync.handle();
    handle.start("BTCUSDT");
    sync.pump();
    assert_eq!(snapshots.requests(), 1);

    handle.stop();
    handle.start("BTCUSDT");
    sync.pump();
    assert_eq!(snapshots.requests(), 2);

    // The request dispatched before stop+start resolves late.
    snapshots.resolve_json(r#"{"lastUpdateId":105,"bids":[["30000.00","0.5"]],"asks":[]}"#);
    sync.pump();

    assert_eq!(sync.book().last_update_id(), 0);
    assert_eq!(sync.book().bid_levels(), 0);
    assert_eq!(sync.state(), SyncState::Bootstrapping);
}

#[test]
fn snapshot_before_any_delta_keeps_bootstrapping() {
    let (mut sync, feed, snapshots) = make_sync();
    sync.handle().start("BTCUSDT");
    sync.pump();

    snapshots.resolve_json(r#"{"lastUpdateId":105,"bids":[["30000.00","0.5"]],"asks":[]}"#);
    sync.pump();
    assert_eq!(sync.state(), SyncState::Bootstrapping);
    assert_eq!(sync.book().last_update_id(), 105);

    // The first buffered delta triggers a fresh snapshot whose result must
    // bridge it.
    feed.emit(r#"{"U":106,"u":107,"pu":105,"b":[],"a":[]}"#);
    sync.pump();
    assert_eq!(snapshots.requests(), 2);
    snapshots.resolve_json(r#"{"lastUpdateId":106,"bids":[["30000.00","0.5"]],"asks":[]}"#);
    sync.pump();

    assert_eq!(sync.state(), SyncState::Live);
    assert_eq!(sync.book().last_update_id(), 107);
}

#[test]
fn single_id_delta_bridges_snapshot() {
    let (mut sync, feed, snapshots) = make_sync();
    sync.handle().start("BTCUSDT");
    sync.pump();

    // The second buffered delta straddles exactly one id; the snapshot
    // absorbs the first and must hand over precisely at 106.
    feed.emit(r#"{"U":100,"u":105,"pu":99,"b":[],"a":[]}"#);
    feed.emit(r#"{"U":106,"u":106,"pu":105,"b":[["30000.00","2.0"]],"a":[]}"#);
    sync.pump();
    snapshots.resolve_json(r#"{"lastUpdateId":105,"bids":[],"asks":[]}"#);
    sync.pump();

    assert_eq!(sync.state(), SyncState::Live);
    assert_eq!(sync.book().last_update_id(), 106);
    assert_eq!(sync.book().bid_levels(), 1);
    // The absorbed delta counts as dropped, the straddling one as accepted.
    assert_eq!(sync.stats().dropped_deltas, 1);
    assert_eq!(sync.stats().accepted_deltas, 1);
}

#[test]
fn snapshot_covering_every_buffered_delta_goes_live() {
    let (mut sync, feed, snapshots) = make_sync();
    sync.handle().start("BTCUSDT");
    sync.pump();

    feed.emit(r#"{"U":100,"u":104,"pu":99,"b":[["29999.00","9.0"]],"a":[]}"#);
    sync.pump();
    snapshots.resolve_json(r#"{"lastUpdateId":105,"bids":[["30000.00","0.5"]],"asks":[]}"#);
    sync.pump();

    // The lone buffered delta was already reflected in the snapshot.
    assert_eq!(sync.state(), SyncState::Live);
    assert_eq!(sync.book().last_update_id(), 105);
    assert_eq!(sync.stats().dropped_deltas, 1);
    assert_eq!(sync.stats().accepted_deltas, 0);
    let bids: Vec<Level> = sync.book().bids().collect();
    assert_eq!(bids, vec![Level::new(price("30000.00"), qty("0.5"))]);
}

#[test]
fn zero_pu_is_treated_as_absent() {
    let (mut sync, feed, snapshots) = make_sync();
    sync.handle().start("BTCUSDT");
    sync.pump();

    feed.emit(r#"{"U":100,"u":110,"pu":0,"b":[],"a":[]}"#);
    sync.pump();
    snapshots.resolve_json(r#"{"lastUpdateId":105,"bids":[],"asks":[]}"#);
    sync.pump();
    assert_eq!(sync.state(), SyncState::Live);

    // Without a usable pu, continuity falls back to U <= expected.
    feed.emit(r#"{"U":105,"u":111,"pu":0,"b":[],"a":[]}"#);
    sync.pump();
    assert_eq!(sync.book().last_update_id(), 111);
    assert_eq!(sync.stats().resyncs, 0);

    feed.emit(r#"{"U":200,"u":210,"pu":0,"b":[],"a":[]}"#);
    sync.pump();
    assert_eq!(sync.state(), SyncState::Bootstrapping);
    assert_eq!(sync.stats().resyncs, 1);
}

#[test]
fn snapshot_failures_retry_without_bound() {
    let (mut sync, _feed, snapshots) = make_sync();
    sync.handle().start("BTCUSDT");
    sync.pump();

    for retry in 1..=3 {
        snapshots.resolve(None);
        sync.pump();
        assert_eq!(sync.stats().snapshot_retries, retry);
        assert_eq!(sync.state(), SyncState::Bootstrapping);
    }
    assert_eq!(snapshots.requests(), 4);
}

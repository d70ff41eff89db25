//! Sync loop tests against a scripted server.
//!
//! Time is paused, so timeouts and backoffs elapse instantly while keeping
//! their relative order.

use eventmap_engine::{
    EntityInfo, Error, LatLng, LayerCatalog, LayerInfo, Result, SnapshotDoc, SyncHandle,
    SyncLoop, SyncOptions, SyncState, SyncVersion, Transport,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Transport that replays queued responses. An empty queue behaves like a
/// server holding the request open forever.
#[derive(Clone, Default)]
struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

#[derive(Default)]
struct Script {
    fetches: VecDeque<Result<SnapshotDoc>>,
    polls: VecDeque<Result<SnapshotDoc>>,
    pushes: VecDeque<Result<()>>,
    push_delays: VecDeque<Duration>,
    polled: Vec<(SyncVersion, Instant)>,
    pushed: Vec<SnapshotDoc>,
}

impl ScriptedTransport {
    fn with_fetch(self, doc: SnapshotDoc) -> Self {
        self.script.lock().unwrap().fetches.push_back(Ok(doc));
        self
    }

    fn then_poll(self, response: Result<SnapshotDoc>) -> Self {
        self.script.lock().unwrap().polls.push_back(response);
        self
    }

    fn then_push(self, response: Result<()>) -> Self {
        self.script.lock().unwrap().pushes.push_back(response);
        self
    }

    fn then_slow_push(self, delay: Duration) -> Self {
        self.script.lock().unwrap().push_delays.push_back(delay);
        self
    }

    fn polled_versions(&self) -> Vec<SyncVersion> {
        let script = self.script.lock().unwrap();
        script.polled.iter().map(|(v, _)| v.clone()).collect()
    }

    fn pushed(&self) -> Vec<SnapshotDoc> {
        self.script.lock().unwrap().pushed.clone()
    }
}

impl Transport for ScriptedTransport {
    async fn fetch(&self) -> Result<SnapshotDoc> {
        let next = self.script.lock().unwrap().fetches.pop_front();
        match next {
            Some(response) => response,
            None => std::future::pending().await,
        }
    }

    async fn poll(&self, version: &SyncVersion) -> Result<SnapshotDoc> {
        let next = {
            let mut script = self.script.lock().unwrap();
            script.polled.push((version.clone(), Instant::now()));
            script.polls.pop_front()
        };
        match next {
            Some(response) => response,
            None => std::future::pending().await,
        }
    }

    /// Records the document once the upload "arrives", after its delay.
    async fn push(&self, doc: &SnapshotDoc) -> Result<()> {
        let delay = self.script.lock().unwrap().push_delays.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script.lock().unwrap();
        script.pushed.push(doc.clone());
        script.pushes.pop_front().unwrap_or(Ok(()))
    }
}

fn create_state() -> SyncState {
    SyncState::new(
        LayerCatalog::new(vec![LayerInfo::new("ground", 5), LayerInfo::new("upper", 5)]).unwrap(),
    )
}

fn doc(version: &str, points: &[(&str, f64, &str)]) -> SnapshotDoc {
    let mut doc = SnapshotDoc::new(Some(version.into()));
    for (name, lat, layer) in points {
        doc.markers.insert(
            name.to_string(),
            EntityInfo::Point {
                lat: *lat,
                lng: 0.0,
                layer: layer.to_string(),
            },
        );
    }
    doc
}

fn refused() -> Error {
    Error::Network("connection refused".into())
}

fn sync_loop(transport: &ScriptedTransport) -> (SyncLoop<ScriptedTransport>, SyncHandle) {
    SyncLoop::new(create_state(), transport.clone(), SyncOptions::default())
}

// ============================================================================
// Pulling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn bootstrap_then_poll_from_version() {
    let transport = ScriptedTransport::default()
        .with_fetch(doc("v1", &[("Stage", 1.0, "ground")]))
        .then_poll(Ok(doc("v2", &[("Stage", 2.0, "ground")])));
    let (mut sync, _handle) = sync_loop(&transport);

    sync.bootstrap().await.unwrap();
    assert_eq!(sync.state().version().map(String::as_str), Some("v1"));

    let report = sync.pull_once().await.unwrap();
    assert_eq!(report.repositioned, vec!["Stage".to_string()]);
    assert_eq!(sync.state().version().map(String::as_str), Some("v2"));
    assert_eq!(transport.polled_versions(), vec!["v1"]);
}

#[tokio::test(start_paused = true)]
async fn bootstrap_failure_can_be_retried() {
    let transport = ScriptedTransport::default();
    transport
        .script
        .lock()
        .unwrap()
        .fetches
        .push_back(Err(refused()));
    let transport = transport.with_fetch(doc("v1", &[]));
    let (mut sync, _handle) = sync_loop(&transport);

    assert_eq!(sync.bootstrap().await.unwrap_err(), refused());
    assert!(sync.state().version().is_none());
    sync.bootstrap().await.unwrap();
    assert_eq!(sync.state().version().map(String::as_str), Some("v1"));
}

#[tokio::test(start_paused = true)]
async fn failed_pull_keeps_version() {
    let transport = ScriptedTransport::default()
        .with_fetch(doc("v1", &[]))
        .then_poll(Err(refused()))
        .then_poll(Ok(doc("v2", &[])));
    let (mut sync, _handle) = sync_loop(&transport);
    sync.bootstrap().await.unwrap();

    assert_eq!(sync.pull_once().await.unwrap_err(), refused());
    assert_eq!(sync.state().version().map(String::as_str), Some("v1"));

    sync.pull_once().await.unwrap();
    assert_eq!(transport.polled_versions(), vec!["v1", "v1"]);
    assert_eq!(sync.state().version().map(String::as_str), Some("v2"));
}

#[tokio::test(start_paused = true)]
async fn silent_server_times_out() {
    let transport = ScriptedTransport::default().with_fetch(doc("v1", &[]));
    let (mut sync, _handle) = sync_loop(&transport);
    sync.bootstrap().await.unwrap();

    let started = Instant::now();
    assert_eq!(sync.pull_once().await.unwrap_err(), Error::PollTimeout);
    assert!(started.elapsed() >= SyncOptions::DEFAULT_POLL_TIMEOUT);
    assert_eq!(sync.state().version().map(String::as_str), Some("v1"));
}

#[tokio::test(start_paused = true)]
async fn running_loop_retries_after_backoff() {
    let transport = ScriptedTransport::default()
        .with_fetch(doc("v1", &[]))
        .then_poll(Err(refused()))
        .then_poll(Ok(doc("v2", &[("Stage", 1.0, "ground")])));
    let (mut sync, handle) = sync_loop(&transport);
    sync.bootstrap().await.unwrap();
    let running = tokio::spawn(sync.run());

    tokio::time::sleep(Duration::from_secs(30)).await;

    let current = handle.document().await.unwrap();
    assert_eq!(current.sync_id.as_deref(), Some("v2"));
    assert!(current.markers.contains_key("Stage"));

    let polled = transport.script.lock().unwrap().polled.clone();
    let versions: Vec<_> = polled.iter().map(|(v, _)| v.as_str()).collect();
    assert_eq!(versions, vec!["v1", "v1", "v2"]);
    assert!(polled[1].1 - polled[0].1 >= SyncOptions::DEFAULT_RETRY_BACKOFF);
    // A successful pull is followed immediately by the next one.
    assert_eq!(polled[2].1, polled[1].1);

    drop(handle);
    running.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn snapshot_with_unknown_layer_is_skipped() {
    let transport = ScriptedTransport::default()
        .with_fetch(doc("v1", &[("Stage", 1.0, "ground")]))
        .then_poll(Ok(doc("v2", &[("Stage", 1.0, "cellar")])))
        .then_poll(Ok(doc("v3", &[("Stage", 3.0, "upper")])));
    let (mut sync, handle) = sync_loop(&transport);
    sync.bootstrap().await.unwrap();
    let running = tokio::spawn(sync.run());

    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(transport.polled_versions(), vec!["v1", "v1", "v3"]);
    let stage = handle.entity("Stage").await.unwrap().unwrap();
    assert_eq!(stage.layer, "upper");
    assert_eq!(stage.position(), Some(LatLng::new(3.0, 0.0)));

    drop(handle);
    running.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn loop_stops_when_handles_are_dropped() {
    let transport = ScriptedTransport::default().with_fetch(doc("v1", &[]));
    let (mut sync, handle) = sync_loop(&transport);
    sync.bootstrap().await.unwrap();

    drop(handle);
    tokio::time::timeout(Duration::from_secs(3600), sync.run())
        .await
        .expect("loop should stop after the outstanding pull");
}

#[tokio::test(start_paused = true)]
async fn handle_reports_stopped_loop() {
    let transport = ScriptedTransport::default();
    let (sync, handle) = sync_loop(&transport);
    drop(sync);

    assert_eq!(handle.document().await.unwrap_err(), Error::LoopStopped);
}

// ============================================================================
// Pushing
// ============================================================================

#[tokio::test(start_paused = true)]
async fn committed_edit_pushes_full_state() {
    let transport = ScriptedTransport::default().with_fetch(doc("v1", &[("Stage", 1.0, "ground")]));
    let (sync, handle) = sync_loop(&transport);
    let running = sync.start().await.unwrap();

    let receipt = handle
        .create_point("Bar", "upper", LatLng::new(2.0, 2.0))
        .await
        .unwrap();
    assert_eq!(receipt.id.as_deref(), Some("Bar"));
    receipt.push.expect("create pushes").outcome().await.unwrap();

    let pushed = transport.pushed();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].sync_id.as_deref(), Some("v1"));
    let names: Vec<_> = pushed[0].markers.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Bar", "Stage"]);

    drop(handle);
    running.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn pushes_arrive_in_edit_order() {
    let transport = ScriptedTransport::default()
        .with_fetch(doc("v1", &[]))
        .then_slow_push(Duration::from_millis(50))
        .then_slow_push(Duration::from_millis(1));
    let (sync, handle) = sync_loop(&transport);
    let _running = sync.start().await.unwrap();

    let first = handle
        .create_point("A", "ground", LatLng::new(0.0, 0.0))
        .await
        .unwrap();
    let second = handle
        .create_point("B", "ground", LatLng::new(1.0, 1.0))
        .await
        .unwrap();
    first.push.unwrap().outcome().await.unwrap();
    second.push.unwrap().outcome().await.unwrap();

    let counts: Vec<_> = transport.pushed().iter().map(|d| d.markers.len()).collect();
    assert_eq!(counts, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn failed_push_keeps_local_edit() {
    let transport = ScriptedTransport::default()
        .with_fetch(doc("v1", &[]))
        .then_push(Err(refused()));
    let (sync, handle) = sync_loop(&transport);
    let _running = sync.start().await.unwrap();

    let receipt = handle
        .create_polyline("ground", vec![LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)])
        .await
        .unwrap();
    let outcome = receipt.push.unwrap().outcome().await;
    assert_eq!(outcome.unwrap_err(), refused());

    assert!(handle.entity("__polyline_ground_0").await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn move_pushes_only_on_commit() {
    let transport = ScriptedTransport::default().with_fetch(doc("v1", &[("Stage", 1.0, "ground")]));
    let (sync, handle) = sync_loop(&transport);
    let _running = sync.start().await.unwrap();

    assert!(handle.begin_move("Stage").await.unwrap().push.is_none());
    assert!(handle.move_to(LatLng::new(5.0, 5.0)).await.unwrap().push.is_none());
    assert!(handle.cancel_move().await.unwrap().push.is_none());
    let stage = handle.entity("Stage").await.unwrap().unwrap();
    assert_eq!(stage.position(), Some(LatLng::new(1.0, 0.0)));

    handle.begin_move("Stage").await.unwrap();
    handle.move_to(LatLng::new(6.0, 6.0)).await.unwrap();
    let receipt = handle.commit_move().await.unwrap();
    receipt.push.unwrap().outcome().await.unwrap();

    let pushed = transport.pushed();
    assert_eq!(pushed.len(), 1);
    assert_eq!(
        pushed[0].markers["Stage"],
        EntityInfo::Point {
            lat: 6.0,
            lng: 6.0,
            layer: "ground".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_edit_does_not_push() {
    let transport = ScriptedTransport::default().with_fetch(doc("v1", &[("Stage", 1.0, "ground")]));
    let (sync, handle) = sync_loop(&transport);
    let _running = sync.start().await.unwrap();

    let err = handle
        .create_point("Stage", "ground", LatLng::new(0.0, 0.0))
        .await
        .unwrap_err();
    assert_eq!(err, Error::NameConflict("Stage".into()));

    let err = handle.change_layer("Stage", "cellar").await.unwrap_err();
    assert_eq!(err, Error::UnknownLayer("cellar".into()));

    assert!(transport.pushed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn search_through_handle() {
    let transport = ScriptedTransport::default().with_fetch(doc(
        "v1",
        &[("Stage", 1.0, "ground"), ("Stall", 2.0, "upper"), ("Bar", 3.0, "ground")],
    ));
    let (sync, handle) = sync_loop(&transport);
    let _running = sync.start().await.unwrap();

    let hits = handle.search("st").await.unwrap();
    let titles: Vec<_> = hits.iter().map(|h| h.title.as_str()).collect();
    assert_eq!(titles, vec!["Stage", "Stall"]);
    assert_eq!(hits[1].layer, "upper");
}

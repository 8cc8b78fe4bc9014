#![allow(clippy::unwrap_used, clippy::float_cmp)]
// Scenario tests for `Supervisor` with scripted sources and paused time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

use upfwatch_api::{ChannelEvent, DirectionStats, DropSnapshot, SessionInfo, TrafficSnapshot};
use upfwatch_core::supervisor::{POLL_FAILURE, PUSH_FAILURE};
use upfwatch_core::{
    ConnectionState, MetricsSource, MetricsStore, PushConnector, Supervisor, SupervisorTimings,
};

// ── Fakes ───────────────────────────────────────────────────────────

fn traffic(up: f64) -> TrafficSnapshot {
    TrafficSnapshot {
        uplink: DirectionStats {
            throughput_mbps: up,
            ..DirectionStats::default()
        },
        downlink: DirectionStats::default(),
    }
}

fn drops(total: u64) -> DropSnapshot {
    DropSnapshot {
        total,
        ..DropSnapshot::default()
    }
}

fn session(seid: &str) -> SessionInfo {
    SessionInfo {
        seid: seid.into(),
        ..SessionInfo::default()
    }
}

#[derive(Debug)]
struct PollScript {
    traffic: TrafficSnapshot,
    drops: Option<DropSnapshot>,
    sessions: Vec<SessionInfo>,
}

/// Pull source answering from a mutable script; `drops: None` rejects.
#[derive(Clone)]
struct FakeSource {
    script: Arc<Mutex<PollScript>>,
    cycles: Arc<AtomicUsize>,
}

impl FakeSource {
    fn new(traffic: TrafficSnapshot, drops: DropSnapshot, sessions: Vec<SessionInfo>) -> Self {
        Self {
            script: Arc::new(Mutex::new(PollScript {
                traffic,
                drops: Some(drops),
                sessions,
            })),
            cycles: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn script(&self, update: impl FnOnce(&mut PollScript)) {
        update(&mut self.script.lock().unwrap());
    }

    fn cycles(&self) -> usize {
        self.cycles.load(Ordering::SeqCst)
    }
}

impl MetricsSource for FakeSource {
    async fn fetch_traffic(&self) -> Result<TrafficSnapshot, upfwatch_api::Error> {
        self.cycles.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().unwrap().traffic.clone())
    }

    async fn fetch_drops(&self) -> Result<DropSnapshot, upfwatch_api::Error> {
        let drops = self.script.lock().unwrap().drops.clone();
        drops.ok_or_else(|| upfwatch_api::Error::Http {
            status: 503,
            endpoint: "/api/v1/metrics/drops".into(),
        })
    }

    async fn fetch_sessions(&self) -> Result<Vec<SessionInfo>, upfwatch_api::Error> {
        Ok(self.script.lock().unwrap().sessions.clone())
    }
}

/// Source whose traffic fetch takes `latency` before answering.
#[derive(Clone)]
struct SlowSource {
    inner: FakeSource,
    latency: Duration,
}

impl MetricsSource for SlowSource {
    async fn fetch_traffic(&self) -> Result<TrafficSnapshot, upfwatch_api::Error> {
        tokio::time::sleep(self.latency).await;
        self.inner.fetch_traffic().await
    }

    async fn fetch_drops(&self) -> Result<DropSnapshot, upfwatch_api::Error> {
        self.inner.fetch_drops().await
    }

    async fn fetch_sessions(&self) -> Result<Vec<SessionInfo>, upfwatch_api::Error> {
        self.inner.fetch_sessions().await
    }
}

/// Push connector handing out scripted channels.
#[derive(Clone, Default)]
struct FakeConnector {
    fail: bool,
    senders: Arc<Mutex<Vec<mpsc::Sender<ChannelEvent>>>>,
    closed: Arc<AtomicUsize>,
}

struct FakeChannel {
    closed: Arc<AtomicUsize>,
}

impl Drop for FakeChannel {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl FakeConnector {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn opens(&self) -> usize {
        self.senders.lock().unwrap().len()
    }

    fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    async fn emit(&self, index: usize, event: ChannelEvent) {
        let tx = self.senders.lock().unwrap()[index].clone();
        // The supervisor may already have dropped the receiver.
        let _ = tx.send(event).await;
    }
}

impl PushConnector for FakeConnector {
    type Channel = FakeChannel;

    fn open(&self) -> Result<(FakeChannel, mpsc::Receiver<ChannelEvent>), upfwatch_api::Error> {
        if self.fail {
            self.senders.lock().unwrap().push(mpsc::channel(1).0);
            return Err(upfwatch_api::Error::WebSocketConnect("no transport".into()));
        }
        let (tx, rx) = mpsc::channel(16);
        self.senders.lock().unwrap().push(tx);
        let channel = FakeChannel {
            closed: Arc::clone(&self.closed),
        };
        Ok((channel, rx))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

const POLL: Duration = Duration::from_millis(2000);
const RECONNECT: Duration = Duration::from_millis(3000);

fn timings() -> SupervisorTimings {
    SupervisorTimings {
        poll_interval: POLL,
        reconnect_delay: RECONNECT,
    }
}

/// Let every ready task run without moving the clock.
async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

async fn advance(by: Duration) {
    tokio::time::advance(by).await;
    settle().await;
}

fn push_frame(up: f64) -> ChannelEvent {
    let body = serde_json::json!({
        "data": {
            "traffic": {
                "uplink": { "packets": 1, "bytes": 1, "throughput_mbps": up, "last_updated": "" },
                "downlink": { "packets": 0, "bytes": 0, "throughput_mbps": 0.0, "last_updated": "" }
            }
        }
    });
    ChannelEvent::Frame(body.to_string())
}

fn default_source() -> FakeSource {
    FakeSource::new(traffic(1.0), drops(1), vec![session("0x1")])
}

// ── Push reconnect ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn reconnects_exactly_once_after_delay() {
    let store = Arc::new(MetricsStore::new());
    let connector = FakeConnector::default();
    let mut supervisor = Supervisor::start(
        default_source(),
        Some(connector.clone()),
        timings(),
        Arc::clone(&store),
    );
    settle().await;
    assert_eq!(connector.opens(), 1);

    connector.emit(0, ChannelEvent::Opened).await;
    connector.emit(0, push_frame(42.0)).await;
    settle().await;
    assert!(store.snapshot().connected);
    assert_eq!(
        store.snapshot().metrics.as_ref().map(|m| m.uplink.throughput_mbps),
        Some(42.0)
    );

    connector.emit(0, ChannelEvent::Closed).await;
    settle().await;
    assert!(!store.snapshot().connected);
    assert_eq!(supervisor.status().borrow().state, ConnectionState::Disconnected);

    advance(RECONNECT - Duration::from_millis(10)).await;
    assert_eq!(connector.opens(), 1, "reopened before the delay elapsed");

    advance(Duration::from_millis(20)).await;
    assert_eq!(connector.opens(), 2);
    assert_eq!(supervisor.status().borrow().push_attempts, 2);

    advance(RECONNECT * 3).await;
    assert_eq!(connector.opens(), 2, "second channel is still open");

    supervisor.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn duplicate_close_schedules_a_single_reconnect() {
    let store = Arc::new(MetricsStore::new());
    let connector = FakeConnector::default();
    let mut supervisor = Supervisor::start(
        default_source(),
        Some(connector.clone()),
        timings(),
        Arc::clone(&store),
    );
    settle().await;

    connector.emit(0, ChannelEvent::Opened).await;
    connector.emit(0, ChannelEvent::Error("reset".into())).await;
    connector.emit(0, ChannelEvent::Closed).await;
    connector.emit(0, ChannelEvent::Closed).await;
    settle().await;
    assert_eq!(connector.closed(), 1);
    assert_eq!(supervisor.status().borrow().state, ConnectionState::Disconnected);
    assert_eq!(
        supervisor.status().borrow().last_error.as_deref(),
        Some("reset")
    );

    advance(RECONNECT + Duration::from_millis(10)).await;
    assert_eq!(connector.opens(), 2);

    advance(RECONNECT).await;
    assert_eq!(connector.opens(), 2);

    supervisor.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn push_error_marks_disconnected_but_polling_continues() {
    let store = Arc::new(MetricsStore::new());
    let source = default_source();
    let connector = FakeConnector::default();
    let mut supervisor = Supervisor::start(
        source.clone(),
        Some(connector.clone()),
        timings(),
        Arc::clone(&store),
    );
    settle().await;

    connector.emit(0, ChannelEvent::Opened).await;
    connector.emit(0, ChannelEvent::Error("broken pipe".into())).await;
    settle().await;

    let view = store.snapshot();
    assert!(!view.connected);
    assert_eq!(view.error.as_deref(), Some(PUSH_FAILURE));
    let status = supervisor.status().borrow().clone();
    assert_eq!(status.state, ConnectionState::Erroring);
    assert_eq!(status.last_error.as_deref(), Some("broken pipe"));

    let before = source.cycles();
    advance(POLL).await;
    assert_eq!(source.cycles(), before + 1);

    supervisor.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn malformed_frame_is_discarded() {
    let store = Arc::new(MetricsStore::new());
    let connector = FakeConnector::default();
    let mut supervisor = Supervisor::start(
        default_source(),
        Some(connector.clone()),
        timings(),
        Arc::clone(&store),
    );
    settle().await;

    connector.emit(0, ChannelEvent::Opened).await;
    connector.emit(0, push_frame(5.0)).await;
    settle().await;
    let before = store.snapshot();

    connector.emit(0, ChannelEvent::Frame("{not json".into())).await;
    settle().await;

    let after = store.snapshot();
    assert!(Arc::ptr_eq(&before, &after), "store must not change");
    assert_eq!(supervisor.status().borrow().state, ConnectionState::Connected);

    // The channel keeps working afterwards.
    connector.emit(0, push_frame(6.0)).await;
    settle().await;
    assert_eq!(
        store.snapshot().metrics.as_ref().map(|m| m.uplink.throughput_mbps),
        Some(6.0)
    );

    supervisor.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn construction_failure_falls_back_to_polling_only() {
    let store = Arc::new(MetricsStore::new());
    let source = default_source();
    let connector = FakeConnector::failing();
    let mut supervisor = Supervisor::start(
        source.clone(),
        Some(connector.clone()),
        timings(),
        Arc::clone(&store),
    );
    settle().await;

    let status = supervisor.status().borrow().clone();
    assert!(!status.push_available);
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert!(status.last_error.is_some());

    let before = source.cycles();
    advance(RECONNECT * 4).await;
    assert_eq!(connector.opens(), 1, "no further push attempts");
    assert!(source.cycles() > before, "polling keeps running");
    assert!(store.snapshot().metrics.is_some());

    supervisor.shutdown().await.unwrap();
}

// ── Poll cycles ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn initial_poll_runs_immediately() {
    let store = Arc::new(MetricsStore::new());
    let mut supervisor =
        Supervisor::start(default_source(), None::<FakeConnector>, timings(), Arc::clone(&store));
    settle().await;

    let view = store.snapshot();
    assert_eq!(view.drops.as_ref().map(|d| d.total), Some(1));
    assert_eq!(view.sessions.len(), 1);
    assert!(!view.connected);
    assert_eq!(view.error, None);
    assert!(!supervisor.status().borrow().push_available);

    supervisor.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_drops_fetch_discards_whole_cycle() {
    let store = Arc::new(MetricsStore::new());
    let source = default_source();
    let mut supervisor =
        Supervisor::start(source.clone(), None::<FakeConnector>, timings(), Arc::clone(&store));
    settle().await;
    let good = store.snapshot();

    source.script(|s| {
        s.traffic = traffic(99.0);
        s.sessions = vec![session("0x1"), session("0x2")];
        s.drops = None;
    });
    advance(POLL).await;

    let view = store.snapshot();
    assert_eq!(view.metrics, good.metrics);
    assert_eq!(view.drops, good.drops);
    assert_eq!(view.sessions.len(), 1);
    assert_eq!(view.error.as_deref(), Some(POLL_FAILURE));

    // Next good cycle applies everything and clears the error.
    source.script(|s| s.drops = Some(drops(5)));
    advance(POLL).await;

    let view = store.snapshot();
    assert_eq!(view.error, None);
    assert_eq!(view.drops.as_ref().map(|d| d.total), Some(5));
    assert_eq!(view.sessions.len(), 2);
    assert_eq!(
        view.metrics.as_ref().map(|m| m.uplink.throughput_mbps),
        Some(99.0)
    );

    supervisor.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn poll_and_push_race_last_write_wins() {
    let store = Arc::new(MetricsStore::new());
    let source = default_source();
    let connector = FakeConnector::default();
    let mut supervisor = Supervisor::start(
        source.clone(),
        Some(connector.clone()),
        timings(),
        Arc::clone(&store),
    );
    settle().await;

    connector.emit(0, push_frame(7.0)).await;
    settle().await;
    assert_eq!(
        store.snapshot().metrics.as_ref().map(|m| m.uplink.throughput_mbps),
        Some(7.0)
    );

    // An older poll result landing later still overwrites.
    advance(POLL).await;
    assert_eq!(
        store.snapshot().metrics.as_ref().map(|m| m.uplink.throughput_mbps),
        Some(1.0)
    );

    supervisor.shutdown().await.unwrap();
}

// ── Teardown ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn shutdown_stops_polling_and_closes_push() {
    let store = Arc::new(MetricsStore::new());
    let source = default_source();
    let connector = FakeConnector::default();
    let mut supervisor = Supervisor::start(
        source.clone(),
        Some(connector.clone()),
        timings(),
        Arc::clone(&store),
    );
    settle().await;
    connector.emit(0, ChannelEvent::Opened).await;
    settle().await;

    supervisor.shutdown().await.unwrap();
    assert_eq!(connector.closed(), 1);

    let cycles = source.cycles();
    let revision = store.snapshot().revision;
    advance(POLL * 5).await;
    assert_eq!(source.cycles(), cycles);
    assert_eq!(store.snapshot().revision, revision);
    assert_eq!(connector.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn fetch_in_flight_at_shutdown_never_lands() {
    let store = Arc::new(MetricsStore::new());
    let inner = default_source();
    let source = SlowSource {
        inner: inner.clone(),
        latency: Duration::from_millis(500),
    };
    let mut supervisor =
        Supervisor::start(source, None::<FakeConnector>, timings(), Arc::clone(&store));
    settle().await;

    advance(Duration::from_millis(100)).await;
    assert_eq!(inner.cycles(), 0, "first fetch is still in flight");

    supervisor.shutdown().await.unwrap();
    advance(Duration::from_secs(5)).await;

    let view = store.snapshot();
    assert_eq!(view.revision, 0);
    assert!(view.metrics.is_none());
    assert!(view.drops.is_none());
    assert_eq!(inner.cycles(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_reconnect() {
    let store = Arc::new(MetricsStore::new());
    let connector = FakeConnector::default();
    let mut supervisor = Supervisor::start(
        default_source(),
        Some(connector.clone()),
        timings(),
        Arc::clone(&store),
    );
    settle().await;
    connector.emit(0, ChannelEvent::Closed).await;
    settle().await;

    advance(Duration::from_millis(1000)).await;
    supervisor.shutdown().await.unwrap();

    advance(RECONNECT * 2).await;
    assert_eq!(connector.opens(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_shutdown_reports_stopped() {
    let store = Arc::new(MetricsStore::new());
    let mut supervisor =
        Supervisor::start(default_source(), None::<FakeConnector>, timings(), store);

    supervisor.shutdown().await.unwrap();
    assert!(matches!(
        supervisor.shutdown().await,
        Err(upfwatch_core::CoreError::SupervisorStopped)
    ));
}

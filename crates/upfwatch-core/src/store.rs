// ── Latest-value metrics store ──
//
// Single holder of the most recent traffic, drop and session data for one
// dashboard instance. Every accepted mutation publishes a fresh
// `Arc<MetricsView>` on a `watch` channel; untouched fields keep sharing
// their previous `Arc`, so consumers can diff with `Arc::ptr_eq`.

use std::sync::Arc;

use tokio::sync::watch;
use upfwatch_api::{DropSnapshot, PushData, SessionInfo, TrafficSnapshot};

/// Immutable read model handed to presentation.
#[derive(Debug, Clone, Default)]
pub struct MetricsView {
    /// Latest traffic snapshot, `None` until the first delivery.
    pub metrics: Option<Arc<TrafficSnapshot>>,
    /// Latest drop snapshot, `None` until the first delivery.
    pub drops: Option<Arc<DropSnapshot>>,
    pub sessions: Arc<Vec<SessionInfo>>,
    /// The push channel is currently delivering.
    pub connected: bool,
    /// Most recent ingestion failure, cleared by the next good delivery.
    pub error: Option<String>,
    /// Bumped on every accepted update.
    pub revision: u64,
}

/// Owner of the latest-known telemetry.
///
/// Writes are unconditional overwrites (last write wins per field); there
/// is no ordering between the push and pull paths.
#[derive(Debug)]
pub struct MetricsStore {
    view: watch::Sender<Arc<MetricsView>>,
}

impl MetricsStore {
    pub fn new() -> Self {
        let (view, _) = watch::channel(Arc::new(MetricsView::default()));
        Self { view }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// The current read model.
    pub fn snapshot(&self) -> Arc<MetricsView> {
        Arc::clone(&self.view.borrow())
    }

    /// Receiver that wakes on every accepted update.
    pub fn subscribe(&self) -> watch::Receiver<Arc<MetricsView>> {
        self.view.subscribe()
    }

    // ── Single-field overwrites ──────────────────────────────────────

    pub fn apply_traffic(&self, snapshot: TrafficSnapshot) {
        self.update(|view| view.metrics = Some(Arc::new(snapshot)));
    }

    pub fn apply_drops(&self, snapshot: DropSnapshot) {
        self.update(|view| view.drops = Some(Arc::new(snapshot)));
    }

    pub fn apply_sessions(&self, sessions: Vec<SessionInfo>) {
        self.update(|view| view.sessions = Arc::new(sessions));
    }

    // ── Channel-level updates ────────────────────────────────────────

    /// Apply one complete poll cycle in a single publish and clear any
    /// previous ingestion error.
    pub fn apply_poll_batch(
        &self,
        traffic: TrafficSnapshot,
        drops: DropSnapshot,
        sessions: Vec<SessionInfo>,
    ) {
        self.update(|view| {
            view.metrics = Some(Arc::new(traffic));
            view.drops = Some(Arc::new(drops));
            view.sessions = Arc::new(sessions);
            view.error = None;
        });
    }

    /// Apply a decoded push frame: whatever it carries, plus the implicit
    /// "push is alive" signal.
    pub fn apply_push(&self, data: PushData) {
        self.update(|view| {
            if let Some(traffic) = data.traffic {
                view.metrics = Some(Arc::new(traffic));
            }
            if let Some(drops) = data.drops {
                view.drops = Some(Arc::new(drops));
            }
            view.connected = true;
            view.error = None;
        });
    }

    /// Overwrite the connectivity fields together.
    pub fn set_link(&self, connected: bool, error: Option<String>) {
        self.update(|view| {
            view.connected = connected;
            view.error = error;
        });
    }

    pub fn set_connected(&self, connected: bool) {
        self.update(|view| view.connected = connected);
    }

    pub fn set_error(&self, error: impl Into<String>) {
        let error = error.into();
        self.update(|view| view.error = Some(error));
    }

    fn update(&self, mutate: impl FnOnce(&mut MetricsView)) {
        self.view.send_modify(|current| {
            let mut next = MetricsView::clone(current);
            mutate(&mut next);
            next.revision = current.revision.wrapping_add(1);
            *current = Arc::new(next);
        });
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Connection supervision ──
//
// Keeps one dashboard fed from two independent sources:
//
//   * a pull loop that fetches traffic, drops and sessions on a fixed
//     interval for as long as the supervisor lives, and
//   * a push loop that holds at most one push channel open and reopens it
//     a fixed delay after it closes.
//
// Both write into the same `MetricsStore`; whichever lands last wins.
// Teardown cancels one token: the poll interval, any pending reconnect
// delay and the live push channel all go with it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::Display;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use upfwatch_api::{
    ChannelEvent, DropSnapshot, MetricsClient, PushChannel, PushFrame, SessionInfo,
    TrafficSnapshot,
};

use crate::config::{DEFAULT_POLL_INTERVAL, DEFAULT_RECONNECT_DELAY, DashboardConfig};
use crate::error::CoreError;
use crate::store::MetricsStore;

/// Store error after any failed poll cycle.
pub const POLL_FAILURE: &str = "Failed to fetch metrics";
/// Store error after the push channel reports a transport error.
pub const PUSH_FAILURE: &str = "Push channel connection error";
/// Store error when the push channel cannot be created at all.
pub const PUSH_UNAVAILABLE: &str = "Failed to create push connection";

// ── Source seams ─────────────────────────────────────────────────────

/// Pull side: one fetch per resource.
pub trait MetricsSource: Send + Sync + 'static {
    fn fetch_traffic(
        &self,
    ) -> impl Future<Output = Result<TrafficSnapshot, upfwatch_api::Error>> + Send;

    fn fetch_drops(&self) -> impl Future<Output = Result<DropSnapshot, upfwatch_api::Error>> + Send;

    fn fetch_sessions(
        &self,
    ) -> impl Future<Output = Result<Vec<SessionInfo>, upfwatch_api::Error>> + Send;
}

impl MetricsSource for MetricsClient {
    fn fetch_traffic(
        &self,
    ) -> impl Future<Output = Result<TrafficSnapshot, upfwatch_api::Error>> + Send {
        MetricsClient::fetch_traffic(self)
    }

    fn fetch_drops(&self) -> impl Future<Output = Result<DropSnapshot, upfwatch_api::Error>> + Send {
        MetricsClient::fetch_drops(self)
    }

    fn fetch_sessions(
        &self,
    ) -> impl Future<Output = Result<Vec<SessionInfo>, upfwatch_api::Error>> + Send {
        async move {
            MetricsClient::fetch_sessions(self)
                .await
                .map(|list| list.sessions)
        }
    }
}

/// Push side: opens one channel per call.
///
/// `Err` means the channel could not even be constructed; the supervisor
/// gives up on push for the rest of its life. Everything after a
/// successful `open` arrives as [`ChannelEvent`]s. Dropping the returned
/// handle must close the channel.
pub trait PushConnector: Send + Sync + 'static {
    type Channel: Send + 'static;

    fn open(&self) -> Result<(Self::Channel, mpsc::Receiver<ChannelEvent>), upfwatch_api::Error>;
}

/// Websocket implementation of [`PushConnector`].
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: Url,
}

impl WebSocketConnector {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

impl PushConnector for WebSocketConnector {
    type Channel = PushChannel;

    fn open(&self) -> Result<(PushChannel, mpsc::Receiver<ChannelEvent>), upfwatch_api::Error> {
        PushChannel::open(self.url.clone())
    }
}

// ── Push lifecycle ───────────────────────────────────────────────────

/// Push-channel connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Erroring,
}

/// Published view of the push side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub last_error: Option<String>,
    /// Number of channels opened so far (including failed constructions).
    pub push_attempts: u32,
    /// False once construction has failed, or when push is disabled.
    pub push_available: bool,
}

/// Pure transition logic for the push channel.
///
/// Holds no timer state. `push_task` stops reading a channel at its first
/// close and drops the receiver before sleeping, so any later close from
/// the same channel is never observed and each channel yields at most one
/// reconnect delay.
#[derive(Debug, Clone, Default)]
pub struct PushLifecycle {
    status: ConnectionStatus,
}

impl PushLifecycle {
    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn begin_attempt(&mut self) {
        self.status.state = ConnectionState::Connecting;
        self.status.push_attempts = self.status.push_attempts.saturating_add(1);
        self.status.push_available = true;
    }

    /// Handshake completed, or a frame proved the channel alive.
    pub fn opened(&mut self) {
        self.status.state = ConnectionState::Connected;
        self.status.last_error = None;
    }

    pub fn errored(&mut self, reason: impl Into<String>) {
        self.status.state = ConnectionState::Erroring;
        self.status.last_error = Some(reason.into());
    }

    /// Channel gone; keeps `last_error` so the UI can show why.
    pub fn closed(&mut self) {
        self.status.state = ConnectionState::Disconnected;
    }

    /// Construction failed; no further attempts will be made.
    pub fn unavailable(&mut self, reason: impl Into<String>) {
        self.status.state = ConnectionState::Disconnected;
        self.status.last_error = Some(reason.into());
        self.status.push_available = false;
    }
}

// ── Supervisor ───────────────────────────────────────────────────────

/// Loop pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorTimings {
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
}

impl Default for SupervisorTimings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl From<&DashboardConfig> for SupervisorTimings {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            reconnect_delay: config.reconnect_delay,
        }
    }
}

/// Running ingestion for one dashboard instance.
///
/// Dropping the supervisor cancels its tasks; [`shutdown`](Self::shutdown)
/// additionally waits for them to finish.
pub struct Supervisor {
    store: Arc<MetricsStore>,
    status: watch::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
    task_handles: Vec<JoinHandle<()>>,
    stopped: bool,
}

impl Supervisor {
    /// Spawn the poll loop and, when a connector is given, the push loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S, C>(
        source: S,
        connector: Option<C>,
        timings: SupervisorTimings,
        store: Arc<MetricsStore>,
    ) -> Self
    where
        S: MetricsSource,
        C: PushConnector,
    {
        let cancel = CancellationToken::new();
        let (status_tx, status) = watch::channel(ConnectionStatus::default());
        let mut task_handles = Vec::with_capacity(2);

        task_handles.push(tokio::spawn(poll_task(
            source,
            Arc::clone(&store),
            timings.poll_interval,
            cancel.clone(),
        )));

        if let Some(connector) = connector {
            task_handles.push(tokio::spawn(push_task(
                connector,
                Arc::clone(&store),
                status_tx,
                timings.reconnect_delay,
                cancel.clone(),
            )));
        } else {
            debug!("push disabled, polling only");
        }

        info!(
            poll_interval = ?timings.poll_interval,
            "metrics supervisor started"
        );

        Self {
            store,
            status,
            cancel,
            task_handles,
            stopped: false,
        }
    }

    /// Wire a real backend: `client` for polling, plus the websocket push
    /// channel derived from it unless `config.push_enabled` is off.
    pub fn connect(
        client: MetricsClient,
        config: &DashboardConfig,
        store: Arc<MetricsStore>,
    ) -> Result<Self, CoreError> {
        let connector = if config.push_enabled {
            let url = client
                .push_url(&config.push_path)
                .map_err(|e| CoreError::Config {
                    message: format!("push channel URL: {e}"),
                })?;
            Some(WebSocketConnector::new(url))
        } else {
            None
        };

        Ok(Self::start(
            client,
            connector,
            SupervisorTimings::from(config),
            store,
        ))
    }

    pub fn store(&self) -> &Arc<MetricsStore> {
        &self.store
    }

    /// Receiver for push-side state changes.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Cancel every loop and wait for them to exit.
    ///
    /// After this returns no further store writes happen, no timer is
    /// pending and the push channel is closed.
    pub async fn shutdown(&mut self) -> Result<(), CoreError> {
        if self.stopped {
            return Err(CoreError::SupervisorStopped);
        }
        self.stopped = true;
        self.cancel.cancel();

        for handle in self.task_handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "supervisor task ended abnormally");
            }
        }
        debug!("metrics supervisor stopped");
        Ok(())
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Fetch all three resources every `period`, first cycle immediately.
///
/// A cycle is applied to the store in one publish or not at all.
async fn poll_task<S: MetricsSource>(
    source: S,
    store: Arc<MetricsStore>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let cycle = async {
            tokio::try_join!(
                source.fetch_traffic(),
                source.fetch_drops(),
                source.fetch_sessions(),
            )
        };

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = cycle => result,
        };

        match result {
            Ok((traffic, drops, sessions)) => {
                debug!(sessions = sessions.len(), "poll cycle applied");
                store.apply_poll_batch(traffic, drops, sessions);
            }
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "poll cycle failed");
                store.set_error(POLL_FAILURE);
            }
        }
    }

    debug!("poll task exiting");
}

/// Keep one push channel alive, reopening it `reconnect_delay` after
/// each close.
async fn push_task<C: PushConnector>(
    connector: C,
    store: Arc<MetricsStore>,
    status: watch::Sender<ConnectionStatus>,
    reconnect_delay: Duration,
    cancel: CancellationToken,
) {
    let mut lifecycle = PushLifecycle::default();

    loop {
        lifecycle.begin_attempt();
        status.send_replace(lifecycle.status().clone());

        let (channel, mut events) = match connector.open() {
            Ok(opened) => opened,
            Err(e) => {
                warn!(error = %e, "push channel unavailable, continuing with polling only");
                lifecycle.unavailable(e.to_string());
                status.send_replace(lifecycle.status().clone());
                store.set_link(false, Some(PUSH_UNAVAILABLE.into()));
                return;
            }
        };

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                event = events.recv() => Some(event.unwrap_or(ChannelEvent::Closed)),
            };
            let Some(event) = event else {
                drop(channel);
                debug!("push task exiting");
                return;
            };

            match event {
                ChannelEvent::Opened => {
                    info!("push channel open");
                    lifecycle.opened();
                    store.set_link(true, None);
                }
                ChannelEvent::Frame(text) => match PushFrame::parse(&text) {
                    Ok(frame) => {
                        lifecycle.opened();
                        store.apply_push(frame.data.unwrap_or_default());
                    }
                    Err(e) => {
                        debug!(error = %e, len = text.len(), "discarding malformed push frame");
                        continue;
                    }
                },
                ChannelEvent::Error(reason) => {
                    warn!(reason = %reason, "push channel error");
                    lifecycle.errored(reason);
                    store.set_link(false, Some(PUSH_FAILURE.into()));
                }
                ChannelEvent::Closed => {
                    info!(
                        delay = ?reconnect_delay,
                        "push channel closed, reconnect scheduled"
                    );
                    lifecycle.closed();
                    store.set_connected(false);
                    status.send_replace(lifecycle.status().clone());
                    break;
                }
            }
            status.send_replace(lifecycle.status().clone());
        }

        drop(events);
        drop(channel);

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("push task exiting during reconnect delay");
                return;
            }
            () = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}

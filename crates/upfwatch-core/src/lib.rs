// upfwatch-core: Live ingestion, latest-value store and chart scaling between upfwatch-api and the dashboard.

pub mod chart;
pub mod config;
pub mod error;
pub mod store;
pub mod supervisor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use chart::{ChartData, ChartSeries, Sample, SampleBuffer, ScaleSelector, ThroughputUnit, TrafficChart};
pub use config::{ChartConfig, DashboardConfig, TlsVerification};
pub use error::CoreError;
pub use store::{MetricsStore, MetricsView};
pub use supervisor::{
    ConnectionState, ConnectionStatus, MetricsSource, PushConnector, PushLifecycle, Supervisor,
    SupervisorTimings, WebSocketConnector,
};

// Wire types consumers need alongside the read model.
pub use upfwatch_api::{
    DirectionStats, DropDirection, DropEvent, DropSnapshot, FaultRequest, HealthStatus,
    MetricsClient, SessionInfo, TrafficSnapshot,
};
pub use upfwatch_api::Error as ApiError;

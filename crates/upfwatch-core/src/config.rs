// ── Runtime dashboard configuration ──
//
// These types describe *where* the telemetry comes from and how the
// ingestion loops are paced. They never touch disk: the TUI (via
// upfwatch-config) builds a `DashboardConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use upfwatch_api::MetricsClient;
use upfwatch_api::transport::{TlsMode, TransportConfig};
use url::Url;

use crate::error::CoreError;

/// Poll cadence of the pull channel.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
/// Delay between a push-channel close and the next open attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);
/// Minimum spacing between two admitted chart samples.
pub const DEFAULT_SAMPLE_THROTTLE: Duration = Duration::from_millis(900);
/// Rolling window length of the throughput chart.
pub const DEFAULT_SAMPLE_CAPACITY: usize = 60;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (lab UPFs with self-signed certs).
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Configuration for one dashboard instance.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Backend root (e.g., `http://upf-host:8080`).
    pub url: Url,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Per-request timeout for the pull channel.
    pub timeout: Duration,
    /// Open the push channel at all. When false only polling runs.
    pub push_enabled: bool,
    /// Path of the push endpoint, relative to `url`.
    pub push_path: String,
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub chart: ChartConfig,
}

impl DashboardConfig {
    /// Config for `url` with the stock timings and push enabled.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(10),
            push_enabled: true,
            push_path: "/ws/metrics".into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            chart: ChartConfig::default(),
        }
    }

    /// Transport settings for the REST client.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: TlsMode::from(&self.tls),
            timeout: self.timeout,
        }
    }

    /// Build the REST client for this backend.
    pub fn client(&self) -> Result<MetricsClient, CoreError> {
        Ok(MetricsClient::new(self.url.clone(), &self.transport())?)
    }
}

/// Tuning for the throughput chart's rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartConfig {
    pub capacity: usize,
    pub throttle: Duration,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SAMPLE_CAPACITY,
            throttle: DEFAULT_SAMPLE_THROTTLE,
        }
    }
}

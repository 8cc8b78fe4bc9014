//! Shared configuration for the upfwatch dashboard.
//!
//! TOML profiles (one per UPF backend), layered loading through figment
//! (built-in defaults, then the config file, then `UPFWATCH_` environment
//! variables), and translation into `upfwatch_core::DashboardConfig`.
//!
//! Environment overrides use `__` as the nesting separator, e.g.
//! `UPFWATCH_DEFAULTS__POLL_INTERVAL_MS=1000` or
//! `UPFWATCH_DEFAULT_PROFILE=lab`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use upfwatch_core::{ChartConfig, DashboardConfig, TlsVerification};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}'")]
    UnknownProfile { profile: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is requested explicitly.
    pub default_profile: Option<String>,

    /// Values every profile inherits unless it overrides them.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub insecure: bool,

    /// Open the push channel.
    #[serde(default = "default_push")]
    pub push: bool,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_chart_capacity")]
    pub chart_capacity: usize,

    #[serde(default = "default_chart_throttle_ms")]
    pub chart_throttle_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            insecure: false,
            push: default_push(),
            poll_interval_ms: default_poll_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            chart_capacity: default_chart_capacity(),
            chart_throttle_ms: default_chart_throttle_ms(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}
fn default_push() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    2000
}
fn default_reconnect_delay_ms() -> u64 {
    3000
}
fn default_chart_capacity() -> usize {
    60
}
fn default_chart_throttle_ms() -> u64 {
    900
}

/// A named telemetry backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Backend base URL (e.g., "http://upf-host:8080").
    pub url: String,

    /// Push endpoint path.
    #[serde(default = "default_push_path")]
    pub push_path: String,

    /// Override the default push setting.
    pub push: Option<bool>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    pub poll_interval_ms: Option<u64>,

    pub reconnect_delay_ms: Option<u64>,
}

impl Profile {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            push_path: default_push_path(),
            push: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
            poll_interval_ms: None,
            reconnect_delay_ms: None,
        }
    }
}

fn default_push_path() -> String {
    "/ws/metrics".into()
}

impl Config {
    /// Resolve a profile by name, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());

        match self.profiles.get(&name) {
            Some(profile) => Ok((name, profile)),
            None => Err(ConfigError::UnknownProfile { profile: name }),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "upfwatch", "upfwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("upfwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
///
/// A missing file is not an error; the defaults and environment still
/// apply. A file that exists but does not parse is.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("UPFWATCH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `DashboardConfig` from a profile plus the global defaults.
pub fn profile_to_dashboard_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<DashboardConfig, ConfigError> {
    let url = parse_backend_url(&profile.url)?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    if !profile.push_path.starts_with('/') {
        return Err(ConfigError::Validation {
            field: "push_path".into(),
            reason: format!("must start with '/', got '{}'", profile.push_path),
        });
    }

    let poll_interval = positive_millis(
        "poll_interval_ms",
        profile.poll_interval_ms.unwrap_or(defaults.poll_interval_ms),
    )?;
    let reconnect_delay = positive_millis(
        "reconnect_delay_ms",
        profile
            .reconnect_delay_ms
            .unwrap_or(defaults.reconnect_delay_ms),
    )?;

    if defaults.chart_capacity < 2 {
        return Err(ConfigError::Validation {
            field: "chart_capacity".into(),
            reason: format!("need at least 2 samples, got {}", defaults.chart_capacity),
        });
    }

    let mut config = DashboardConfig::new(url);
    config.tls = tls;
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.push_enabled = profile.push.unwrap_or(defaults.push);
    config.push_path.clone_from(&profile.push_path);
    config.poll_interval = poll_interval;
    config.reconnect_delay = reconnect_delay;
    config.chart = ChartConfig {
        capacity: defaults.chart_capacity,
        throttle: Duration::from_millis(defaults.chart_throttle_ms),
    };
    Ok(config)
}

/// Parse and check a backend base URL.
pub fn parse_backend_url(raw: &str) -> Result<url::Url, ConfigError> {
    let url: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {raw}"),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "url".into(),
            reason: format!("expected http:// or https://, got {}://", url.scheme()),
        });
    }
    Ok(url)
}

fn positive_millis(field: &str, value: u64) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_millis(value))
}

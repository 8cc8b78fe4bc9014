// ── Core error types ──
//
// User-facing errors from upfwatch-core. Ingestion failures never reach
// the presentation layer as `Err` (they land on the read model instead).
// These variants cover client setup, one-shot requests like fault
// injection, and supervisor misuse. `From<upfwatch_api::Error>` is the
// single place transport errors get reworded for display.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach telemetry backend at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Telemetry backend timed out")]
    Timeout,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Supervisor already stopped")]
    SupervisorStopped,

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<upfwatch_api::Error> for CoreError {
    fn from(err: upfwatch_api::Error) -> Self {
        match err {
            upfwatch_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            upfwatch_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            upfwatch_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS setup: {msg}"),
            },
            upfwatch_api::Error::Http { status, endpoint } => CoreError::Api {
                message: format!("{endpoint} returned HTTP {status}"),
                status: Some(status),
            },
            upfwatch_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("Push channel connection failed: {reason}"),
            },
            upfwatch_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

use thiserror::Error;

/// Top-level error type for the `upfwatch-api` crate.
///
/// Covers every failure mode across both delivery paths: the REST pull
/// endpoints and the websocket push channel. `upfwatch-core` maps these
/// into connectivity state instead of surfacing them to the UI.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST ────────────────────────────────────────────────────────
    /// The backend answered with a non-success status code.
    #[error("{endpoint} returned HTTP {status}")]
    Http { status: u16, endpoint: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Http {
            status: 503,
            endpoint: "/api/v1/metrics/traffic".into(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        let err = Error::Http {
            status: 404,
            endpoint: "/api/v1/sessions".into(),
        };
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "/api/v1/sessions returned HTTP 404");
    }

    #[test]
    fn bad_payload_is_not_transient() {
        let err = Error::Deserialization {
            message: "metrics/traffic: missing field `uplink`".into(),
            body: "{}".into(),
        };
        assert!(!err.is_transient());
    }
}

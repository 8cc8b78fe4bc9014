// Pull-channel HTTP client
//
// Wraps `reqwest::Client` with URL construction against the backend's
// `/api/v1` surface, status-code checking, and body decoding that keeps
// the raw payload around when deserialization fails.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{DropSnapshot, FaultRequest, HealthStatus, SessionList, TrafficSnapshot};
use crate::transport::TransportConfig;

const API_PREFIX: &str = "api/v1/";

/// Async client for the backend's REST endpoints.
///
/// Cheap to clone (the inner `reqwest::Client` is reference counted), so
/// poll cycles can fan out concurrent requests from clones.
#[derive(Debug, Clone)]
pub struct MetricsClient {
    http: reqwest::Client,
    base_url: Url,
}

impl MetricsClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the backend root, e.g. `http://upf-host:8080`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: with_trailing_slash(base_url),
        }
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for an `/api/v1/{path}` endpoint.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(API_PREFIX)?.join(path)?)
    }

    /// Derive the push-channel URL (`ws://` or `wss://`) for `path`,
    /// mirroring the scheme of the REST base URL.
    pub fn push_url(&self, path: &str) -> Result<Url, Error> {
        let mut url = self.base_url.join(path.trim_start_matches('/'))?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(Error::WebSocketConnect(format!(
                    "unsupported scheme for push channel: {other}"
                )));
            }
        };
        url.set_scheme(scheme).map_err(|()| {
            Error::WebSocketConnect(format!("cannot switch {url} to {scheme}"))
        })?;
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.api_url(path)?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        decode(path, resp).await
    }

    /// Send a POST request with a JSON body, discarding any response body.
    async fn post(&self, path: &str, body: &impl Serialize) -> Result<(), Error> {
        let url = self.api_url(path)?;
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        check_status(path, &resp)?;
        Ok(())
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /api/v1/health`
    pub async fn fetch_health(&self) -> Result<HealthStatus, Error> {
        self.get("health").await
    }

    /// `GET /api/v1/metrics/traffic`
    pub async fn fetch_traffic(&self) -> Result<TrafficSnapshot, Error> {
        self.get("metrics/traffic").await
    }

    /// `GET /api/v1/metrics/drops`
    pub async fn fetch_drops(&self) -> Result<DropSnapshot, Error> {
        self.get("metrics/drops").await
    }

    /// `GET /api/v1/sessions`
    pub async fn fetch_sessions(&self) -> Result<SessionList, Error> {
        self.get("sessions").await
    }

    /// `POST /api/v1/fault/inject`
    pub async fn inject_fault(&self, request: &FaultRequest) -> Result<(), Error> {
        self.post("fault/inject", request).await
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn check_status(path: &str, resp: &reqwest::Response) -> Result<(), Error> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::Http {
            status: status.as_u16(),
            endpoint: format!("/{API_PREFIX}{path}"),
        })
    }
}

async fn decode<T: DeserializeOwned>(path: &str, resp: reqwest::Response) -> Result<T, Error> {
    check_status(path, &resp)?;
    let body = resp.text().await.map_err(Error::Transport)?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: format!("{path}: {e}"),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> MetricsClient {
        MetricsClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn api_url_appends_prefix() {
        let c = client("http://upf:8080");
        assert_eq!(
            c.api_url("metrics/traffic").unwrap().as_str(),
            "http://upf:8080/api/v1/metrics/traffic"
        );
    }

    #[test]
    fn api_url_keeps_base_path() {
        let c = client("https://gateway.local/upf");
        assert_eq!(
            c.api_url("sessions").unwrap().as_str(),
            "https://gateway.local/upf/api/v1/sessions"
        );
    }

    #[test]
    fn push_url_mirrors_scheme() {
        assert_eq!(
            client("http://upf:8080").push_url("/ws/metrics").unwrap().as_str(),
            "ws://upf:8080/ws/metrics"
        );
        assert_eq!(
            client("https://upf").push_url("ws/metrics").unwrap().as_str(),
            "wss://upf/ws/metrics"
        );
    }

    #[test]
    fn push_url_rejects_foreign_scheme() {
        let err = client("ftp://upf").push_url("/ws/metrics").unwrap_err();
        assert!(matches!(err, Error::WebSocketConnect(_)), "got {err:?}");
    }
}

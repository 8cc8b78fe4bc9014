//! Push channel over the backend's `/ws/metrics` websocket.
//!
//! A [`PushChannel`] owns exactly one websocket connection attempt and turns
//! everything that happens on it into a flat [`ChannelEvent`] sequence on a
//! single `mpsc` receiver: `Opened`, any number of `Frame`s, optionally an
//! `Error`, and finally `Closed`. It never reconnects on its own; the
//! reconnect policy belongs to whoever consumes the events.
//!
//! # Example
//!
//! ```rust,ignore
//! use upfwatch_api::websocket::{ChannelEvent, PushChannel};
//! use url::Url;
//!
//! let url = Url::parse("ws://upf-host:8080/ws/metrics")?;
//! let (channel, mut events) = PushChannel::open(url)?;
//!
//! while let Some(event) = events.recv().await {
//!     if let ChannelEvent::Frame(text) = event {
//!         println!("{text}");
//!     }
//! }
//!
//! channel.close();
//! ```

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Event channel capacity ───────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── ChannelEvent ─────────────────────────────────────────────────────

/// Everything a push connection can report, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The websocket handshake completed.
    Opened,
    /// A text frame, still undecoded.
    Frame(String),
    /// The connection is gone (remote close, stream end, or after an error).
    Closed,
    /// A transport error. Always followed by `Closed`.
    Error(String),
}

// ── PushChannel ──────────────────────────────────────────────────────

/// Handle to a single live push connection.
///
/// Dropping the handle closes the connection.
#[derive(Debug)]
pub struct PushChannel {
    cancel: CancellationToken,
}

impl PushChannel {
    /// Validate `url` and spawn the connection task.
    ///
    /// Returns an error without spawning anything when the URL cannot be
    /// used for a websocket handshake at all. Network failures happen
    /// asynchronously and are reported as `Error` + `Closed` events.
    pub fn open(url: Url) -> Result<(Self, mpsc::Receiver<ChannelEvent>), Error> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::WebSocketConnect(format!(
                "push channel requires ws:// or wss://, got {url}"
            )));
        }

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| {
                Error::WebSocketConnect(e.to_string())
            })?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = connect_and_read(&url, uri, &event_tx, &task_cancel).await {
                tracing::warn!(error = %e, url = %url, "push channel failed");
                let _ = event_tx.send(ChannelEvent::Error(e.to_string())).await;
            }
            let _ = event_tx.send(ChannelEvent::Closed).await;
            tracing::debug!("push channel task exiting");
        });

        Ok((Self { cancel }, event_rx))
    }

    /// Close the connection (sends a close frame if the socket is open).
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish the websocket connection and forward frames until it drops.
///
/// `Ok(())` means a clean end: remote close frame, stream end, or local
/// cancellation.
async fn connect_and_read(
    url: &Url,
    uri: tungstenite::http::Uri,
    event_tx: &mpsc::Sender<ChannelEvent>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "Connecting push channel");

    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        result = tokio_tungstenite::connect_async(uri) => {
            result.map_err(|e| Error::WebSocketConnect(e.to_string()))?
        }
    };

    tracing::info!("Push channel connected");
    if event_tx.send(ChannelEvent::Opened).await.is_err() {
        return Ok(());
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(());
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        let forwarded = event_tx
                            .send(ChannelEvent::Frame(text.as_str().to_owned()))
                            .await;
                        if forwarded.is_err() {
                            // Consumer is gone
                            return Ok(());
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("push channel ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "push channel close frame received"
                            );
                        } else {
                            tracing::info!("push channel close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("push channel stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_rejects_http_scheme() {
        let url = Url::parse("http://upf:8080/ws/metrics").unwrap();
        let err = PushChannel::open(url).unwrap_err();
        assert!(matches!(err, Error::WebSocketConnect(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn unreachable_host_reports_error_then_closed() {
        // Port 9 (discard) on loopback is essentially never listening.
        let url = Url::parse("ws://127.0.0.1:9/ws/metrics").unwrap();
        let (_channel, mut events) = PushChannel::open(url).unwrap();

        let first = events.recv().await.unwrap();
        assert!(matches!(first, ChannelEvent::Error(_)), "got {first:?}");
        assert_eq!(events.recv().await, Some(ChannelEvent::Closed));
    }

    #[tokio::test]
    async fn close_before_handshake_emits_only_closed() {
        let url = Url::parse("ws://127.0.0.1:9/ws/metrics").unwrap();
        let (channel, mut events) = PushChannel::open(url).unwrap();
        channel.close();

        // Either the cancellation wins (clean close) or the refused
        // connect raced ahead of it; both must end in `Closed`.
        let mut last = None;
        while let Some(event) = events.recv().await {
            last = Some(event);
        }
        assert_eq!(last, Some(ChannelEvent::Closed));
    }
}

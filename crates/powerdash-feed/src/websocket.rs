//! WebSocket feed with fixed-delay auto-reconnect.
//!
//! Connects to the simulator's websocket endpoint, broadcasts decoded
//! [`FeedEvent`]s through a [`tokio::sync::broadcast`] channel and writes
//! outbound [`ClientRequest`]s. After any disconnect the loop waits a fixed
//! delay and tries again, forever, until cancelled.
//!
//! # Example
//!
//! ```rust,ignore
//! use powerdash_feed::websocket::{FeedHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let url = Url::parse("ws://localhost:8000/simengine")?;
//!
//! let handle = FeedHandle::connect(url, ReconnectConfig::default(), cancel.clone())?;
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::feed::{FeedEvent, TopologyFeed};
use crate::protocol::ServerMessage;
use crate::request::ClientRequest;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Fixed-delay reconnection policy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Pause after every close or failed attempt. Default: 5s.
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
        }
    }
}

// ── FeedHandle ───────────────────────────────────────────────────────

/// Handle to a running websocket feed.
///
/// Call [`shutdown`](Self::shutdown) (or cancel the token passed to
/// [`connect`](Self::connect)) to tear down the background task.
pub struct FeedHandle {
    event_rx: broadcast::Receiver<Arc<FeedEvent>>,
    outbound_tx: mpsc::UnboundedSender<ClientRequest>,
    online: watch::Receiver<bool>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FeedHandle {
    /// Spawn the connection loop for `url`.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. Must be called from within a Tokio runtime.
    pub fn connect(
        url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::WebSocketConnect(format!(
                "unsupported scheme '{}' (expected ws or wss)",
                url.scheme()
            )));
        }

        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (online_tx, online) = watch::channel(false);

        let session = Arc::new(Session {
            url,
            event_tx,
            online_tx,
            outbound_rx: Mutex::new(outbound_rx),
            cancel: cancel.clone(),
        });

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            reconnect_loop(
                move |_attempt| {
                    let session = Arc::clone(&session);
                    async move { session.connect_and_run().await }
                },
                reconnect,
                task_cancel,
            )
            .await;
        });

        Ok(Self {
            event_rx,
            outbound_tx,
            online,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    /// Watch the online flag directly.
    pub fn online(&self) -> watch::Receiver<bool> {
        self.online.clone()
    }

    /// Signal the background task to shut down.
    ///
    /// Requests already accepted by [`send`](TopologyFeed::send) are still
    /// written, followed by a Close frame. Await [`join`](Self::join) to
    /// know they went out.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the background task to finish. Returns at once if it was
    /// already joined.
    pub async fn join(&self) {
        let Some(task) = self.task.lock().await.take() else {
            return;
        };
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "feed task ended abnormally");
        }
    }
}

impl TopologyFeed for FeedHandle {
    fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    fn send(&self, request: ClientRequest) -> Result<(), Error> {
        if !self.is_online() {
            return Err(Error::Offline);
        }
        self.outbound_tx
            .send(request)
            .map_err(|_| Error::SendFailed)
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<FeedEvent>> {
        self.event_rx.resubscribe()
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → run → wait `delay` → connect again.
///
/// `connect` resolves when the connection ends; `Ok` means it was
/// established and later closed, `Err` that it never came up or broke.
/// It must return promptly once `cancel` fires.
pub(crate) async fn reconnect_loop<F, Fut>(
    mut connect: F,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<(), Error>>,
{
    let mut attempt: u32 = 0;

    loop {
        // A running session watches `cancel` itself and closes cleanly;
        // it is never dropped mid-flight.
        let result = connect(attempt).await;
        if cancel.is_cancelled() {
            break;
        }

        attempt = match result {
            Ok(()) => {
                tracing::info!("feed disconnected");
                0
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "feed connection failed");
                attempt.saturating_add(1)
            }
        };

        tracing::info!(
            delay_ms = u64::try_from(reconnect.delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(reconnect.delay) => {}
        }
    }

    tracing::debug!("feed loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

struct Session {
    url: Url,
    event_tx: broadcast::Sender<Arc<FeedEvent>>,
    online_tx: watch::Sender<bool>,
    outbound_rx: Mutex<mpsc::UnboundedReceiver<ClientRequest>>,
    cancel: CancellationToken,
}

impl Session {
    /// Establish one connection and pump frames until it drops.
    async fn connect_and_run(&self) -> Result<(), Error> {
        tracing::info!(url = %self.url, "connecting to feed");

        let (ws_stream, _response) = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Ok(()),
            connected = tokio_tungstenite::connect_async(self.url.as_str()) => {
                connected.map_err(|e| Error::WebSocketConnect(e.to_string()))?
            }
        };

        tracing::info!("feed connected");

        let mut outbound = self.outbound_rx.lock().await;
        discard_pending(&mut outbound);

        self.online_tx.send_replace(true);
        let _ = self.event_tx.send(Arc::new(FeedEvent::Opened));

        let (mut write, mut read) = ws_stream.split();

        let result = loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    // Requests accepted before shutdown still go out.
                    while let Ok(request) = outbound.try_recv() {
                        if let Ok(text) = request.to_json() {
                            let _ = write.send(tungstenite::Message::text(text)).await;
                        }
                    }
                    if let Err(e) = write.send(tungstenite::Message::Close(None)).await {
                        tracing::debug!(error = %e, "close frame not delivered");
                    }
                    break Ok("client shutdown".to_owned());
                }
                request = outbound.recv() => {
                    let Some(request) = request else {
                        break Ok("request channel closed".to_owned());
                    };
                    let text = match request.to_json() {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!(error = %e, request = request.name(), "could not encode request");
                            continue;
                        }
                    };
                    tracing::debug!(request = request.name(), "sending request");
                    if let Err(e) = write.send(tungstenite::Message::text(text)).await {
                        break Err(Error::WebSocketConnect(e.to_string()));
                    }
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            parse_and_broadcast(&text, &self.event_tx);
                        }
                        Some(Ok(tungstenite::Message::Ping(_))) => {
                            // tungstenite queues the pong; it goes out with the next write
                            tracing::trace!("feed ping");
                        }
                        Some(Ok(tungstenite::Message::Close(frame))) => {
                            let reason = match frame {
                                Some(cf) => {
                                    tracing::info!(code = %cf.code, reason = %cf.reason, "close frame received");
                                    format!("closed by server (code {})", u16::from(cf.code))
                                }
                                None => "closed by server".to_owned(),
                            };
                            break Ok(reason);
                        }
                        Some(Err(e)) => break Err(Error::WebSocketConnect(e.to_string())),
                        None => break Ok("stream ended".to_owned()),
                        Some(Ok(_)) => {
                            // Binary, Pong, Frame -- ignore
                        }
                    }
                }
            }
        };

        self.online_tx.send_replace(false);
        discard_pending(&mut outbound);

        let reason = match &result {
            Ok(reason) => reason.clone(),
            Err(e) => e.to_string(),
        };
        let _ = self.event_tx.send(Arc::new(FeedEvent::Closed { reason }));

        result.map(|_| ())
    }
}

/// Drop anything queued while no connection was up.
fn discard_pending(outbound: &mut mpsc::UnboundedReceiver<ClientRequest>) {
    let mut dropped = 0_usize;
    while outbound.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        tracing::warn!(dropped, "discarded requests queued while offline");
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Decode a text frame and broadcast it. Malformed frames are logged
/// and skipped.
fn parse_and_broadcast(text: &str, event_tx: &broadcast::Sender<Arc<FeedEvent>>) {
    match ServerMessage::from_json(text) {
        Ok(message) => {
            tracing::trace!(tag = message.tag(), "feed message");
            // No subscribers right now is not an error
            let _ = event_tx.send(Arc::new(FeedEvent::Message(message)));
        }
        Err(e) => {
            tracing::warn!(error = %e, "discarding feed message");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn default_reconnect_delay_is_five_seconds() {
        assert_eq!(ReconnectConfig::default().delay, Duration::from_secs(5));
    }

    #[test]
    fn rejects_non_websocket_scheme() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = rt.enter();

        let url = Url::parse("http://localhost:8000/simengine").unwrap();
        let result = FeedHandle::connect(url, ReconnectConfig::default(), CancellationToken::new());
        assert!(matches!(result, Err(Error::WebSocketConnect(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_once_per_interval() {
        let attempts = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let counter = Arc::clone(&attempts);
        let task = tokio::spawn(reconnect_loop(
            move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::WebSocketConnect("connection refused".into()))
                }
            },
            ReconnectConfig::default(),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 4);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn clean_close_also_waits_before_reconnect() {
        let attempts = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let counter = Arc::clone(&attempts);
        let task = tokio::spawn(reconnect_loop(
            move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            ReconnectConfig {
                delay: Duration::from_secs(2),
            },
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_lets_running_attempt_finish() {
        let attempts = Arc::new(AtomicU32::new(0));
        let finished = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let (counter, done, token) = (Arc::clone(&attempts), Arc::clone(&finished), cancel.clone());
        let task = tokio::spawn(reconnect_loop(
            move |_| {
                let (counter, done, token) = (Arc::clone(&counter), Arc::clone(&done), token.clone());
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    token.cancelled().await;
                    // Shutdown work after the token fires still runs.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            ReconnectConfig::default(),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(1)).await;
        cancel.cancel();
        tokio_test::assert_ok!(task.await);

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_delay_stops_loop() {
        let attempts = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let counter = Arc::clone(&attempts);
        let task = tokio::spawn(reconnect_loop(
            move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::WebSocketConnect("connection refused".into()))
                }
            },
            ReconnectConfig::default(),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        tokio_test::assert_ok!(task.await);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn parse_and_broadcast_decodes_message() {
        let (tx, mut rx) = broadcast::channel(16);

        parse_and_broadcast(
            r#"{"request":"mains_upd","payload":{"mains":1}}"#,
            &tx,
        );

        let event = rx.try_recv().unwrap();
        assert!(matches!(*event, FeedEvent::Message(ServerMessage::Mains(m)) if m.mains));
    }

    #[test]
    fn parse_and_broadcast_skips_unknown_and_malformed() {
        let (tx, mut rx) = broadcast::channel::<Arc<FeedEvent>>(16);

        parse_and_broadcast("not json at all", &tx);
        parse_and_broadcast(r#"{"request":"bogus","payload":{}}"#, &tx);

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_while_offline_is_rejected() {
        let cancel = CancellationToken::new();
        // Nothing listens on port 9; the loop just keeps failing.
        let url = Url::parse("ws://127.0.0.1:9/simengine").unwrap();
        let handle = FeedHandle::connect(url, ReconnectConfig::default(), cancel.clone()).unwrap();

        assert!(!handle.is_online());
        let err = handle.send(ClientRequest::Subscribe {}).unwrap_err();
        assert!(matches!(err, Error::Offline));

        handle.shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap();
    }
}

use thiserror::Error;

/// Top-level error type for the `powerdash-feed` crate.
///
/// Covers the websocket transport and the wire protocol. `powerdash-core`
/// maps these into domain errors; protocol errors are per-message and never
/// tear down the connection.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the peer.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// A request was issued while the feed is not connected.
    #[error("Feed is offline")]
    Offline,

    /// The outbound channel to the socket task is gone.
    #[error("Failed to hand request to the socket task")]
    SendFailed,

    // ── Protocol ────────────────────────────────────────────────────
    /// Envelope carried a `request` tag this client does not understand.
    #[error("Unknown request tag: {tag}")]
    UnknownRequest { tag: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Outbound request could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if this is a transient error the reconnect loop
    /// will recover from on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } | Self::Offline
        )
    }

    /// Returns `true` if this error concerns a single malformed or
    /// unexpected message rather than the connection.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::UnknownRequest { .. } | Self::Deserialization { .. }
        )
    }
}

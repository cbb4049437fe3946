// ── Core error types ──
//
// User-facing errors from powerdash-core. Consumers never see websocket
// or JSON errors directly; the `From<powerdash_feed::Error>` impl
// translates transport-layer errors into domain variants.

use thiserror::Error;

use crate::model::AssetKey;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to simulator at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Simulator feed is offline")]
    Offline,

    #[error("Controller disconnected")]
    ControllerDisconnected,

    #[error("Timed out after {timeout_secs}s waiting for the topology")]
    Timeout { timeout_secs: u64 },

    // ── Topology errors ──────────────────────────────────────────────
    #[error("Unknown asset: {key}")]
    UnknownAsset { key: AssetKey },

    #[error("Asset {key} references missing parent {parent}")]
    UnresolvedParent { key: AssetKey, parent: AssetKey },

    #[error("Asset {key} is a component and cannot be positioned")]
    NotTopLevel { key: AssetKey },

    // ── Protocol errors ──────────────────────────────────────────────
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Errors caused by a single bad message rather than by the caller.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. } | Self::UnresolvedParent { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<powerdash_feed::Error> for CoreError {
    fn from(err: powerdash_feed::Error) -> Self {
        match err {
            powerdash_feed::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            powerdash_feed::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason,
            },
            powerdash_feed::Error::WebSocketClosed { code, reason } => {
                CoreError::ConnectionFailed {
                    url: String::new(),
                    reason: format!("WebSocket closed (code {code}): {reason}"),
                }
            }
            powerdash_feed::Error::Offline => CoreError::Offline,
            powerdash_feed::Error::SendFailed => {
                CoreError::Internal("feed request channel closed".into())
            }
            powerdash_feed::Error::UnknownRequest { tag } => CoreError::Protocol {
                message: format!("unknown request tag '{tag}'"),
            },
            powerdash_feed::Error::Deserialization { message, body: _ } => {
                CoreError::Protocol { message }
            }
            powerdash_feed::Error::Serialization(e) => {
                CoreError::Internal(format!("Serialization error: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_maps_through() {
        let err = CoreError::from(powerdash_feed::Error::Offline);
        assert!(matches!(err, CoreError::Offline));
    }

    #[test]
    fn protocol_errors_are_flagged() {
        let err = CoreError::from(powerdash_feed::Error::UnknownRequest { tag: "x".into() });
        assert!(err.is_protocol());
        assert!(!CoreError::UnknownAsset { key: "1".into() }.is_protocol());
    }
}

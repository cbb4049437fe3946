// ── Feed abstraction ──
//
// The seam between the transport and the topology engine. The engine only
// ever talks to a `dyn TopologyFeed`; tests substitute an in-memory feed.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::error::Error;
use crate::protocol::ServerMessage;
use crate::request::ClientRequest;

/// Lifecycle and data events emitted by a feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Connection established; requests can be sent.
    Opened,
    /// Connection lost. The transport retries on its own.
    Closed { reason: String },
    /// A decoded inbound message.
    Message(ServerMessage),
}

/// A bidirectional message channel to the simulator.
pub trait TopologyFeed: Send + Sync {
    /// Whether requests can currently be delivered.
    fn is_online(&self) -> bool;

    /// Hand a request to the transport. Fails with [`Error::Offline`]
    /// when not connected; nothing is queued for later delivery.
    fn send(&self, request: ClientRequest) -> Result<(), Error>;

    /// New receiver for the event stream.
    fn subscribe(&self) -> broadcast::Receiver<Arc<FeedEvent>>;
}

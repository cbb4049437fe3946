// ── Snapshot streams ──
//
// Subscription type for consuming topology changes from the engine task.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::snapshot::TopologySnapshot;

/// A subscription to the published topology.
///
/// Gives point-in-time access plus change notification via
/// [`changed`](Self::changed) or by converting into a `Stream`.
pub struct SnapshotStream {
    current: Arc<TopologySnapshot>,
    receiver: watch::Receiver<Arc<TopologySnapshot>>,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<TopologySnapshot>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &Arc<TopologySnapshot> {
        &self.current
    }

    pub fn latest(&self) -> Arc<TopologySnapshot> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publish. `None` once the controller is dropped.
    pub async fn changed(&mut self) -> Option<Arc<TopologySnapshot>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    pub fn into_stream(self) -> SnapshotWatchStream {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding every published snapshot.
pub struct SnapshotWatchStream {
    inner: WatchStream<Arc<TopologySnapshot>>,
}

impl Stream for SnapshotWatchStream {
    type Item = Arc<TopologySnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

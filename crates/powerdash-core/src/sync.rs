// ── Feed synchronisation state ──

use serde::Serialize;

/// Where the engine is in the feed lifecycle.
///
/// `Disconnected → Connected → Synced`, back to `Disconnected` on every
/// close. There is no terminal state; the transport keeps retrying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display)]
#[serde(tag = "state", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncState {
    #[default]
    Disconnected,
    /// Online, waiting for the first topology snapshot.
    Connected,
    /// A snapshot has been applied. `empty` means the simulator has no
    /// topology configured.
    Synced { empty: bool },
}

impl SyncState {
    pub fn is_online(self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    pub fn is_synced(self) -> bool {
        matches!(self, Self::Synced { .. })
    }
}

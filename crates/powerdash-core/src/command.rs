// ── Command API ──
//
// Every operator action flows through a `Command`. The controller hands
// each one to the engine task and awaits the reply.

use powerdash_feed::ActionRange;

use crate::error::CoreError;
use crate::model::{AssetKey, StageLayout};
use crate::wiring::Connection;

/// A command plus the channel its result goes back on.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // ── Selection & layout ───────────────────────────────────────────
    /// Toggle selection of an asset.
    Select { key: AssetKey },
    ClearSelection,
    /// Drag a top-level asset to a new canvas position.
    MoveAsset { key: AssetKey, x: f64, y: f64 },
    SetStage(StageLayout),
    /// Persist the current layout on the simulator.
    SaveLayout,

    // ── Power ────────────────────────────────────────────────────────
    /// Flip an asset's status.
    TogglePower { key: AssetKey, hard: bool },
    SetPower { key: AssetKey, on: bool, hard: bool },
    SetMains { on: bool },

    // ── Scenarios & recorder ─────────────────────────────────────────
    ExecPlay { name: String },
    SetRecorder { enabled: bool },
    RequestRecorderStatus,
    RequestActions { range: ActionRange },
    ReplayActions { range: ActionRange },
    ClearActions { range: ActionRange },

    /// Ask the simulator to resend the full topology.
    RequestStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Ok,
    /// Outbound request outcome: `false` when the feed was offline and
    /// nothing was sent.
    Sent(bool),
    /// Selection after a toggle.
    Selection(Option<AssetKey>),
    /// Connections recomputed by a move.
    Moved(Vec<Connection>),
}

impl CommandResult {
    /// Whether an outbound request actually left the process.
    pub fn was_sent(&self) -> bool {
        matches!(self, Self::Sent(true))
    }
}

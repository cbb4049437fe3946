// ── Outbound requests ──
//
// Client → simulator messages. Serialized adjacently tagged as
// `{ "request": <name>, "payload": { ... } }`; requests without
// arguments still carry an empty `payload` object.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::protocol::StageLayout;
use crate::record::{de_key, ser_key};

/// A position entry in a `set_layout` request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutPosition {
    pub x: f64,
    pub y: f64,
}

/// Slice of the recorder's action history. `None` bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRange {
    pub start: Option<i64>,
    pub stop: Option<i64>,
}

impl ActionRange {
    /// The whole history.
    pub fn all() -> Self {
        Self::default()
    }
}

/// Every request the client can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(tag = "request", content = "payload", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClientRequest {
    // ── Asset commands ───────────────────────────────────────────────
    /// Power an asset up (`status: true`) or down. `hard` selects an
    /// immediate power-off instead of a graceful shutdown.
    SetPower {
        #[serde(serialize_with = "ser_key", deserialize_with = "de_key")]
        key: String,
        status: bool,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        hard: bool,
    },
    /// Full topology and environment, answered with one message per part.
    GetSysStatus {},

    // ── Misc ─────────────────────────────────────────────────────────
    SetLayout {
        stage: Option<StageLayout>,
        assets: IndexMap<String, LayoutPosition>,
    },
    SetMains {
        #[serde(
            serialize_with = "crate::record::ser_status",
            deserialize_with = "crate::record::de_status"
        )]
        mains: bool,
    },
    ExecPlay {
        name: String,
    },
    /// Register for pushed updates.
    Subscribe {},

    // ── Recorder ─────────────────────────────────────────────────────
    ReplayActions {
        range: ActionRange,
    },
    ClearActions {
        range: ActionRange,
    },
    GetActions {
        range: ActionRange,
    },
    SetRecorderStatus {
        enabled: bool,
    },
    GetRecorderStatus {},
}

impl ClientRequest {
    /// Request name as sent in the `request` field.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

//! Inbound wire protocol.
//!
//! Every frame the simulator pushes is a JSON envelope of the form
//! `{ "request": <tag>, "payload": { ... } }`. [`ServerMessage::from_json`]
//! decodes the envelope and dispatches on the tag, so consumers match on
//! typed variants and never inspect raw payload shapes.
//!
//! Both the current tag names (`sys_layout`, `asset_upd`, ...) and the
//! older ones (`topology`, `asset`, ...) are accepted.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::Error;
use crate::record::{AssetPatch, AssetRecord, de_key, de_status};

// ── Envelope ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    request: String,
    /// Older simulator builds used `data` instead of `payload`.
    #[serde(default, alias = "data")]
    payload: Value,
}

// ── Payloads ─────────────────────────────────────────────────────────

/// Canvas stage placement persisted alongside asset positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageLayout {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl Default for StageLayout {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: default_scale(),
        }
    }
}

fn default_scale() -> f64 {
    1.0
}

/// Full topology: every top-level asset with its components nested.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TopologyPayload {
    #[serde(default, deserialize_with = "de_assets")]
    pub assets: IndexMap<String, AssetRecord>,

    #[serde(default, rename = "stageLayout", deserialize_with = "de_stage")]
    pub stage_layout: Option<StageLayout>,
}

fn de_assets<'de, D>(deserializer: D) -> Result<IndexMap<String, AssetRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<IndexMap<String, AssetRecord>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The simulator sends `{}` or `null` when no stage layout was ever saved.
fn de_stage<'de, D>(deserializer: D) -> Result<Option<StageLayout>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Map<String, Value>>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(map) if map.is_empty() => Ok(None),
        Some(map) => serde_json::from_value(Value::Object(map))
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Partial update for one asset or component.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssetDelta {
    #[serde(deserialize_with = "de_key")]
    pub key: String,

    #[serde(flatten)]
    pub patch: AssetPatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AmbientPayload {
    pub ambient: f64,
    #[serde(default)]
    pub rising: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MainsPayload {
    #[serde(deserialize_with = "de_status")]
    pub mains: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlayListPayload {
    #[serde(default)]
    pub plays: Vec<String>,
}

/// Recorded user actions; kept opaque.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActionListPayload {
    #[serde(default)]
    pub actions: Vec<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderStatus {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub replaying: bool,
}

#[derive(Debug, Deserialize)]
struct RecorderStatusPayload {
    status: RecorderStatus,
}

// ── ServerMessage ────────────────────────────────────────────────────

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Full topology snapshot. Replaces all client state.
    SysLayout(TopologyPayload),
    /// Partial update for a single asset or component.
    AssetUpdate(AssetDelta),
    Ambient(AmbientPayload),
    Mains(MainsPayload),
    PlayList(PlayListPayload),
    ActionList(ActionListPayload),
    RecorderStatus(RecorderStatus),
}

impl ServerMessage {
    /// Decode one text frame.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        let envelope: RawEnvelope = decode(text, serde_json::from_str(text))?;
        let payload = envelope.payload;

        match envelope.request.as_str() {
            "sys_layout" | "topology" => Ok(Self::SysLayout(decode_payload(text, payload)?)),
            "asset_upd" | "asset" => Ok(Self::AssetUpdate(decode_payload(text, payload)?)),
            "ambient_upd" | "ambient" => Ok(Self::Ambient(decode_payload(text, payload)?)),
            "mains_upd" | "mains" => Ok(Self::Mains(decode_payload(text, payload)?)),
            "play_list" | "plays" => Ok(Self::PlayList(decode_payload(text, payload)?)),
            "action_list" => Ok(Self::ActionList(decode_payload(text, payload)?)),
            "recorder_status" => {
                let p: RecorderStatusPayload = decode_payload(text, payload)?;
                Ok(Self::RecorderStatus(p.status))
            }
            other => Err(Error::UnknownRequest {
                tag: other.to_owned(),
            }),
        }
    }

    /// Canonical tag name, for logging.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::SysLayout(_) => "sys_layout",
            Self::AssetUpdate(_) => "asset_upd",
            Self::Ambient(_) => "ambient_upd",
            Self::Mains(_) => "mains_upd",
            Self::PlayList(_) => "play_list",
            Self::ActionList(_) => "action_list",
            Self::RecorderStatus(_) => "recorder_status",
        }
    }
}

fn decode_payload<T: DeserializeOwned>(body: &str, payload: Value) -> Result<T, Error> {
    decode(body, serde_json::from_value(payload))
}

fn decode<T>(body: &str, result: Result<T, serde_json::Error>) -> Result<T, Error> {
    result.map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: body.to_owned(),
    })
}

// ── Tests ────────────────────────────────────────────────────────────

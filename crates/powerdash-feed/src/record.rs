// ── Wire asset records ──
//
// Raw asset shapes as the simulator serializes them. Keys arrive as JSON
// numbers or strings; `status` as 0/1 or a boolean; `parent` as `null`,
// a list of full asset objects, or a list of bare keys. Everything is
// normalized here so downstream code only sees one shape.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ── Key helpers ──────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum RawKey {
    Unsigned(u64),
    Signed(i64),
    Text(String),
}

impl From<RawKey> for String {
    fn from(raw: RawKey) -> Self {
        match raw {
            RawKey::Unsigned(n) => n.to_string(),
            RawKey::Signed(n) => n.to_string(),
            RawKey::Text(s) => s,
        }
    }
}

/// Deserialize an asset key from either a JSON number or string.
pub fn de_key<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawKey::deserialize(deserializer).map(String::from)
}

/// Serialize a key as a JSON number when it is purely numeric.
///
/// The simulator indexes its state managers by integer key.
pub fn ser_key<S>(key: &str, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match key.parse::<u64>() {
        Ok(n) => serializer.serialize_u64(n),
        Err(_) => serializer.serialize_str(key),
    }
}

// ── Status helpers ───────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStatus {
    Flag(bool),
    Int(i64),
    Float(f64),
}

impl From<RawStatus> for bool {
    fn from(raw: RawStatus) -> Self {
        match raw {
            RawStatus::Flag(b) => b,
            RawStatus::Int(n) => n != 0,
            RawStatus::Float(f) => f.abs() > f64::EPSILON,
        }
    }
}

pub(crate) fn de_status<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    RawStatus::deserialize(deserializer).map(bool::from)
}

fn de_opt_status<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawStatus>::deserialize(deserializer).map(|s| s.map(bool::from))
}

/// `status` goes back out as 0/1, matching what the simulator emits.
#[allow(clippy::trivially_copy_pass_by_ref)]
pub(crate) fn ser_status<S>(status: &bool, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u8(u8::from(*status))
}

// ── ParentRef ────────────────────────────────────────────────────────

/// Reference to an upstream feed.
///
/// The simulator sends the full parent asset; only its key matters here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentRef {
    #[serde(serialize_with = "ser_key")]
    pub key: String,
}

impl<'de> Deserialize<'de> for ParentRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Keyed {
            #[serde(deserialize_with = "de_key")]
            key: String,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Keyed(Keyed),
            Bare(RawKey),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Keyed(k) => Self { key: k.key },
            Raw::Bare(k) => Self { key: k.into() },
        })
    }
}

fn de_parents<'de, D>(deserializer: D) -> Result<Vec<ParentRef>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ParentRef>>::deserialize(deserializer)?.unwrap_or_default())
}

fn de_opt_parents<'de, D>(deserializer: D) -> Result<Option<Vec<ParentRef>>, D::Error>
where
    D: Deserializer<'de>,
{
    // Present-but-null means "no parents", not "field absent".
    Ok(Some(
        Option::<Vec<ParentRef>>::deserialize(deserializer)?.unwrap_or_default(),
    ))
}

// ── AssetRecord ──────────────────────────────────────────────────────

/// A full asset as it appears in a topology snapshot.
///
/// Uses `#[serde(flatten)]` to capture all fields beyond the core set,
/// so nothing the simulator sends is silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    #[serde(deserialize_with = "de_key", serialize_with = "ser_key")]
    pub key: String,

    /// Asset type tag: `pdu`, `ups`, `outlet`, `server`, ...
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(
        default,
        deserialize_with = "de_status",
        serialize_with = "ser_status"
    )]
    pub status: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "de_parents")]
    pub parent: Vec<ParentRef>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub children: IndexMap<String, AssetRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── AssetPatch ───────────────────────────────────────────────────────

/// Partial attributes carried by an `asset_upd` message.
///
/// Every field is optional; only fields present on the wire are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetPatch {
    #[serde(
        default,
        rename = "type",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,

    #[serde(
        default,
        deserialize_with = "de_opt_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        default,
        deserialize_with = "de_opt_parents",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent: Option<Vec<ParentRef>>,

    /// Nested partial updates, merged into existing children by key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<IndexMap<String, AssetPatch>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AssetPatch {
    /// `true` when the patch carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.status.is_none()
            && self.load.is_none()
            && self.battery.is_none()
            && self.name.is_none()
            && self.parent.is_none()
            && self.children.is_none()
            && self.x.is_none()
            && self.y.is_none()
            && self.extra.is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

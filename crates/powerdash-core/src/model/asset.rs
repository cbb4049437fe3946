// ── Asset domain types ──

use std::ops::Add;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::key::AssetKey;

/// Hardware category of an asset or component.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AssetKind {
    Outlet,
    StaticAsset,
    Pdu,
    Server,
    ServerWithBmc,
    Ups,
    Lamp,
}

impl AssetKind {
    /// Kinds whose children are output sockets (PDU and UPS outlets).
    pub fn has_outlets(self) -> bool {
        matches!(self, Self::Pdu | Self::Ups)
    }

    /// Kinds whose children are power supplies fed from outside.
    pub fn is_server(self) -> bool {
        matches!(self, Self::Server | Self::ServerWithBmc)
    }
}

/// Canvas coordinate. Used both for asset positions and port offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// One hardware unit in the power topology.
///
/// Top-level assets own their components through `children`; a component
/// never appears anywhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub key: AssetKey,
    pub kind: AssetKind,

    /// Own on/off state as reported by the simulator.
    pub status: bool,

    pub load: Option<f64>,
    pub battery: Option<f64>,
    pub name: Option<String>,

    /// Upstream feeds, in order. More than one means redundant supply.
    pub parent: Vec<AssetKey>,

    /// Nested components, in slot order.
    pub children: IndexMap<AssetKey, Asset>,

    /// Canvas position (top-level assets only).
    pub position: Option<Point>,

    /// Simulator fields not modelled above.
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub extra: Map<String, Value>,
}

impl Asset {
    /// A bare asset with no feeds, components or position.
    pub fn new(key: impl Into<AssetKey>, kind: AssetKind) -> Self {
        Self {
            key: key.into(),
            kind,
            status: false,
            load: None,
            battery: None,
            name: None,
            parent: Vec::new(),
            children: IndexMap::new(),
            position: None,
            extra: Map::new(),
        }
    }

    pub fn with_status(mut self, status: bool) -> Self {
        self.status = status;
        self
    }

    pub fn with_parents<I, K>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<AssetKey>,
    {
        self.parent = parents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_child(mut self, child: Asset) -> Self {
        self.children.insert(child.key.clone(), child);
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Point::new(x, y));
        self
    }

    /// Display label: the name if set, otherwise the kind.
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.kind.to_string())
    }
}

// ── Port-offset table ──
//
// Where each kind of asset has its sockets, relative to the asset's
// position. Defaults reproduce the dashboard geometry; any kind can be
// overridden from configuration.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::model::{Asset, AssetKey, AssetKind, Point};

fn index_f64(i: usize) -> f64 {
    f64::from(u32::try_from(i).unwrap_or(u32::MAX))
}

/// A run of equally spaced sockets, wrapping after `per_row`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotPattern {
    pub start: Point,
    pub step_x: f64,
    /// Sockets per row; `0` keeps everything on one row.
    #[serde(default)]
    pub per_row: usize,
    #[serde(default)]
    pub step_y: f64,
}

impl SlotPattern {
    pub fn slot(&self, index: usize) -> Point {
        let (col, row) = match self.per_row {
            0 => (index, 0),
            n => (index % n, index / n),
        };
        Point::new(
            self.start.x + index_f64(col) * self.step_x,
            self.start.y + index_f64(row) * self.step_y,
        )
    }
}

/// Socket geometry for one asset kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindPorts {
    /// Fixed input sockets, one per parent slot. Extra parents share the
    /// last entry.
    #[serde(default)]
    pub inputs: Vec<Point>,

    /// Inputs laid out as a pattern instead (server PSUs).
    #[serde(default)]
    pub input_slots: Option<SlotPattern>,

    /// Outlet grid for components (PDU and UPS outlets).
    #[serde(default)]
    pub output_slots: Option<SlotPattern>,

    /// Socket used when the asset itself feeds something.
    #[serde(default)]
    pub output: Option<Point>,
}

impl KindPorts {
    fn input(&self, index: usize) -> Point {
        if let Some(pattern) = &self.input_slots {
            return pattern.slot(index);
        }
        self.inputs
            .get(index)
            .or_else(|| self.inputs.last())
            .copied()
            .unwrap_or(Point::ORIGIN)
    }

    fn child(&self, index: usize) -> Point {
        self.output_slots
            .as_ref()
            .or(self.input_slots.as_ref())
            .map_or(Point::ORIGIN, |p| p.slot(index))
    }
}

/// Resolved socket offsets for one concrete asset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortOffsets {
    /// One entry per parent, in parent order.
    pub inputs: Vec<Point>,
    /// Socket of each component, keyed by component.
    pub children: IndexMap<AssetKey, Point>,
    /// Socket used when the asset itself is a feed.
    pub output: Point,
}

impl PortOffsets {
    pub fn input(&self, port: usize) -> Point {
        self.inputs
            .get(port)
            .or_else(|| self.inputs.last())
            .copied()
            .unwrap_or(Point::ORIGIN)
    }

    pub fn child(&self, key: &AssetKey) -> Point {
        self.children.get(key).copied().unwrap_or(Point::ORIGIN)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortTable {
    kinds: HashMap<AssetKind, KindPorts>,
}

impl Default for PortTable {
    fn default() -> Self {
        let socket_centre = Point::new(35.0, 35.0);
        let mut kinds = HashMap::new();

        kinds.insert(
            AssetKind::Outlet,
            KindPorts {
                inputs: vec![socket_centre],
                output: Some(socket_centre),
                ..KindPorts::default()
            },
        );
        kinds.insert(
            AssetKind::StaticAsset,
            KindPorts {
                inputs: vec![socket_centre],
                output: Some(socket_centre),
                ..KindPorts::default()
            },
        );
        kinds.insert(
            AssetKind::Pdu,
            KindPorts {
                inputs: vec![Point::new(25.0, 20.0)],
                output_slots: Some(SlotPattern {
                    start: Point::new(135.0, 35.0),
                    step_x: 80.0,
                    per_row: 0,
                    step_y: 0.0,
                }),
                ..KindPorts::default()
            },
        );
        kinds.insert(
            AssetKind::Ups,
            KindPorts {
                inputs: vec![Point::new(279.0, 25.0)],
                output_slots: Some(SlotPattern {
                    start: Point::new(275.0, 170.0),
                    step_x: 100.0,
                    per_row: 4,
                    step_y: 100.0,
                }),
                ..KindPorts::default()
            },
        );
        let psus = KindPorts {
            input_slots: Some(SlotPattern {
                start: Point::new(120.0, 30.0),
                step_x: 140.0,
                per_row: 0,
                step_y: 0.0,
            }),
            ..KindPorts::default()
        };
        kinds.insert(AssetKind::Server, psus.clone());
        kinds.insert(AssetKind::ServerWithBmc, psus);
        kinds.insert(
            AssetKind::Lamp,
            KindPorts {
                inputs: vec![Point::new(56.0, 182.0)],
                ..KindPorts::default()
            },
        );

        Self { kinds }
    }
}

impl PortTable {
    /// A table with no sockets at all; every offset is the origin.
    pub fn empty() -> Self {
        Self {
            kinds: AssetKind::iter().map(|k| (k, KindPorts::default())).collect(),
        }
    }

    pub fn get(&self, kind: AssetKind) -> Option<&KindPorts> {
        self.kinds.get(&kind)
    }

    /// Replace the geometry for one kind.
    pub fn set(&mut self, kind: AssetKind, ports: KindPorts) {
        self.kinds.insert(kind, ports);
    }

    /// Resolve socket offsets for `asset`.
    pub fn offsets_for(&self, asset: &Asset) -> PortOffsets {
        let Some(ports) = self.kinds.get(&asset.kind) else {
            return PortOffsets::default();
        };

        PortOffsets {
            inputs: (0..asset.parent.len()).map(|i| ports.input(i)).collect(),
            children: asset
                .children
                .keys()
                .enumerate()
                .map(|(i, key)| (key.clone(), ports.child(i)))
                .collect(),
            output: ports.output.unwrap_or(Point::ORIGIN),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

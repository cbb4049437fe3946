// ── Immutable topology snapshot ──
//
// What the engine publishes after every change. Consumers on other tasks
// only ever see these values, never the live graph.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::graph::resolve_in;
use crate::model::{Asset, AssetKey, Environment, StageLayout};
use crate::sync::SyncState;
use crate::wiring::Connection;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologySnapshot {
    pub sync: SyncState,
    /// Top-level assets with their components, in snapshot order.
    pub assets: IndexMap<AssetKey, Asset>,
    /// Derived power flag for every asset and component.
    pub powered: IndexMap<AssetKey, bool>,
    pub connections: Vec<Connection>,
    pub stage: Option<StageLayout>,
    pub selected: Option<AssetKey>,
    pub environment: Environment,
    /// Graph generation the snapshot was taken from.
    pub generation: u64,
    pub taken_at: DateTime<Utc>,
}

impl Default for TopologySnapshot {
    fn default() -> Self {
        Self {
            sync: SyncState::Disconnected,
            assets: IndexMap::new(),
            powered: IndexMap::new(),
            connections: Vec::new(),
            stage: None,
            selected: None,
            environment: Environment::default(),
            generation: 0,
            taken_at: Utc::now(),
        }
    }
}

impl TopologySnapshot {
    /// Same two-step lookup as the live graph.
    pub fn get(&self, key: &AssetKey) -> Option<&Asset> {
        resolve_in(&self.assets, key)
    }

    pub fn is_powered(&self, key: &AssetKey) -> Option<bool> {
        self.powered.get(key).copied()
    }

    pub fn selected_asset(&self) -> Option<&Asset> {
        self.get(self.selected.as_ref()?)
    }

    pub fn component_count(&self) -> usize {
        self.assets.values().map(|a| a.children.len()).sum()
    }

    /// Copy of this snapshot with a different sync state.
    pub fn with_sync(&self, sync: SyncState) -> Self {
        Self {
            sync,
            taken_at: Utc::now(),
            ..self.clone()
        }
    }
}

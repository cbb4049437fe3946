//! Normalized two-level asset store.
//!
//! [`AssetGraph`] owns every asset record. Top-level assets live in one
//! ordered map; components live in their owner's `children` map and are
//! found by stripping the last character of their key. There is exactly
//! one resolution path, so lookups never search.

use indexmap::IndexMap;
use tracing::{debug, warn};

use powerdash_feed::AssetPatch;

use crate::convert::{MergeOutcome, merge_patch};
use crate::error::CoreError;
use crate::model::{Asset, AssetKey, Point, StageLayout};

/// Where a key lives in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    TopLevel,
    Component { owner: AssetKey },
}

/// The layout persisted with `set_layout`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutSnapshot {
    pub stage: Option<StageLayout>,
    pub assets: IndexMap<AssetKey, Point>,
}

#[derive(Debug, Clone, Default)]
pub struct AssetGraph {
    assets: IndexMap<AssetKey, Asset>,
    stage: Option<StageLayout>,
    generation: u64,
}

impl AssetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Snapshot & delta ─────────────────────────────────────────────

    /// Replace the whole graph. An empty `assets` is valid.
    ///
    /// Bumps [`generation`](Self::generation); anything derived from the
    /// previous graph must be rebuilt.
    pub fn load_snapshot(&mut self, assets: Vec<Asset>, stage: Option<StageLayout>) {
        self.assets = assets
            .into_iter()
            .map(|asset| (asset.key.clone(), asset))
            .collect();
        self.stage = stage;
        self.generation += 1;
        debug!(
            assets = self.assets.len(),
            components = self.component_count(),
            generation = self.generation,
            "topology snapshot loaded"
        );
    }

    /// Shallow-merge `patch` into the asset or component at `key`.
    ///
    /// Unknown keys leave the graph untouched. Positions in a component
    /// delta are ignored.
    pub fn apply_delta(
        &mut self,
        key: &AssetKey,
        patch: AssetPatch,
    ) -> Result<MergeOutcome, CoreError> {
        let top_level = self.is_top_level(key);
        let asset = self
            .resolve_mut(key)
            .ok_or_else(|| CoreError::UnknownAsset { key: key.clone() })?;
        let outcome = merge_patch(asset, patch, top_level)?;
        for ignored in &outcome.ignored_children {
            warn!(key = %key, child = %ignored, "delta for unknown component ignored");
        }
        Ok(outcome)
    }

    // ── Lookup ───────────────────────────────────────────────────────

    pub fn locate(&self, key: &AssetKey) -> Option<Location> {
        if self.assets.contains_key(key) {
            return Some(Location::TopLevel);
        }
        let owner = key.owner()?;
        self.assets
            .get(&owner)?
            .children
            .contains_key(key)
            .then_some(Location::Component { owner })
    }

    pub fn resolve(&self, key: &AssetKey) -> Option<&Asset> {
        resolve_in(&self.assets, key)
    }

    fn resolve_mut(&mut self, key: &AssetKey) -> Option<&mut Asset> {
        if self.assets.contains_key(key) {
            return self.assets.get_mut(key);
        }
        let owner = key.owner()?;
        self.assets.get_mut(&owner)?.children.get_mut(key)
    }

    pub fn top_level_asset(&self, key: &AssetKey) -> Option<&Asset> {
        self.assets.get(key)
    }

    pub fn is_top_level(&self, key: &AssetKey) -> bool {
        self.assets.contains_key(key)
    }

    /// Owning top-level asset of a component.
    pub fn owner_of(&self, key: &AssetKey) -> Option<&Asset> {
        match self.locate(key)? {
            Location::TopLevel => None,
            Location::Component { owner } => self.assets.get(&owner),
        }
    }

    // ── Positions ────────────────────────────────────────────────────

    /// Move a top-level asset. Components have no position of their own.
    pub fn set_position(&mut self, key: &AssetKey, x: f64, y: f64) -> Result<(), CoreError> {
        if let Some(asset) = self.assets.get_mut(key) {
            asset.position = Some(Point::new(x, y));
            return Ok(());
        }
        match self.locate(key) {
            Some(Location::Component { .. }) => Err(CoreError::NotTopLevel { key: key.clone() }),
            _ => Err(CoreError::UnknownAsset { key: key.clone() }),
        }
    }

    pub fn set_stage(&mut self, stage: StageLayout) {
        self.stage = Some(stage);
    }

    /// Positions of every placed top-level asset, plus the stage.
    pub fn layout(&self) -> LayoutSnapshot {
        LayoutSnapshot {
            stage: self.stage,
            assets: self
                .assets
                .values()
                .filter_map(|a| a.position.map(|p| (a.key.clone(), p)))
                .collect(),
        }
    }

    // ── Validation ───────────────────────────────────────────────────

    /// Every `(asset, parent)` pair whose parent does not resolve.
    pub fn unresolved_parents(&self) -> Vec<(AssetKey, AssetKey)> {
        self.iter_all()
            .flat_map(|asset| {
                asset
                    .parent
                    .iter()
                    .filter(|p| self.resolve(p).is_none())
                    .map(|p| (asset.key.clone(), p.clone()))
            })
            .collect()
    }

    // ── Iteration ────────────────────────────────────────────────────

    pub fn top_level(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    /// Every asset and component, each owner followed by its children.
    pub fn iter_all(&self) -> impl Iterator<Item = &Asset> {
        self.assets
            .values()
            .flat_map(|a| std::iter::once(a).chain(a.children.values()))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn component_count(&self) -> usize {
        self.assets.values().map(|a| a.children.len()).sum()
    }

    pub fn stage(&self) -> Option<StageLayout> {
        self.stage
    }

    /// Incremented by every snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Top-level lookup first, then the owner's `children`.
///
/// Shared by the live graph and published snapshots.
pub(crate) fn resolve_in<'a>(
    assets: &'a IndexMap<AssetKey, Asset>,
    key: &AssetKey,
) -> Option<&'a Asset> {
    if let Some(asset) = assets.get(key) {
        return Some(asset);
    }
    assets.get(&key.owner()?)?.children.get(key)
}

// ── Tests ────────────────────────────────────────────────────────────

// ── Power derivation ──
//
// `powered` is derived, never stored: an asset is powered when at least
// one of its upstream feeds is switched on. It is independent of the
// asset's own `status`; a PDU can be powered and switched off.

use indexmap::IndexMap;
use tracing::warn;

use crate::error::CoreError;
use crate::graph::AssetGraph;
use crate::model::{Asset, AssetKey};

/// Whether `asset` currently receives power.
///
/// - With feeds: `true` iff any parent resolves with `status` on. A parent
///   that does not resolve is a protocol error.
/// - Component without feeds: follows its owner's `status` (an outlet is
///   live iff its PDU is switched on).
/// - Root asset: always powered.
pub fn is_powered(graph: &AssetGraph, asset: &Asset) -> Result<bool, CoreError> {
    if !asset.parent.is_empty() {
        let mut any_on = false;
        for parent in &asset.parent {
            let feed = graph
                .resolve(parent)
                .ok_or_else(|| CoreError::UnresolvedParent {
                    key: asset.key.clone(),
                    parent: parent.clone(),
                })?;
            any_on |= feed.status;
        }
        return Ok(any_on);
    }

    if graph.is_top_level(&asset.key) {
        return Ok(true);
    }

    Ok(graph.owner_of(&asset.key).is_none_or(|owner| owner.status))
}

/// Powered flag for every asset and component.
///
/// Protocol errors are logged and reported as unpowered.
pub fn powered_map(graph: &AssetGraph) -> IndexMap<AssetKey, bool> {
    graph
        .iter_all()
        .map(|asset| {
            let powered = is_powered(graph, asset).unwrap_or_else(|e| {
                warn!(key = %asset.key, error = %e, "cannot derive power state");
                false
            });
            (asset.key.clone(), powered)
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────

// ── Wire → domain conversion ──
//
// Turns `powerdash-feed` records into domain `Asset`s and applies
// partial patches with shallow-merge semantics: only fields present in a
// patch are written, and `children` patches merge into existing entries.

use indexmap::IndexMap;
use tracing::{debug, warn};

use powerdash_feed::{AssetPatch, AssetRecord, TopologyPayload};

use crate::error::CoreError;
use crate::model::{Asset, AssetKey, AssetKind, Point, StageLayout};

// ── Records ──────────────────────────────────────────────────────────

fn parse_kind(key: &str, raw: &str) -> Result<AssetKind, CoreError> {
    raw.parse().map_err(|_| CoreError::Protocol {
        message: format!("asset {key} has unknown type '{raw}'"),
    })
}

fn position_of(x: Option<f64>, y: Option<f64>) -> Option<Point> {
    match (x, y) {
        (Some(x), Some(y)) => Some(Point::new(x, y)),
        _ => None,
    }
}

impl TryFrom<AssetRecord> for Asset {
    type Error = CoreError;

    /// Convert one record. Components with an unknown type are dropped
    /// with a warning; an unknown type on the record itself is an error.
    fn try_from(record: AssetRecord) -> Result<Self, Self::Error> {
        let kind = parse_kind(&record.key, &record.kind)?;

        let mut children = IndexMap::with_capacity(record.children.len());
        for (_, child) in record.children {
            let child_key = child.key.clone();
            match Asset::try_from(child) {
                Ok(mut child) => {
                    if child.position.take().is_some() {
                        debug!(key = %child.key, "position ignored for component");
                    }
                    children.insert(child.key.clone(), child);
                }
                Err(e) => warn!(owner = %record.key, key = %child_key, error = %e, "dropping component"),
            }
        }

        Ok(Self {
            key: AssetKey::from(record.key),
            kind,
            status: record.status,
            load: record.load,
            battery: record.battery,
            name: record.name,
            parent: record.parent.into_iter().map(|p| AssetKey::from(p.key)).collect(),
            children,
            position: position_of(record.x, record.y),
            extra: record.extra,
        })
    }
}

/// A decoded snapshot ready for [`AssetGraph::load_snapshot`](crate::graph::AssetGraph::load_snapshot).
#[derive(Debug, Default)]
pub struct Topology {
    pub assets: Vec<Asset>,
    pub stage: Option<StageLayout>,
    /// Records rejected during conversion.
    pub rejected: usize,
}

impl From<TopologyPayload> for Topology {
    fn from(payload: TopologyPayload) -> Self {
        let mut topology = Topology {
            assets: Vec::with_capacity(payload.assets.len()),
            stage: payload.stage_layout,
            rejected: 0,
        };

        for (_, record) in payload.assets {
            let key = record.key.clone();
            match Asset::try_from(record) {
                Ok(asset) => topology.assets.push(asset),
                Err(e) => {
                    warn!(key = %key, error = %e, "rejecting asset from snapshot");
                    topology.rejected += 1;
                }
            }
        }

        topology
    }
}

// ── Patches ──────────────────────────────────────────────────────────

/// What a merged patch changed, beyond plain attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Keys (the asset or its components) whose parent list was replaced.
    pub relinked: Vec<AssetKey>,
    /// The asset's own position changed.
    pub moved: bool,
    /// Child keys in the patch that matched no existing component.
    pub ignored_children: Vec<AssetKey>,
}

/// Reject a patch before touching anything if any `type` it carries is
/// unknown, so a bad delta never leaves an asset half-merged.
fn validate(key: &str, patch: &AssetPatch) -> Result<(), CoreError> {
    if let Some(raw) = &patch.kind {
        parse_kind(key, raw)?;
    }
    if let Some(children) = &patch.children {
        for (child_key, child) in children {
            validate(child_key, child)?;
        }
    }
    Ok(())
}

/// Shallow-merge `patch` into `asset`.
///
/// `top_level` says where `asset` lives in the graph; components have no
/// position, so `x`/`y` in a component patch are ignored.
pub fn merge_patch(
    asset: &mut Asset,
    patch: AssetPatch,
    top_level: bool,
) -> Result<MergeOutcome, CoreError> {
    validate(asset.key.as_str(), &patch)?;
    let mut outcome = MergeOutcome::default();
    apply(asset, patch, &mut outcome, top_level);
    Ok(outcome)
}

fn apply(asset: &mut Asset, patch: AssetPatch, outcome: &mut MergeOutcome, top_level: bool) {
    if let Some(raw) = patch.kind {
        // validated above
        if let Ok(kind) = raw.parse() {
            asset.kind = kind;
        }
    }
    if let Some(status) = patch.status {
        asset.status = status;
    }
    if patch.load.is_some() {
        asset.load = patch.load;
    }
    if patch.battery.is_some() {
        asset.battery = patch.battery;
    }
    if patch.name.is_some() {
        asset.name = patch.name;
    }
    if let Some(parents) = patch.parent {
        asset.parent = parents.into_iter().map(|p| AssetKey::from(p.key)).collect();
        outcome.relinked.push(asset.key.clone());
    }
    let repositions = patch.x.is_some() || patch.y.is_some();
    if repositions && !top_level {
        debug!(key = %asset.key, "position ignored for component");
    } else if repositions {
        let current = asset.position.unwrap_or_default();
        asset.position = Some(Point::new(
            patch.x.unwrap_or(current.x),
            patch.y.unwrap_or(current.y),
        ));
        outcome.moved = true;
    }
    if let Some(children) = patch.children {
        for (child_key, child_patch) in children {
            let child_key = AssetKey::from(child_key);
            match asset.children.get_mut(&child_key) {
                Some(child) => apply(child, child_patch, outcome, false),
                None => outcome.ignored_children.push(child_key),
            }
        }
    }
    for (field, value) in patch.extra {
        asset.extra.insert(field, value);
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: serde_json::Value) -> AssetRecord {
        serde_json::from_value(value).unwrap()
    }

    fn patch(value: serde_json::Value) -> AssetPatch {
        serde_json::from_value(value).unwrap()
    }

    fn pdu() -> Asset {
        Asset::try_from(record(json!({
            "key": 1111,
            "type": "pdu",
            "status": 1,
            "parent": [{ "key": 8 }],
            "x": 10, "y": 20,
            "children": {
                "11111": { "key": 11111, "type": "outlet", "status": 0 },
                "11112": { "key": 11112, "type": "outlet", "status": 0 }
            }
        })))
        .unwrap()
    }

    #[test]
    fn record_converts_with_children_and_position() {
        let asset = pdu();
        assert_eq!(asset.kind, AssetKind::Pdu);
        assert_eq!(asset.parent, vec![AssetKey::from("8")]);
        assert_eq!(asset.children.len(), 2);
        assert_eq!(asset.position, Some(Point::new(10.0, 20.0)));
    }

    #[test]
    fn unknown_child_kind_is_dropped() {
        let asset = Asset::try_from(record(json!({
            "key": 5, "type": "ups",
            "children": {
                "51": { "key": 51, "type": "outlet" },
                "52": { "key": 52, "type": "hovercraft" }
            }
        })))
        .unwrap();
        assert_eq!(asset.children.len(), 1);
    }

    #[test]
    fn unknown_kind_rejects_record() {
        let err = Asset::try_from(record(json!({ "key": 5, "type": "hovercraft" }))).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn topology_counts_rejects() {
        let payload: TopologyPayload = serde_json::from_value(json!({
            "assets": {
                "1": { "key": 1, "type": "outlet" },
                "2": { "key": 2, "type": "spaceship" }
            }
        }))
        .unwrap();
        let topology = Topology::from(payload);
        assert_eq!(topology.assets.len(), 1);
        assert_eq!(topology.rejected, 1);
    }

    #[test]
    fn status_patch_leaves_structure_alone() {
        let mut asset = pdu();
        let before = asset.clone();

        let outcome = merge_patch(&mut asset, patch(json!({ "status": 0 })), true).unwrap();

        assert!(!asset.status);
        assert_eq!(asset.children, before.children);
        assert_eq!(asset.parent, before.parent);
        assert_eq!(asset.position, before.position);
        assert_eq!(outcome, MergeOutcome::default());
    }

    #[test]
    fn children_patch_merges_by_key() {
        let mut asset = pdu();
        let outcome = merge_patch(
            &mut asset,
            patch(json!({ "children": {
                "11112": { "status": 1, "load": 0.5 },
                "11119": { "status": 1 }
            }})),
            true,
        )
        .unwrap();

        let child = &asset.children[&AssetKey::from("11112")];
        assert!(child.status);
        assert_eq!(child.load, Some(0.5));
        assert_eq!(asset.children.len(), 2);
        assert_eq!(outcome.ignored_children, vec![AssetKey::from("11119")]);
    }

    #[test]
    fn parent_patch_reports_relink() {
        let mut asset = pdu();
        let outcome = merge_patch(
            &mut asset,
            patch(json!({ "parent": [{ "key": 9 }, { "key": 10 }] })),
            true,
        )
        .unwrap();
        assert_eq!(asset.parent, vec![AssetKey::from("9"), AssetKey::from("10")]);
        assert_eq!(outcome.relinked, vec![AssetKey::from("1111")]);
    }

    #[test]
    fn partial_position_keeps_other_axis() {
        let mut asset = pdu();
        let outcome = merge_patch(&mut asset, patch(json!({ "x": 99 })), true).unwrap();
        assert!(outcome.moved);
        assert_eq!(asset.position, Some(Point::new(99.0, 20.0)));
    }

    #[test]
    fn component_patch_never_positions() {
        let mut outlet = pdu().children[&AssetKey::from("11111")].clone();
        let outcome =
            merge_patch(&mut outlet, patch(json!({ "x": 5, "y": 6, "status": 1 })), false).unwrap();
        assert!(outlet.status);
        assert_eq!(outlet.position, None);
        assert!(!outcome.moved);

        let mut asset = pdu();
        let outcome = merge_patch(
            &mut asset,
            patch(json!({ "children": { "11112": { "x": 1, "y": 2 } } })),
            true,
        )
        .unwrap();
        assert_eq!(asset.children[&AssetKey::from("11112")].position, None);
        assert!(!outcome.moved);
    }

    #[test]
    fn component_record_position_is_dropped() {
        let asset = Asset::try_from(record(json!({
            "key": 5, "type": "ups", "x": 1, "y": 2,
            "children": { "51": { "key": 51, "type": "outlet", "x": 3, "y": 4 } }
        })))
        .unwrap();
        assert_eq!(asset.position, Some(Point::new(1.0, 2.0)));
        assert_eq!(asset.children[&AssetKey::from("51")].position, None);
    }

    #[test]
    fn bad_type_rejects_whole_patch() {
        let mut asset = pdu();
        let before = asset.clone();
        let err = merge_patch(
            &mut asset,
            patch(json!({ "status": 0, "children": { "11111": { "type": "zeppelin" } } })),
            true,
        )
        .unwrap_err();
        assert!(err.is_protocol());
        assert_eq!(asset, before);
    }

    #[test]
    fn extra_fields_merge() {
        let mut asset = pdu();
        merge_patch(&mut asset, patch(json!({ "temperature": 31 })), true).unwrap();
        assert_eq!(asset.extra["temperature"], json!(31));
    }
}

//! Asset inspection handlers.

use serde::Serialize;
use tabled::Tabled;

use powerdash_core::{Asset, AssetKey, AssetKind, Controller, Point, TopologySnapshot};

use crate::cli::{AssetArgs, AssetCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Views ───────────────────────────────────────────────────────────

/// Flat view of one asset; components are referenced by key only.
#[derive(Debug, Serialize)]
struct AssetView<'a> {
    key: &'a AssetKey,
    kind: AssetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    status: bool,
    powered: bool,
    parent: &'a [AssetKey],
    children: Vec<&'a AssetKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<Point>,
    #[serde(skip_serializing_if = "Option::is_none")]
    load: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    battery: Option<f64>,
}

impl<'a> AssetView<'a> {
    fn new(asset: &'a Asset, snap: &TopologySnapshot) -> Self {
        Self {
            key: &asset.key,
            kind: asset.kind,
            name: asset.name.as_deref(),
            status: asset.status,
            powered: snap.is_powered(&asset.key).unwrap_or(false),
            parent: &asset.parent,
            children: asset.children.keys().collect(),
            position: asset.position,
            load: asset.load,
            battery: asset.battery,
        }
    }
}

#[derive(Tabled)]
struct AssetRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Powered")]
    powered: String,
    #[tabled(rename = "Fed by")]
    parent: String,
    #[tabled(rename = "Parts")]
    children: String,
}

impl AssetRow {
    fn new(view: &AssetView<'_>, color: bool) -> Self {
        Self {
            key: view.key.to_string(),
            kind: view.kind.to_string(),
            name: view.name.unwrap_or("").to_owned(),
            status: output::on_off(view.status, color),
            powered: output::on_off(view.powered, color),
            parent: join_keys(view.parent.iter()),
            children: if view.children.is_empty() {
                String::new()
            } else {
                view.children.len().to_string()
            },
        }
    }
}

fn join_keys<'a>(keys: impl Iterator<Item = &'a AssetKey>) -> String {
    keys.map(AssetKey::as_str).collect::<Vec<_>>().join(", ")
}

fn detail(view: &AssetView<'_>, snap: &TopologySnapshot, color: bool) -> String {
    let mut lines = vec![
        format!("Key:      {}", view.key),
        format!("Kind:     {}", view.kind),
        format!("Name:     {}", view.name.unwrap_or("-")),
        format!("Status:   {}", output::on_off(view.status, color)),
        format!("Powered:  {}", output::on_off(view.powered, color)),
    ];
    if let Some(owner) = view.key.owner().filter(|o| snap.assets.contains_key(o)) {
        lines.push(format!("Part of:  {owner}"));
    }
    if !view.parent.is_empty() {
        let feeds: Vec<String> = view
            .parent
            .iter()
            .map(|p| match snap.get(p) {
                Some(feed) => format!("{p} ({})", output::on_off(feed.status, color)),
                None => format!("{p} (missing)"),
            })
            .collect();
        lines.push(format!("Fed by:   {}", feeds.join(", ")));
    }
    if !view.children.is_empty() {
        lines.push(format!("Parts:    {}", join_keys(view.children.iter().copied())));
    }
    if let Some(p) = view.position {
        lines.push(format!("Position: {:.0}, {:.0}", p.x, p.y));
    }
    if let Some(load) = view.load {
        lines.push(format!("Load:     {load:.2} A"));
    }
    if let Some(battery) = view.battery {
        lines.push(format!("Battery:  {battery:.0}"));
    }
    lines.join("\n")
}

// ── Filtering ───────────────────────────────────────────────────────

struct Filter {
    all: bool,
    kind: Option<AssetKind>,
    powered: Option<bool>,
}

impl Filter {
    fn collect<'a>(&self, snap: &'a TopologySnapshot) -> Vec<AssetView<'a>> {
        let mut views = Vec::new();
        for asset in snap.assets.values() {
            views.push(AssetView::new(asset, snap));
            if self.all {
                views.extend(asset.children.values().map(|c| AssetView::new(c, snap)));
            }
        }
        views.retain(|v| {
            self.kind.is_none_or(|k| v.kind == k) && self.powered.is_none_or(|p| v.powered == p)
        });
        views
    }
}

fn parse_kind(raw: &str) -> Result<AssetKind, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "kind".into(),
        reason: format!(
            "unknown kind '{raw}' (expected one of: outlet, staticasset, pdu, server, \
             serverwithbmc, ups, lamp)"
        ),
    })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(controller: &Controller, args: AssetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let snap = controller.snapshot();
    let color = output::should_color(&global.color);

    match args.command {
        AssetCommand::List {
            all,
            kind,
            powered,
            unpowered,
        } => {
            let filter = Filter {
                // Filtering on a component kind implies listing components.
                all: all || kind.is_some(),
                kind: kind.as_deref().map(parse_kind).transpose()?,
                powered: match (powered, unpowered) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
            };
            let views = filter.collect(&snap);
            let out = output::render_list(
                &global.output,
                &views,
                |v| AssetRow::new(v, color),
                |v| v.key.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AssetCommand::Get { key } => {
            let asset = util::find_asset(&snap, &AssetKey::from(key.as_str()))?;
            let view = AssetView::new(asset, &snap);
            let out = output::render_single(
                &global.output,
                &view,
                |v| detail(v, &snap, color),
                |v| v.key.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AssetCommand::Children { key } => {
            let asset = util::find_asset(&snap, &AssetKey::from(key.as_str()))?;
            let views: Vec<_> = asset
                .children
                .values()
                .map(|c| AssetView::new(c, &snap))
                .collect();
            let out = output::render_list(
                &global.output,
                &views,
                |v| AssetRow::new(v, color),
                |v| v.key.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use powerdash_core::SyncState;

    fn snapshot() -> TopologySnapshot {
        let pdu = Asset::new("1111", AssetKind::Pdu)
            .with_status(true)
            .with_position(100.0, 40.0)
            .with_child(Asset::new("11111", AssetKind::Outlet).with_status(true))
            .with_child(Asset::new("11112", AssetKind::Outlet).with_status(true));
        let lamp = Asset::new("2", AssetKind::Lamp)
            .with_status(true)
            .with_parents(["11112"]);
        let mut snap = TopologySnapshot {
            sync: SyncState::Synced { empty: false },
            ..TopologySnapshot::default()
        };
        for asset in [pdu, lamp] {
            snap.assets.insert(asset.key.clone(), asset);
        }
        for key in ["1111", "11111", "11112", "2"] {
            snap.powered.insert(key.into(), true);
        }
        snap
    }

    fn keys(views: &[AssetView<'_>]) -> Vec<String> {
        views.iter().map(|v| v.key.to_string()).collect()
    }

    #[test]
    fn list_flattens_components_on_request() {
        let snap = snapshot();
        let top = Filter {
            all: false,
            kind: None,
            powered: None,
        };
        assert_eq!(keys(&top.collect(&snap)), vec!["1111", "2"]);

        let all = Filter { all: true, ..top };
        assert_eq!(keys(&all.collect(&snap)), vec!["1111", "11111", "11112", "2"]);
    }

    #[test]
    fn kind_filter_reaches_components() {
        let snap = snapshot();
        let outlets = Filter {
            all: true,
            kind: Some(parse_kind("outlet").unwrap()),
            powered: None,
        };
        assert_eq!(keys(&outlets.collect(&snap)), vec!["11111", "11112"]);
        assert!(parse_kind("toaster").is_err());
    }

    #[test]
    fn detail_names_owner_and_feeds() {
        let snap = snapshot();
        let outlet = snap.get(&AssetKey::from("11112")).unwrap();
        let text = detail(&AssetView::new(outlet, &snap), &snap, false);
        assert!(text.contains("Part of:  1111"));

        let lamp = snap.get(&AssetKey::from("2")).unwrap();
        let text = detail(&AssetView::new(lamp, &snap), &snap, false);
        assert!(text.contains("Fed by:   11112 (on)"));
    }

    #[test]
    fn view_serializes_children_as_keys() {
        let snap = snapshot();
        let pdu = snap.get(&AssetKey::from("1111")).unwrap();
        let value = serde_json::to_value(AssetView::new(pdu, &snap)).unwrap();
        assert_eq!(value["children"].as_array().unwrap().len(), 2);
        assert_eq!(value["position"]["x"], 100.0);
    }
}

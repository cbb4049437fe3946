//! Connection and topology overview.

use serde::Serialize;

use powerdash_core::{Controller, Environment, SyncState, TopologySnapshot};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct StatusReport {
    url: String,
    sync: SyncState,
    generation: u64,
    assets: usize,
    components: usize,
    powered: usize,
    connections: usize,
    environment: Environment,
}

impl StatusReport {
    fn new(url: String, snap: &TopologySnapshot) -> Self {
        Self {
            url,
            sync: snap.sync,
            generation: snap.generation,
            assets: snap.assets.len(),
            components: snap.component_count(),
            powered: snap.powered.values().filter(|on| **on).count(),
            connections: snap.connections.len(),
            environment: snap.environment.clone(),
        }
    }
}

fn sync_label(sync: SyncState) -> String {
    match sync {
        SyncState::Synced { empty: true } => "synced (empty topology)".into(),
        other => other.to_string(),
    }
}

fn detail(report: &StatusReport, color: bool) -> String {
    let env = &report.environment;
    let mut lines = vec![
        format!("URL:        {}", report.url),
        format!(
            "State:      {}",
            output::state_label(&sync_label(report.sync), report.sync.is_synced(), color)
        ),
        format!(
            "Assets:     {} top-level, {} components",
            report.assets, report.components
        ),
        format!(
            "Powered:    {} / {}",
            report.powered,
            report.assets + report.components
        ),
        format!("Wires:      {}", report.connections),
        format!(
            "Mains:      {}",
            env.mains.map_or_else(|| "-".into(), |on| output::on_off(on, color))
        ),
        format!(
            "Ambient:    {}",
            env.ambient.map_or_else(
                || "-".into(),
                |t| format!("{t:.1}°C{}", if env.ambient_rising { " (rising)" } else { "" })
            )
        ),
        format!("Plays:      {}", env.plays.len()),
    ];
    if let Some(rec) = env.recorder {
        lines.push(format!(
            "Recorder:   {}{}",
            if rec.enabled { "enabled" } else { "disabled" },
            if rec.replaying { ", replaying" } else { "" }
        ));
    }
    if let Some(at) = env.updated_at {
        lines.push(format!("Updated:    {}", util::ago(at)));
    }
    lines.join("\n")
}

pub async fn handle(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    // Mains arrives last in the post-topology burst.
    let snap = util::settle(controller, util::SETTLE, |s| s.environment.mains.is_some()).await;
    let report = StatusReport::new(controller.config().url.to_string(), &snap);
    let color = output::should_color(&global.color);

    let out = output::render_single(
        &global.output,
        &report,
        |r| detail(r, color),
        |r| sync_label(r.sync),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use powerdash_core::{Asset, AssetKind, RecorderStatus};

    fn snapshot() -> TopologySnapshot {
        let pdu = Asset::new("1111", AssetKind::Pdu)
            .with_status(true)
            .with_child(Asset::new("11111", AssetKind::Outlet).with_status(true))
            .with_child(Asset::new("11112", AssetKind::Outlet));
        let mut snap = TopologySnapshot {
            sync: SyncState::Synced { empty: false },
            ..TopologySnapshot::default()
        };
        snap.assets.insert(pdu.key.clone(), pdu);
        snap.powered.insert("1111".into(), true);
        snap.powered.insert("11111".into(), true);
        snap.powered.insert("11112".into(), true);
        snap.environment.mains = Some(true);
        snap.environment.ambient = Some(21.5);
        snap.environment.recorder = Some(RecorderStatus {
            enabled: true,
            replaying: false,
        });
        snap
    }

    #[test]
    fn detail_summarises_topology() {
        let report = StatusReport::new("ws://sim:8000/simengine".into(), &snapshot());
        let text = detail(&report, false);

        assert!(text.contains("State:      synced"));
        assert!(text.contains("1 top-level, 2 components"));
        assert!(text.contains("Powered:    3 / 3"));
        assert!(text.contains("Mains:      on"));
        assert!(text.contains("21.5°C"));
        assert!(text.contains("Recorder:   enabled"));
    }

    #[test]
    fn json_report_shape() {
        let report = StatusReport::new("ws://sim/".into(), &snapshot());
        let value = serde_json::to_value(&report).unwrap();
        insta::assert_json_snapshot!(value, @r###"
        {
          "url": "ws://sim/",
          "sync": {
            "state": "synced",
            "empty": false
          },
          "generation": 0,
          "assets": 1,
          "components": 2,
          "powered": 3,
          "connections": 0,
          "environment": {
            "ambient": 21.5,
            "ambient_rising": false,
            "mains": true,
            "plays": [],
            "recorder": {
              "enabled": true,
              "replaying": false
            },
            "actions": [],
            "updated_at": null
          }
        }
        "###);
    }
}

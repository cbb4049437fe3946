//! Layout and wiring handlers.

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use powerdash_core::{
    AssetKey, AssetKind, Command as CoreCommand, CommandResult, Connection, Controller, Point,
    StageLayout, TopologySnapshot,
};

use crate::cli::{GlobalOpts, LayoutArgs, LayoutCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Positions ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PositionView {
    key: AssetKey,
    kind: AssetKind,
    x: Option<f64>,
    y: Option<f64>,
}

#[derive(Debug, Serialize)]
struct LayoutView {
    stage: Option<StageLayout>,
    assets: Vec<PositionView>,
}

#[derive(Tabled)]
struct PositionRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "X")]
    x: String,
    #[tabled(rename = "Y")]
    y: String,
}

impl From<&PositionView> for PositionRow {
    fn from(p: &PositionView) -> Self {
        Self {
            key: p.key.to_string(),
            kind: p.kind.to_string(),
            x: p.x.map_or_else(|| "-".into(), |x| format!("{x:.0}")),
            y: p.y.map_or_else(|| "-".into(), |y| format!("{y:.0}")),
        }
    }
}

fn layout_view(snap: &TopologySnapshot) -> LayoutView {
    LayoutView {
        stage: snap.stage,
        assets: snap
            .assets
            .values()
            .map(|a| PositionView {
                key: a.key.clone(),
                kind: a.kind,
                x: a.position.map(|p| p.x),
                y: a.position.map(|p| p.y),
            })
            .collect(),
    }
}

fn layout_detail(view: &LayoutView) -> String {
    let stage = view.stage.map_or_else(
        || "Stage: default".into(),
        |s| format!("Stage: x={:.0} y={:.0} scale={:.2}", s.x, s.y, s.scale),
    );
    let rows: Vec<PositionRow> = view.assets.iter().map(PositionRow::from).collect();
    format!("{stage}\n{}", Table::new(rows).with(Style::rounded()))
}

// ── Wires ───────────────────────────────────────────────────────────

#[derive(Tabled)]
struct WireRow {
    #[tabled(rename = "From")]
    source: String,
    #[tabled(rename = "To")]
    dest: String,
    #[tabled(rename = "Port")]
    port: usize,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
}

fn fmt_point(p: Point) -> String {
    format!("({:.0}, {:.0})", p.x, p.y)
}

impl From<&Connection> for WireRow {
    fn from(c: &Connection) -> Self {
        Self {
            source: c.source_key.to_string(),
            dest: c.dest_key.to_string(),
            port: c.id.port,
            start: fmt_point(c.source),
            end: fmt_point(c.dest),
        }
    }
}

fn wire_id(c: &Connection) -> String {
    format!("{}->{}", c.source_key, c.dest_key)
}

/// Wires with either end on `owner` or one of its components.
fn wires_touching<'a>(snap: &'a TopologySnapshot, owner: Option<&AssetKey>) -> Vec<&'a Connection> {
    snap.connections
        .iter()
        .filter(|c| owner.is_none_or(|o| &c.source_owner == o || &c.dest_owner == o))
        .collect()
}

fn print_wires(wires: &[&Connection], global: &GlobalOpts) {
    let out = output::render_list(
        &global.output,
        wires,
        |c| WireRow::from(*c),
        |c| wire_id(c),
    );
    output::print_output(&out, global.quiet);
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: LayoutArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        LayoutCommand::Show => {
            let view = layout_view(&controller.snapshot());
            let out = output::render_single(&global.output, &view, layout_detail, |v| {
                v.assets
                    .iter()
                    .map(|p| format!("{} {} {}", p.key, util::fmt_opt(p.x), util::fmt_opt(p.y)))
                    .collect::<Vec<_>>()
                    .join("\n")
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        LayoutCommand::Wires { asset } => {
            let snap = controller.snapshot();
            let owner = asset.map(|k| AssetKey::from(k.as_str()));
            if let Some(ref owner) = owner {
                util::find_asset(&snap, owner)?;
            }
            print_wires(&wires_touching(&snap, owner.as_ref()), global);
            Ok(())
        }

        LayoutCommand::Move { key, x, y, dry_run } => {
            let key = AssetKey::from(key.as_str());
            let result = controller
                .execute(CoreCommand::MoveAsset {
                    key: key.clone(),
                    x,
                    y,
                })
                .await?;
            let CommandResult::Moved(wires) = result else {
                return Err(CliError::Internal(format!(
                    "unexpected reply to move: {result:?}"
                )));
            };
            print_wires(&wires.iter().collect::<Vec<_>>(), global);

            if dry_run {
                return Ok(());
            }
            let saved = controller.execute(CoreCommand::SaveLayout).await?;
            util::ensure_sent(&saved, "set_layout")?;
            if !global.quiet {
                eprintln!("✓ Moved {key} to ({x:.0}, {y:.0}) and saved the layout");
            }
            Ok(())
        }

        LayoutCommand::Save => {
            let saved = controller.execute(CoreCommand::SaveLayout).await?;
            util::ensure_sent(&saved, "set_layout")?;
            if !global.quiet {
                eprintln!("✓ Layout saved");
            }
            Ok(())
        }
    }
}

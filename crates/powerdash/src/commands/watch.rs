//! Live change feed.

use std::collections::HashMap;

use chrono::Local;
use serde::Serialize;

use powerdash_core::{AssetKey, Controller, SyncState, TopologySnapshot};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

// ── Events ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WatchEvent {
    Sync { sync: SyncState },
    Topology { assets: usize, components: usize },
    Powered { key: AssetKey, powered: bool },
    Status { key: AssetKey, status: bool },
    Mains { on: bool },
    Ambient { celsius: f64, rising: bool },
}

impl WatchEvent {
    fn describe(&self, color: bool) -> String {
        match self {
            Self::Sync { sync } => format!("feed {sync}"),
            Self::Topology { assets, components } => {
                format!("topology loaded: {assets} assets, {components} components")
            }
            Self::Powered { key, powered } => {
                let word = if *powered { "powered" } else { "unpowered" };
                format!("{key} {}", output::state_label(word, *powered, color))
            }
            Self::Status { key, status } => {
                format!("{key} switched {}", output::on_off(*status, color))
            }
            Self::Mains { on } => format!("mains {}", output::on_off(*on, color)),
            Self::Ambient { celsius, rising } => format!(
                "ambient {celsius:.1}°C {}",
                if *rising { "rising" } else { "falling" }
            ),
        }
    }
}

fn statuses(snap: &TopologySnapshot) -> HashMap<&AssetKey, bool> {
    snap.assets
        .values()
        .flat_map(|a| std::iter::once(a).chain(a.children.values()))
        .map(|a| (&a.key, a.status))
        .collect()
}

/// Everything that differs between two consecutive snapshots.
fn diff(prev: &TopologySnapshot, next: &TopologySnapshot, with_status: bool) -> Vec<WatchEvent> {
    let mut events = Vec::new();

    if prev.sync != next.sync {
        events.push(WatchEvent::Sync { sync: next.sync });
    }

    if prev.generation == next.generation {
        for (key, powered) in &next.powered {
            if prev.powered.get(key) != Some(powered) {
                events.push(WatchEvent::Powered {
                    key: key.clone(),
                    powered: *powered,
                });
            }
        }
        if with_status {
            let before = statuses(prev);
            let mut changed: Vec<_> = statuses(next)
                .into_iter()
                .filter(|(key, status)| before.get(key) != Some(status))
                .collect();
            changed.sort_by(|a, b| a.0.cmp(b.0));
            events.extend(changed.into_iter().map(|(key, status)| WatchEvent::Status {
                key: key.clone(),
                status,
            }));
        }
    } else {
        // A fresh snapshot replaces everything; don't diff per asset.
        events.push(WatchEvent::Topology {
            assets: next.assets.len(),
            components: next.component_count(),
        });
    }

    let (before, after) = (&prev.environment, &next.environment);
    if before.mains != after.mains {
        events.extend(after.mains.map(|on| WatchEvent::Mains { on }));
    }
    if before.ambient != after.ambient {
        events.extend(after.ambient.map(|celsius| WatchEvent::Ambient {
            celsius,
            rising: after.ambient_rising,
        }));
    }
    events
}

fn print_event(event: &WatchEvent, global: &GlobalOpts, color: bool) {
    let line = match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(event, true),
        OutputFormat::Yaml => format!("---\n{}", output::render_yaml(event).trim_end()),
        OutputFormat::Table | OutputFormat::Plain => format!(
            "{} {}",
            Local::now().format("%H:%M:%S"),
            event.describe(color)
        ),
    };
    output::print_output(&line, global.quiet);
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let mut stream = controller.stream();
    let mut seen = 0_usize;

    if !global.quiet {
        eprintln!("Watching {} (Ctrl-C to stop)", controller.config().url);
    }

    loop {
        let prev = stream.current().clone();
        let next = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = stream.changed() => match next {
                Some(next) => next,
                None => break,
            },
        };

        for event in diff(&prev, &next, args.status) {
            print_event(&event, global, color);
            seen += 1;
            if args.count.is_some_and(|limit| seen >= limit) {
                return Ok(());
            }
        }
    }
    Ok(())
}

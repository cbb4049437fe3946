//! Action recorder handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

use powerdash_core::{Command as CoreCommand, Controller, RecorderStatus, TopologySnapshot};

use crate::cli::{GlobalOpts, RecorderArgs, RecorderCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Action rows ─────────────────────────────────────────────────────

/// One recorded action as the simulator describes it. Unknown shapes
/// are shown verbatim in the `work` column.
#[derive(Debug, Serialize)]
struct ActionView {
    number: Option<i64>,
    timestamp: Option<i64>,
    work: String,
}

impl From<&Value> for ActionView {
    fn from(v: &Value) -> Self {
        Self {
            number: v.get("number").and_then(Value::as_i64),
            timestamp: v.get("timestamp").and_then(Value::as_i64),
            work: v
                .get("work")
                .and_then(Value::as_str)
                .map_or_else(|| v.to_string(), str::to_owned),
        }
    }
}

#[derive(Tabled)]
struct ActionRow {
    #[tabled(rename = "#")]
    number: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Action")]
    work: String,
}

impl From<&ActionView> for ActionRow {
    fn from(a: &ActionView) -> Self {
        Self {
            number: util::fmt_opt(a.number),
            time: a
                .timestamp
                .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
                .map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            work: a.work.clone(),
        }
    }
}

// ── Status ──────────────────────────────────────────────────────────

fn status_detail(status: &RecorderStatus, color: bool) -> String {
    [
        format!("Recording:  {}", output::on_off(status.enabled, color)),
        format!("Replaying:  {}", output::on_off(status.replaying, color)),
    ]
    .join("\n")
}

fn status_word(status: &RecorderStatus) -> String {
    match (status.enabled, status.replaying) {
        (_, true) => "replaying".into(),
        (true, false) => "enabled".into(),
        (false, false) => "disabled".into(),
    }
}

/// Send `cmd`, then wait for an environment update satisfying `ready`.
async fn request_and_wait(
    controller: &Controller,
    cmd: CoreCommand,
    action: &str,
    ready: impl Fn(&TopologySnapshot) -> bool,
) -> Result<Arc<TopologySnapshot>, CliError> {
    let since = controller.snapshot().environment.updated_at;
    let result = controller.execute(cmd).await?;
    util::ensure_sent(&result, action)?;

    let timeout = controller.config().timeout;
    let mut rx = controller.subscribe();
    let wait = rx.wait_for(|s| s.environment.updated_at != since && ready(s));
    match tokio::time::timeout(timeout, wait).await {
        Ok(Ok(snap)) => Ok(snap.clone()),
        Ok(Err(_)) => Err(CliError::ConnectionFailed {
            url: controller.config().url.to_string(),
            source: "engine stopped while waiting for a reply".into(),
        }),
        Err(_) => Err(CliError::Timeout {
            seconds: timeout.as_secs(),
        }),
    }
}

async fn show_status(controller: &Controller, global: &GlobalOpts) -> Result<(), CliError> {
    let snap = request_and_wait(
        controller,
        CoreCommand::RequestRecorderStatus,
        "get_recorder_status",
        |s| s.environment.recorder.is_some(),
    )
    .await?;
    let status = snap.environment.recorder.unwrap_or_default();
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &status,
        |s| status_detail(s, color),
        status_word,
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

async fn set_enabled(
    controller: &Controller,
    enabled: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let result = controller
        .execute(CoreCommand::SetRecorder { enabled })
        .await?;
    util::ensure_sent(&result, "set_recorder_status")?;
    show_status(controller, global).await
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: RecorderArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        RecorderCommand::Status => show_status(controller, global).await,

        RecorderCommand::Enable => set_enabled(controller, true, global).await,
        RecorderCommand::Disable => set_enabled(controller, false, global).await,

        RecorderCommand::Actions(range) => {
            let snap = request_and_wait(
                controller,
                CoreCommand::RequestActions {
                    range: util::action_range(&range),
                },
                "get_actions",
                |_| true,
            )
            .await?;
            let actions: Vec<ActionView> =
                snap.environment.actions.iter().map(ActionView::from).collect();
            let out = output::render_list(
                &global.output,
                &actions,
                |a| ActionRow::from(a),
                |a| a.work.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RecorderCommand::Replay(range) => {
            let result = controller
                .execute(CoreCommand::ReplayActions {
                    range: util::action_range(&range),
                })
                .await?;
            util::ensure_sent(&result, "replay_actions")?;
            if !global.quiet {
                eprintln!("✓ Replay started");
            }
            Ok(())
        }

        RecorderCommand::Clear(range) => {
            if !util::confirm("Delete the selected recorded actions?", global.yes)? {
                return Ok(());
            }
            let result = controller
                .execute(CoreCommand::ClearActions {
                    range: util::action_range(&range),
                })
                .await?;
            util::ensure_sent(&result, "clear_actions")?;
            if !global.quiet {
                eprintln!("✓ Recorded actions cleared");
            }
            Ok(())
        }
    }
}

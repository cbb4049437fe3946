//! Wall power handlers.

use serde::Serialize;

use powerdash_core::{Command as CoreCommand, Controller};

use crate::cli::{GlobalOpts, MainsArgs, MainsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Debug, Serialize)]
struct MainsView {
    mains: Option<bool>,
}

fn label(mains: Option<bool>, color: bool) -> String {
    mains.map_or_else(|| "unknown".into(), |on| output::on_off(on, color))
}

pub async fn handle(
    controller: &Controller,
    args: MainsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);

    let wanted = match args.command {
        MainsCommand::Status => None,
        MainsCommand::On => Some(true),
        MainsCommand::Off => Some(false),
    };

    if let Some(on) = wanted {
        let result = controller.execute(CoreCommand::SetMains { on }).await?;
        util::ensure_sent(&result, "set_mains")?;
    }

    let snap = util::settle(controller, util::SETTLE, |s| match wanted {
        Some(on) => s.environment.mains == Some(on),
        None => s.environment.mains.is_some(),
    })
    .await;

    let view = MainsView {
        mains: snap.environment.mains,
    };
    let out = output::render_single(
        &global.output,
        &view,
        |v| format!("Mains: {}", label(v.mains, color)),
        |v| label(v.mains, false),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

//! Power command handlers.

use powerdash_core::{AssetKey, Command as CoreCommand, Controller};

use crate::cli::{GlobalOpts, PowerArgs, PowerCommand, PowerTarget};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    controller: &Controller,
    args: PowerArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (target, on) = match args.command {
        PowerCommand::On(target) => (target, Some(true)),
        PowerCommand::Off(target) => (target, Some(false)),
        PowerCommand::Toggle(target) => (target, None),
    };
    let PowerTarget { key, hard } = target;
    let key = AssetKey::from(key.as_str());

    let before = util::find_asset(&controller.snapshot(), &key)?.status;
    let wanted = on.unwrap_or(!before);

    let cmd = match on {
        Some(on) => CoreCommand::SetPower {
            key: key.clone(),
            on,
            hard,
        },
        None => CoreCommand::TogglePower {
            key: key.clone(),
            hard,
        },
    };
    let result = controller.execute(cmd).await?;
    util::ensure_sent(&result, "set_power")?;

    // The simulator confirms with an asset update; report what it says.
    let snap = util::settle(controller, util::SETTLE, |s| {
        s.get(&key).is_some_and(|a| a.status == wanted)
    })
    .await;

    if !global.quiet {
        let color = output::should_color(&global.color);
        match snap.get(&key) {
            Some(asset) if asset.status == wanted => {
                let powered = snap.is_powered(&key).unwrap_or(false);
                eprintln!(
                    "✓ {key} is {} (powered: {})",
                    output::on_off(asset.status, color),
                    output::on_off(powered, color)
                );
            }
            _ => eprintln!(
                "Request sent; {key} has not reported {} yet",
                output::on_off(wanted, color)
            ),
        }
    }
    Ok(())
}

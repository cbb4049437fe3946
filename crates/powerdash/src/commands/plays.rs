//! Scenario script handlers.

use tabled::Tabled;

use powerdash_core::{Command as CoreCommand, Controller};

use crate::cli::{GlobalOpts, PlaysArgs, PlaysCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct PlayRow {
    #[tabled(rename = "Play")]
    name: String,
}

pub async fn handle(
    controller: &Controller,
    args: PlaysArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // The play list follows the topology in the status burst.
    let snap = util::settle(controller, util::SETTLE, |s| !s.environment.plays.is_empty()).await;
    let plays = &snap.environment.plays;

    match args.command {
        PlaysCommand::List => {
            if plays.is_empty() && !global.quiet {
                eprintln!("No plays reported by the simulator");
                return Ok(());
            }
            let out = output::render_list(
                &global.output,
                plays,
                |name| PlayRow { name: name.clone() },
                Clone::clone,
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PlaysCommand::Run { name } => {
            if !plays.is_empty() && !plays.contains(&name) {
                return Err(CliError::NotFound {
                    resource_type: "play".into(),
                    identifier: name,
                    list_command: "plays list".into(),
                });
            }
            let result = controller
                .execute(CoreCommand::ExecPlay { name: name.clone() })
                .await?;
            util::ensure_sent(&result, "exec_play")?;
            if !global.quiet {
                eprintln!("✓ Started play '{name}'");
            }
            Ok(())
        }
    }
}

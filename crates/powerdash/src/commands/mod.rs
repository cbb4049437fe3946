//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod assets;
pub mod config_cmd;
pub mod layout;
pub mod mains;
pub mod plays;
pub mod power;
pub mod recorder;
pub mod status;
pub mod util;
pub mod watch;

use powerdash_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Connect, run a simulator-bound command, disconnect.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // `watch` rides out outages instead of failing on the first timeout.
    let wait = !matches!(cmd, Command::Watch(_));

    let result = async {
        util::connect(controller, global, wait).await?;
        match cmd {
            Command::Status => status::handle(controller, global).await,
            Command::Watch(args) => watch::handle(controller, args, global).await,
            Command::Asset(args) => assets::handle(controller, args, global),
            Command::Power(args) => power::handle(controller, args, global).await,
            Command::Mains(args) => mains::handle(controller, args, global).await,
            Command::Plays(args) => plays::handle(controller, args, global).await,
            Command::Layout(args) => layout::handle(controller, args, global).await,
            Command::Recorder(args) => recorder::handle(controller, args, global).await,
            // Config and Completions are handled before dispatch
            Command::Config(_) | Command::Completions(_) => Ok(()),
        }
    }
    .await;

    controller.disconnect().await;
    result
}

//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use powerdash_core::{
    ActionRange, Asset, AssetKey, CommandResult, Controller, CoreError, SyncState,
    TopologySnapshot,
};

use crate::cli::{GlobalOpts, RangeArgs};
use crate::error::CliError;

/// How long to wait for follow-up broadcasts (mains, plays, replies)
/// that the simulator sends right after the topology.
pub const SETTLE: Duration = Duration::from_secs(2);

/// Start the feed and, when `wait` is set, block until the topology is in.
pub async fn connect(controller: &Controller, global: &GlobalOpts, wait: bool) -> Result<(), CliError> {
    let url = controller.config().url.to_string();
    controller.connect().await?;
    if !wait {
        return Ok(());
    }

    let spinner = spinner(global, &format!("Syncing with {url}"));
    let result = controller.wait_for_sync(controller.config().timeout).await;
    spinner.finish_and_clear();

    match result {
        Ok(_) => Ok(()),
        // Never got as far as a connection: report that, not the timeout.
        Err(CoreError::Timeout { timeout_secs })
            if *controller.sync_state().borrow() == SyncState::Disconnected =>
        {
            Err(CliError::ConnectionFailed {
                url,
                source: format!("no connection within {timeout_secs}s").into(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn spinner(global: &GlobalOpts, message: &str) -> ProgressBar {
    if global.quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_owned());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Wait up to `within` for a snapshot matching `pred`; returns the latest
/// snapshot either way.
pub async fn settle(
    controller: &Controller,
    within: Duration,
    pred: impl Fn(&TopologySnapshot) -> bool,
) -> Arc<TopologySnapshot> {
    let mut rx = controller.subscribe();
    let _ = tokio::time::timeout(within, rx.wait_for(|snap| pred(snap))).await;
    controller.snapshot()
}

/// Look up an asset or component by key.
pub fn find_asset<'a>(snap: &'a TopologySnapshot, key: &AssetKey) -> Result<&'a Asset, CliError> {
    snap.get(key).ok_or_else(|| CliError::NotFound {
        resource_type: "asset".into(),
        identifier: key.to_string(),
        list_command: "asset list --all".into(),
    })
}

/// Turn an unsent request into an error.
pub fn ensure_sent(result: &CommandResult, action: &str) -> Result<(), CliError> {
    if result.was_sent() {
        Ok(())
    } else {
        Err(CliError::Offline {
            action: action.into(),
        })
    }
}

pub fn action_range(args: &RangeArgs) -> ActionRange {
    ActionRange {
        start: args.start,
        stop: args.stop,
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// "3s ago" style age of a timestamp.
pub fn ago(at: chrono::DateTime<chrono::Utc>) -> String {
    let elapsed = (chrono::Utc::now() - at).to_std().unwrap_or_default();
    let whole = Duration::from_secs(elapsed.as_secs());
    if whole.is_zero() {
        return "just now".into();
    }
    format!("{} ago", humantime::format_duration(whole))
}

pub fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ago_rounds_to_seconds() {
        let at = chrono::Utc::now() - chrono::Duration::seconds(90);
        assert_eq!(ago(at), "1m 30s ago");
        assert_eq!(ago(chrono::Utc::now()), "just now");
    }

    #[test]
    fn unsent_request_is_offline() {
        let err = ensure_sent(&CommandResult::Sent(false), "set_mains").unwrap_err();
        assert!(matches!(err, CliError::Offline { .. }));
        assert!(ensure_sent(&CommandResult::Sent(true), "set_mains").is_ok());
    }

    #[test]
    fn range_bounds_pass_through() {
        let range = action_range(&RangeArgs {
            start: Some(2),
            stop: None,
        });
        assert_eq!(range, ActionRange { start: Some(2), stop: None });
        assert_eq!(fmt_opt::<u8>(None), "-");
    }
}

//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use powerdash_config::ConfigError;
use powerdash_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to the simulator at {url}")]
    #[diagnostic(
        code(powerdash::connection_failed),
        help(
            "Check that the simulator is running and its websocket is reachable.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Simulator feed is offline; '{action}' was not sent")]
    #[diagnostic(
        code(powerdash::offline),
        help("The connection dropped before the request could go out. Retry once it is back.")
    )]
    Offline { action: String },

    // ── Topology ─────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(powerdash::not_found),
        help("Run: powerdash {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Asset '{key}' is a component and has no position of its own")]
    #[diagnostic(
        code(powerdash::not_top_level),
        help("Move the asset that owns it instead (the key without its last digit).")
    )]
    NotTopLevel { key: String },

    #[error("Protocol error: {message}")]
    #[diagnostic(code(powerdash::protocol))]
    Protocol { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(powerdash::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(powerdash::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: powerdash config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No simulator configured")]
    #[diagnostic(
        code(powerdash::no_config),
        help(
            "Create a profile with: powerdash config init\n\
             Or pass --url ws://host:8000/simengine (POWERDASH_URL).\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(powerdash::config))]
    Config(Box<figment::Error>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(powerdash::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(powerdash::timeout),
        help("Increase the timeout with --timeout or check that the simulator is responding.")
    )]
    Timeout { seconds: u64 },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(powerdash::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not write config: {0}")]
    #[diagnostic(code(powerdash::toml))]
    Toml(#[from] toml::ser::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Offline { .. } => exit_code::CONNECTION,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::NotTopLevel { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::Offline => CliError::Offline {
                action: "request".into(),
            },

            CoreError::ControllerDisconnected => CliError::ConnectionFailed {
                url: "(disconnected)".into(),
                source: "engine task is not running".into(),
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::UnknownAsset { key } => CliError::NotFound {
                resource_type: "asset".into(),
                identifier: key.to_string(),
                list_command: "asset list --all".into(),
            },

            CoreError::UnresolvedParent { key, parent } => CliError::Protocol {
                message: format!("asset {key} references missing parent {parent}"),
            },

            CoreError::NotTopLevel { key } => CliError::NotTopLevel {
                key: key.to_string(),
            },

            CoreError::Protocol { message } => CliError::Protocol { message },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Serialization(e) => CliError::Toml(e),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let timeout = CliError::from(CoreError::Timeout { timeout_secs: 3 });
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let missing = CliError::from(CoreError::UnknownAsset { key: "42".into() });
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let usage = CliError::from(ConfigError::Validation {
            field: "url".into(),
            reason: "bad".into(),
        });
        assert_eq!(usage.exit_code(), exit_code::USAGE);
        assert_ne!(exit_code::SUCCESS, usage.exit_code());
    }

    #[test]
    fn component_move_is_a_conflict() {
        let err = CliError::from(CoreError::NotTopLevel { key: "11112".into() });
        assert_eq!(err.exit_code(), exit_code::CONFLICT);
        assert!(err.to_string().contains("11112"));
    }
}

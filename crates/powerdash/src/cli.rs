//! Clap derive structures for the `powerdash` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// powerdash -- watch and drive a simulated power topology
#[derive(Debug, Parser)]
#[command(
    name = "powerdash",
    version,
    about = "Monitor and control a simulated power topology from the command line",
    long_about = "Connects to the simulator's websocket feed, mirrors the asset graph\n\
        (PDUs, UPS units, servers, outlets, lamps) and derives which assets\n\
        are powered. Power, mains, layout, scenario and recorder actions are\n\
        sent back over the same feed.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Simulator profile to use
    #[arg(long, short = 'p', env = "POWERDASH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Simulator websocket URL (overrides profile)
    #[arg(long, short = 'u', env = "POWERDASH_URL", global = true)]
    pub url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "POWERDASH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Seconds to wait for the topology (and for replies)
    #[arg(long, env = "POWERDASH_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "POWERDASH_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Connection state, topology counts and environment
    #[command(alias = "st")]
    Status,

    /// Stream topology changes until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Inspect assets and their components
    #[command(alias = "assets", alias = "a")]
    Asset(AssetArgs),

    /// Switch assets on and off
    #[command(alias = "pw")]
    Power(PowerArgs),

    /// Wall power for the whole simulation
    Mains(MainsArgs),

    /// Scenario scripts on the simulator
    #[command(alias = "play")]
    Plays(PlaysArgs),

    /// Asset positions and wiring
    Layout(LayoutArgs),

    /// Action recorder and replay
    #[command(alias = "rec")]
    Recorder(RecorderArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Also report assets whose own status changed (not only powered)
    #[arg(long)]
    pub status: bool,

    /// Stop after this many change events
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Assets ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AssetArgs {
    #[command(subcommand)]
    pub command: AssetCommand,
}

#[derive(Debug, Subcommand)]
pub enum AssetCommand {
    /// List top-level assets
    #[command(alias = "ls")]
    List {
        /// Include components (outlets, PSUs) as their own rows
        #[arg(long, short = 'a')]
        all: bool,

        /// Only assets of this kind (pdu, ups, server, outlet, lamp, ...)
        #[arg(long, short = 'k')]
        kind: Option<String>,

        /// Only powered (or, with --unpowered, unpowered) assets
        #[arg(long, conflicts_with = "unpowered")]
        powered: bool,

        #[arg(long)]
        unpowered: bool,
    },

    /// Show one asset or component
    Get {
        /// Asset key (components use their composite key, e.g. 11112)
        key: String,
    },

    /// List the components of an asset
    Children {
        /// Asset key
        key: String,
    },
}

// ── Power ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PowerArgs {
    #[command(subcommand)]
    pub command: PowerCommand,
}

#[derive(Debug, Subcommand)]
pub enum PowerCommand {
    /// Power an asset up
    On(PowerTarget),

    /// Power an asset down
    Off(PowerTarget),

    /// Flip an asset's current status
    Toggle(PowerTarget),
}

#[derive(Debug, Args)]
pub struct PowerTarget {
    /// Asset key
    pub key: String,

    /// Cut power immediately instead of a graceful shutdown
    #[arg(long)]
    pub hard: bool,
}

// ── Mains ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct MainsArgs {
    #[command(subcommand)]
    pub command: MainsCommand,
}

#[derive(Debug, Subcommand)]
pub enum MainsCommand {
    /// Show wall power state
    Status,

    /// Restore wall power
    On,

    /// Cut wall power
    Off,
}

// ── Plays ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PlaysArgs {
    #[command(subcommand)]
    pub command: PlaysCommand,
}

#[derive(Debug, Subcommand)]
pub enum PlaysCommand {
    /// List scenario scripts known to the simulator
    #[command(alias = "ls")]
    List,

    /// Run a scenario script
    #[command(alias = "exec")]
    Run {
        /// Script name (see `plays list`)
        name: String,
    },
}

// ── Layout ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LayoutArgs {
    #[command(subcommand)]
    pub command: LayoutCommand,
}

#[derive(Debug, Subcommand)]
pub enum LayoutCommand {
    /// Show stage transform and asset positions
    Show,

    /// List every wire with its endpoints
    Wires {
        /// Only wires touching this asset or its components
        #[arg(long)]
        asset: Option<String>,
    },

    /// Move a top-level asset and save the layout
    #[command(alias = "mv")]
    Move {
        /// Asset key
        key: String,

        /// New x coordinate
        #[arg(allow_negative_numbers = true)]
        x: f64,

        /// New y coordinate
        #[arg(allow_negative_numbers = true)]
        y: f64,

        /// Recompute the wiring locally without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Persist the current positions on the simulator
    Save,
}

// ── Recorder ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RecorderArgs {
    #[command(subcommand)]
    pub command: RecorderCommand,
}

#[derive(Debug, Subcommand)]
pub enum RecorderCommand {
    /// Show whether the recorder is enabled or replaying
    Status,

    /// Start recording actions
    Enable,

    /// Stop recording actions
    Disable,

    /// List recorded actions
    #[command(alias = "ls")]
    Actions(RangeArgs),

    /// Replay recorded actions
    Replay(RangeArgs),

    /// Delete recorded actions
    Clear(RangeArgs),
}

/// Slice of the action history. Omitted bounds are open.
#[derive(Debug, Args)]
pub struct RangeArgs {
    /// First action index
    #[arg(long, allow_negative_numbers = true)]
    pub start: Option<i64>,

    /// Stop before this action index
    #[arg(long, allow_negative_numbers = true)]
    pub stop: Option<i64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive configuration wizard
    Init,

    /// Show the effective configuration
    Show,

    /// Set a value on the active profile
    Set {
        /// Key: url, reconnect_delay_secs, subscribe, timeout
        key: String,

        /// Value
        value: String,
    },

    /// List profiles (* marks the default)
    Profiles,

    /// Make a profile the default
    Use {
        /// Profile name
        name: String,
    },

    /// Print the config file location
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

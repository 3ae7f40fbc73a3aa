//! Clap derive structures for the `fleetsync` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fleetsync -- replay printer telegrams into the fleet state layer
#[derive(Debug, Parser)]
#[command(
    name = "fleetsync",
    version,
    about = "Replay and inspect printer fleet state",
    long_about = "Feeds recorded printer telegrams through the in-process event bus\n\
        into the event, file and floor stores, then prints what they hold.",
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
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "FLEETSYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FLEETSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one identifier per line (scripting)
    Plain,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a JSON-lines telegram recording through the stores
    Replay(ReplayArgs),

    /// Show the settings document a fresh start would load
    Settings(SettingsArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON-lines file: one telegram or deletion notice per line
    pub recording: PathBuf,

    /// JSON array of floors to seed the floor store with
    #[arg(long)]
    pub floors: Option<PathBuf>,

    /// Register a printer as known to the fleet (repeatable)
    #[arg(long = "printer", value_name = "ID")]
    pub printers: Vec<String>,

    /// Which store to print afterwards
    #[arg(long, default_value = "events")]
    pub view: ReplayView,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReplayView {
    /// Per-printer event records
    Events,
    /// Floors and their placements
    Floors,
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    /// Include privileged sections (never the JWT secret)
    #[arg(long)]
    pub sensitive: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the resolved configuration (file + environment)
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

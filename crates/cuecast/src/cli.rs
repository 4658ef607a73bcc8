//! Clap derive structures for the `cuecast` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// cuecast -- drive OBS Studio and Streamer.bot from the command line
#[derive(Debug, Parser)]
#[command(
    name = "cuecast",
    version,
    about = "Control OBS Studio and Streamer.bot from the command line",
    long_about = "A resilient control plane for live production.\n\n\
        Talks obs-websocket v5 to OBS Studio: validated actions, transactional\n\
        batches with rollback, and event-driven automation rules that can also\n\
        run Streamer.bot actions.",
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
    /// Profile to use
    #[arg(long, short = 'p', env = "CUECAST_PROFILE", global = true)]
    pub profile: Option<String>,

    /// obs-websocket URL (overrides profile)
    #[arg(long, short = 'u', env = "CUECAST_URL", global = true)]
    pub url: Option<String>,

    /// Name of an environment variable holding the OBS password
    #[arg(long, global = true)]
    pub password_env: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CUECAST_OUTPUT",
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

    /// Per-call timeout in seconds (overrides profile)
    #[arg(long, env = "CUECAST_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
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
    /// Show current OBS state and what changed recently
    #[command(alias = "st")]
    Status,

    /// Send a raw obs-websocket request
    Call(CallArgs),

    /// Validate and run a single action
    Run(RunArgs),

    /// Run a batch of actions as one transaction
    Batch(BatchArgs),

    /// Check a batch against current OBS state without sending it
    Validate(ValidateArgs),

    /// Run automation rules until interrupted
    Watch(WatchArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command arguments ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Request type, e.g. GetSceneList
    pub request_type: String,

    /// Request data as a JSON object
    #[arg(long, short = 'd')]
    pub data: Option<String>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Action as JSON: {"type": "...", "parameters": {...}}
    pub action: String,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// JSON file with an array of actions (or {"actions": [...]})
    pub file: PathBuf,

    /// Drop no-op actions instead of failing the batch
    #[arg(long)]
    pub skip_redundant: bool,

    /// Pause between steps in milliseconds
    #[arg(long)]
    pub step_delay: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// JSON file with an array of actions (or {"actions": [...]})
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Rules file (overrides the profile's `rules`)
    #[arg(long, short = 'r')]
    pub rules: Option<PathBuf>,

    /// Do not connect to Streamer.bot even if the profile configures it
    #[arg(long)]
    pub no_streamerbot: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Store the OBS password in the system keyring
    SetPassword {
        /// Profile name (defaults to active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

//! Clap derive structures for the `lumifly` CLI.
//!
//! Defines the command tree, global flags, and shared argument types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use lumifly_core::{CoreError, ExecutionPolicy};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lumifly -- fleet controller for OPC-UA lighting modules
#[derive(Debug, Parser)]
#[command(
    name = "lumifly",
    version,
    about = "Probe, read and switch a fleet of OPC-UA lighting modules",
    long_about = "Applies dimmer and relay commands across every module in a fleet roster.\n\n\
        Each module gets its own session; one unreachable module never stops the batch.\n\
        Batches run all at once, paced by a delay, or stepped with a confirmation per module.",
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
    /// Fleet roster file (defaults to the platform config directory)
    #[arg(long, env = "LUMIFLY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Run against an in-process simulated fleet built from the roster
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Leave these roster endpoints out of the simulated fleet
    #[arg(
        long = "sim-offline",
        value_name = "ENDPOINT",
        value_delimiter = ',',
        requires = "simulate",
        global = true
    )]
    pub sim_offline: Vec<String>,

    /// Per-operation timeout in seconds (overrides the roster default)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Modules in flight at once (overrides the roster default)
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "LUMIFLY_OUTPUT",
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
    /// Plain text, one line per module (scripting)
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RelayState {
    On,
    Off,
}

impl RelayState {
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check which modules accept a connection
    #[command(alias = "ping")]
    Probe,

    /// Read dimmer and relay state from every module
    #[command(alias = "status")]
    Read,

    /// Dim to 0 and open both relays on every module
    Off(PolicyArgs),

    /// Dim to full and close both relays on every module
    On(PolicyArgs),

    /// Set every module to a brightness level
    Set(SetArgs),

    /// Switch front and back relays without touching the dimmer
    Relays(RelaysArgs),

    /// Interactive menu
    Shell,

    /// Manage the fleet roster file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Batch arguments ──────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct PolicyArgs {
    /// Seconds to wait between consecutive modules
    #[arg(long, conflicts_with = "manual", allow_negative_numbers = true)]
    pub delay: Option<f64>,

    /// Ask for confirmation before each module
    #[arg(long)]
    pub manual: bool,
}

impl PolicyArgs {
    pub fn policy(&self) -> Result<ExecutionPolicy, CoreError> {
        match (self.delay, self.manual) {
            (_, true) => Ok(ExecutionPolicy::ManualStepped),
            (Some(secs), false) => ExecutionPolicy::delayed_secs(secs),
            (None, false) => Ok(ExecutionPolicy::Atomic),
        }
    }
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Brightness, 0 (off) to 10000 (full)
    #[arg(allow_negative_numbers = true)]
    pub dim: i64,

    /// Relay state written alongside the dimmer
    #[arg(long, default_value = "on")]
    pub relays: RelayState,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

#[derive(Debug, Args)]
pub struct RelaysArgs {
    /// Target state for both relays
    pub state: RelayState,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a sample roster of modules on consecutive ports
    Init(InitArgs),

    /// Show the resolved roster
    Show,

    /// Print the roster file path
    Path,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Host the modules listen on
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Port of the first module
    #[arg(long, default_value_t = lumifly_config::SAMPLE_BASE_PORT)]
    pub base_port: u16,

    /// Number of modules
    #[arg(long, default_value_t = lumifly_config::SAMPLE_DEVICE_COUNT)]
    pub count: usize,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn manual_wins_and_delay_must_be_valid() {
        let manual = PolicyArgs {
            delay: None,
            manual: true,
        };
        assert_eq!(manual.policy().ok(), Some(ExecutionPolicy::ManualStepped));

        let negative = PolicyArgs {
            delay: Some(-1.0),
            manual: false,
        };
        assert!(negative.policy().is_err());

        let none = PolicyArgs {
            delay: None,
            manual: false,
        };
        assert_eq!(none.policy().ok(), Some(ExecutionPolicy::Atomic));
    }

    #[test]
    fn set_accepts_negative_dim_for_later_validation() {
        let cli = Cli::try_parse_from(["lumifly", "set", "-5"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Command::Set(SetArgs { dim: -5, .. }))
        ));
    }
}

//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use lumifly_config::ConfigError;
use lumifly_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const PARTIAL: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Fleet ────────────────────────────────────────────────────────
    #[error("No module in the fleet is reachable")]
    #[diagnostic(
        code(lumifly::unreachable),
        help(
            "Check that the modules are powered and listening.\n\
             Try: lumifly probe -v"
        )
    )]
    NoReachableDevices,

    #[error("{operation}: {failed} of {total} modules failed")]
    #[diagnostic(
        code(lumifly::partial_failure),
        help("The other modules were handled. Re-run the command once the failed modules are back.")
    )]
    PartialFailure {
        operation: String,
        failed: usize,
        total: usize,
    },

    #[error("No device transport available")]
    #[diagnostic(
        code(lumifly::no_transport),
        help(
            "This build has no OPC-UA client. Rebuild with `--features opcua`,\n\
             or run against the simulated fleet with --simulate."
        )
    )]
    #[cfg_attr(feature = "opcua", allow(dead_code))]
    TransportUnavailable,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lumifly::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Fleet roster not found")]
    #[diagnostic(
        code(lumifly::no_config),
        help(
            "Create one with: lumifly config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Fleet roster already exists at {path}")]
    #[diagnostic(
        code(lumifly::config_exists),
        help("Pass --yes (-y) to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(lumifly::config))]
    Config(ConfigError),

    #[error(transparent)]
    #[diagnostic(
        code(lumifly::roster),
        help("Fix the roster file and try again. Run: lumifly config show")
    )]
    Roster(CoreError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("'{action}' requires confirmation")]
    #[diagnostic(
        code(lumifly::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    #[error("{what} needs an interactive terminal")]
    #[diagnostic(
        code(lumifly::not_a_terminal),
        help("Run it from a terminal. For unattended runs use the subcommands with --delay and --yes.")
    )]
    NeedsTerminal { what: String },

    #[error("Prompt failed: {0}")]
    #[diagnostic(code(lumifly::prompt))]
    Prompt(#[from] dialoguer::Error),

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoReachableDevices => exit_code::CONNECTION,
            Self::PartialFailure { .. } => exit_code::PARTIAL,
            Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. }
            | Self::NeedsTerminal { .. } => exit_code::USAGE,
            Self::NoConfig { .. }
            | Self::ConfigExists { .. }
            | Self::Config(_)
            | Self::Roster(_)
            | Self::TransportUnavailable => exit_code::CONFIG,
            Self::Prompt(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError / ConfigError → CliError mapping ───────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InputValidation { field, reason } => Self::Validation { field, reason },
            other => Self::Roster(other),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => Self::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::Registry(core) => Self::Roster(core),
            ConfigError::Io(io) => Self::Io(io),
            other => Self::Config(other),
        }
    }
}

mod cli;
mod commands;
mod config;
mod error;
mod gate;
mod output;
mod shell;

use std::sync::Arc;

use clap::Parser;
use lumifly_core::{CancellationToken, FleetController, FleetOptions, FleetRegistry};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::commands::Action;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity; log colors follow --color and stderr
    init_tracing(
        cli.global.verbose,
        output::should_color_stderr(&cli.global.color),
    );

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, ansi: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't touch the fleet
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "lumifly", &mut std::io::stdout());
            Ok(())
        }

        // Everything else runs against the fleet
        cmd => {
            let action = Action::from_command(cmd)?;
            let (registry, options) = config::resolve_fleet(&cli.global)?;
            let cancel = CancellationToken::new();
            cancel_on_interrupt(cancel.clone());

            tracing::debug!(?action, devices = registry.len(), "dispatching command");
            if cli.global.simulate {
                let fleet = config::simulated_fleet(&registry, &cli.global.sim_offline);
                let controller = FleetController::new(Arc::new(fleet), registry, options);
                return commands::dispatch(action, &controller, &cli.global, &cancel).await;
            }

            run_live(action, registry, options, &cli.global, &cancel).await
        }
    }
}

/// Fleet commands against real modules over OPC-UA.
#[cfg(feature = "opcua")]
async fn run_live(
    action: Action,
    registry: FleetRegistry,
    options: FleetOptions,
    global: &cli::GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let transport = lumifly_api::OpcUaTransport::new().with_timeout(options.timeout);
    let controller = FleetController::new(Arc::new(transport), registry, options);
    commands::dispatch(action, &controller, global, cancel).await
}

#[cfg(not(feature = "opcua"))]
#[allow(clippy::unused_async, clippy::needless_pass_by_value)]
async fn run_live(
    _action: Action,
    _registry: FleetRegistry,
    _options: FleetOptions,
    _global: &cli::GlobalOpts,
    _cancel: &CancellationToken,
) -> Result<(), CliError> {
    Err(CliError::TransportUnavailable)
}

/// Ctrl-C stops the batch between modules; a module already in flight
/// finishes its session first.
fn cancel_on_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, finishing the current module");
            cancel.cancel();
        }
    });
}

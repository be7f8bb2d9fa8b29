//! Command dispatch: bridges CLI args -> fleet operations -> output formatting.

pub mod config_cmd;
pub mod fleet;

use lumifly_api::DeviceTransport;
use lumifly_core::{CancellationToken, CommandTarget, FleetController, WritePlan};

use crate::cli::{Command, GlobalOpts, PolicyArgs};
use crate::error::CliError;
use crate::shell;

/// A fleet-bound command with its input already validated.
#[derive(Debug)]
pub enum Action {
    Probe,
    Read,
    Batch { plan: WritePlan, policy: PolicyArgs },
    Shell,
}

impl Action {
    /// Validate arguments up front so bad input never reaches a module.
    pub fn from_command(cmd: Command) -> Result<Self, CliError> {
        Ok(match cmd {
            Command::Probe => Self::Probe,
            Command::Read => Self::Read,
            Command::Off(policy) => Self::batch(WritePlan::Full(CommandTarget::all_off()), policy)?,
            Command::On(policy) => Self::batch(WritePlan::Full(CommandTarget::all_on()), policy)?,
            Command::Set(args) => {
                Self::batch(fleet::set_plan(args.dim, args.relays.is_on())?, args.policy)?
            }
            Command::Relays(args) => Self::batch(
                WritePlan::RelaysOnly {
                    state: args.state.is_on(),
                },
                args.policy,
            )?,
            Command::Shell => Self::Shell,
            // Config and Completions are handled before dispatch
            Command::Config(_) | Command::Completions(_) => unreachable!(),
        })
    }

    fn batch(plan: WritePlan, policy: PolicyArgs) -> Result<Self, CliError> {
        policy.policy()?;
        Ok(Self::Batch { plan, policy })
    }
}

/// Dispatch a fleet-bound action to the appropriate handler.
pub async fn dispatch<T: DeviceTransport>(
    action: Action,
    controller: &FleetController<T>,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    match action {
        Action::Probe => fleet::probe(controller, global).await,
        Action::Read => fleet::read(controller, global).await,
        Action::Batch { plan, policy } => {
            fleet::batch(controller, plan, &policy, global, cancel).await
        }
        Action::Shell => shell::run(controller, global, cancel).await,
    }
}

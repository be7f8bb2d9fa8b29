//! Interactive menu over the fleet operations.
//!
//! Numeric input is validated in the prompt itself, so an out-of-range
//! brightness or delay is rejected and asked for again before anything is
//! sent. The controller lives for the whole session; in simulated mode the
//! modules keep their state between menu picks.

use std::io::{self, IsTerminal};

use dialoguer::{Input, Select};
use lumifly_api::DeviceTransport;
use lumifly_core::{
    CancellationToken, CommandTarget, DimLevel, ExecutionPolicy, FleetController, WritePlan,
};

use crate::cli::GlobalOpts;
use crate::commands::fleet;
use crate::error::CliError;
use crate::gate::OperatorGate;

const MENU: [&str; 9] = [
    "1: Check module availability",
    "2: Read current values",
    "3: All off",
    "4: All on",
    "5: Set all at once to a brightness",
    "6: Set all timed to a brightness",
    "7: Set all stepped, confirming each module",
    "8: Switch relays only",
    "0: Exit",
];

pub async fn run<T: DeviceTransport>(
    controller: &FleetController<T>,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    if !io::stdin().is_terminal() {
        return Err(CliError::NeedsTerminal {
            what: "The shell".into(),
        });
    }

    println!(
        "lumifly shell: {} modules, {} at a time",
        controller.registry().len(),
        controller.options().concurrency
    );

    while !cancel.is_cancelled() {
        let choice = Select::new()
            .with_prompt("Select a mode")
            .items(&MENU)
            .default(0)
            .interact()?;

        let result = match choice {
            0 => fleet::probe(controller, global).await,
            1 => fleet::read(controller, global).await,
            2 => {
                let plan = WritePlan::Full(CommandTarget::all_off());
                run_plan(controller, plan, ExecutionPolicy::Atomic, global, cancel).await
            }
            3 => {
                let plan = WritePlan::Full(CommandTarget::all_on());
                run_plan(controller, plan, ExecutionPolicy::Atomic, global, cancel).await
            }
            4 => {
                let plan = WritePlan::Full(ask_target()?);
                run_plan(controller, plan, ExecutionPolicy::Atomic, global, cancel).await
            }
            5 => {
                let plan = WritePlan::Full(ask_target()?);
                let policy = ask_delay()?;
                run_plan(controller, plan, policy, global, cancel).await
            }
            6 => {
                let plan = WritePlan::Full(ask_target()?);
                run_plan(controller, plan, ExecutionPolicy::ManualStepped, global, cancel).await
            }
            7 => {
                let plan = WritePlan::RelaysOnly {
                    state: ask_relays()?,
                };
                run_plan(controller, plan, ExecutionPolicy::Atomic, global, cancel).await
            }
            _ => break,
        };

        // Failed modules are already in the report; the menu keeps going.
        if let Err(err) = result {
            eprintln!("{:?}", miette::Report::new(err));
        }
    }

    println!("Exiting lumifly shell.");
    Ok(())
}

async fn run_plan<T: DeviceTransport>(
    controller: &FleetController<T>,
    plan: WritePlan,
    policy: ExecutionPolicy,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let gate = if policy.is_manual() {
        OperatorGate::Terminal
    } else {
        OperatorGate::Auto
    };
    fleet::execute(controller, plan, policy, gate, global, cancel).await
}

// ── Prompts ──────────────────────────────────────────────────────────

fn ask_target() -> Result<CommandTarget, CliError> {
    let raw: i64 = Input::new()
        .with_prompt(format!("Brightness (0-{})", DimLevel::MAX_RAW))
        .validate_with(|value: &i64| -> Result<(), String> {
            DimLevel::new(*value).map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()?;
    Ok(CommandTarget::new(raw, true)?)
}

fn ask_delay() -> Result<ExecutionPolicy, CliError> {
    let secs: f64 = Input::new()
        .with_prompt("Delay between modules (seconds)")
        .validate_with(|value: &f64| -> Result<(), String> {
            ExecutionPolicy::delayed_secs(*value)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()?;
    Ok(ExecutionPolicy::delayed_secs(secs)?)
}

fn ask_relays() -> Result<bool, CliError> {
    let choice = Select::new()
        .with_prompt("Relays")
        .items(&["on", "off"])
        .default(0)
        .interact()?;
    Ok(choice == 0)
}

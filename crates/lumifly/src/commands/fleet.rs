//! Fleet command handlers: probe, read, and the batch writes.

use std::io::{self, IsTerminal};

use lumifly_api::DeviceTransport;
use lumifly_core::{
    BatchReport, CancellationToken, CommandTarget, ExecutionPolicy, FleetController, WritePlan,
};

use crate::cli::{GlobalOpts, PolicyArgs};
use crate::error::CliError;
use crate::gate::OperatorGate;
use crate::output;

pub async fn probe<T: DeviceTransport>(
    controller: &FleetController<T>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let report = controller.probe().await;
    output::print_output(&output::render_probe(&global.output, &report), global.quiet);
    if report.reachable().is_empty() {
        return Err(CliError::NoReachableDevices);
    }
    Ok(())
}

pub async fn read<T: DeviceTransport>(
    controller: &FleetController<T>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let report = controller.read_all().await;
    output::print_output(&output::render_read(&global.output, &report), global.quiet);
    match report.failed() {
        0 => Ok(()),
        failed if report.succeeded() == 0 => {
            tracing::debug!(failed, "no module could be read");
            Err(CliError::NoReachableDevices)
        }
        failed => Err(CliError::PartialFailure {
            operation: "read".into(),
            failed,
            total: report.outcomes.len(),
        }),
    }
}

/// `off`, `on`, `set`, `relays`: confirm, run, report.
pub async fn batch<T: DeviceTransport>(
    controller: &FleetController<T>,
    plan: WritePlan,
    args: &PolicyArgs,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let policy = args.policy()?;
    let Some(gate) = choose_gate(plan, policy, controller.registry().len(), global)? else {
        output::print_output("Nothing changed.", global.quiet);
        return Ok(());
    };
    execute(controller, plan, policy, gate, global, cancel).await
}

/// Validate `set` input before anything else happens.
pub fn set_plan(dim: i64, relays: bool) -> Result<WritePlan, CliError> {
    Ok(WritePlan::Full(CommandTarget::new(dim, relays)?))
}

/// Run a plan and render its report. Shared with the interactive shell.
pub async fn execute<T: DeviceTransport>(
    controller: &FleetController<T>,
    plan: WritePlan,
    policy: ExecutionPolicy,
    gate: OperatorGate,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let report = match plan {
        WritePlan::Full(target) => controller.apply(target, policy, &gate, cancel).await,
        WritePlan::RelaysOnly { state } => {
            controller.apply_relays(state, policy, &gate, cancel).await
        }
    };
    let color = output::should_color(&global.color);
    output::print_output(
        &output::render_batch(&global.output, &report, color),
        global.quiet,
    );
    outcome(&report)
}

/// Pick the gate for `policy`, asking for an upfront go-ahead on
/// unattended batches. `None` means the operator declined.
fn choose_gate(
    plan: WritePlan,
    policy: ExecutionPolicy,
    total: usize,
    global: &GlobalOpts,
) -> Result<Option<OperatorGate>, CliError> {
    let interactive = io::stdin().is_terminal();
    if policy.is_manual() {
        if !interactive {
            return Err(CliError::NeedsTerminal {
                what: "Manual stepping".into(),
            });
        }
        return Ok(Some(OperatorGate::Terminal));
    }
    if global.yes {
        return Ok(Some(OperatorGate::Auto));
    }
    let action = format!("{plan} on {total} modules ({policy})");
    if !interactive {
        return Err(CliError::NonInteractiveRequiresYes { action });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(format!("Apply {action}?"))
        .default(false)
        .interact()?;
    Ok(confirmed.then_some(OperatorGate::Auto))
}

/// Exit status of a finished batch.
fn outcome(report: &BatchReport) -> Result<(), CliError> {
    let summary = report.summary();
    if summary.failed() == 0 {
        return Ok(());
    }
    let all_unreachable = summary.succeeded == 0
        && report
            .outcomes
            .iter()
            .filter_map(|o| o.error())
            .all(lumifly_core::DeviceError::is_connection);
    if all_unreachable && summary.skipped == 0 {
        return Err(CliError::NoReachableDevices);
    }
    Err(CliError::PartialFailure {
        operation: report.plan.to_string(),
        failed: summary.failed(),
        total: report.outcomes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_set_is_a_usage_error() {
        for dim in [-1, 10_001] {
            let err = set_plan(dim, true).err();
            assert!(
                matches!(err, Some(CliError::Validation { .. })),
                "dim {dim} should be rejected"
            );
        }
        assert!(set_plan(0, false).is_ok());
        assert!(set_plan(10_000, true).is_ok());
    }
}

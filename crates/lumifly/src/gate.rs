//! Operator confirmation for manual-stepped batches.

use dialoguer::Select;
use lumifly_core::{Confirmation, ConfirmationGate, DeviceDescriptor};
use tracing::warn;

const CHOICES: [&str; 3] = ["Proceed", "Skip this module", "Abort the batch"];

/// Gate handed to the actuator by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorGate {
    /// Never asks; used for atomic and delayed batches.
    Auto,
    /// Prompts on the terminal before every module.
    Terminal,
}

impl ConfirmationGate for OperatorGate {
    async fn confirm(&self, index: usize, total: usize, device: &DeviceDescriptor) -> Confirmation {
        match self {
            Self::Auto => Confirmation::Proceed,
            Self::Terminal => prompt(format!("[{}/{total}] {device}", index + 1)).await,
        }
    }
}

// The prompt blocks on stdin, so it runs on the blocking pool.
async fn prompt(message: String) -> Confirmation {
    let answer = tokio::task::spawn_blocking(move || {
        Select::new()
            .with_prompt(message)
            .items(&CHOICES)
            .default(0)
            .interact()
    })
    .await;

    match answer {
        Ok(Ok(0)) => Confirmation::Proceed,
        Ok(Ok(1)) => Confirmation::Skip,
        Ok(Ok(_)) => Confirmation::Abort,
        Ok(Err(error)) => {
            warn!(%error, "confirmation prompt failed, aborting");
            Confirmation::Abort
        }
        Err(error) => {
            warn!(%error, "confirmation prompt task failed, aborting");
            Confirmation::Abort
        }
    }
}

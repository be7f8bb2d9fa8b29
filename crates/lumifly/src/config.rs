//! Roster resolution for fleet commands: config file, sample fallback in
//! simulated mode, and CLI flag overrides.

use std::path::PathBuf;
use std::time::Duration;

use lumifly_api::{ModuleSpec, SimulatedFleet};
use lumifly_config::{Config, ConfigError, SAMPLE_BASE_PORT, SAMPLE_DEVICE_COUNT};
use lumifly_core::{FleetOptions, FleetRegistry};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// `--config` / `LUMIFLY_CONFIG`, else the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(lumifly_config::config_path)
}

/// Load the roster. Without a file, simulated mode falls back to the
/// sample roster so it runs out of the box.
pub fn load_roster(global: &GlobalOpts) -> Result<Config, CliError> {
    match lumifly_config::load_config_from(&config_file(global)) {
        Ok(cfg) => Ok(cfg),
        Err(ConfigError::NotFound { .. }) if global.simulate => {
            tracing::info!("no roster file, using the sample roster");
            Ok(Config::sample(
                "localhost",
                SAMPLE_BASE_PORT,
                SAMPLE_DEVICE_COUNT,
            ))
        }
        Err(e) => Err(e.into()),
    }
}

/// Build the registry and runtime options, applying flag overrides.
pub fn resolve_fleet(global: &GlobalOpts) -> Result<(FleetRegistry, FleetOptions), CliError> {
    let cfg = load_roster(global)?;
    let registry = cfg.registry()?;
    let mut options = cfg.fleet_options()?;

    if let Some(secs) = global.timeout {
        if secs == 0 {
            return Err(CliError::Validation {
                field: "timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        options.timeout = Duration::from_secs(secs);
    }
    if let Some(concurrency) = global.concurrency {
        if concurrency == 0 {
            return Err(CliError::Validation {
                field: "concurrency".into(),
                reason: "must be at least 1".into(),
            });
        }
        options.concurrency = concurrency;
    }
    Ok((registry, options))
}

/// In-process fleet with one module per roster entry, laid out at the
/// entry's addresses. Endpoints in `offline` get no module and fail to
/// connect.
pub fn simulated_fleet(registry: &FleetRegistry, offline: &[String]) -> SimulatedFleet {
    let key = |endpoint: &str| endpoint.trim().trim_end_matches('/').to_owned();
    let offline: Vec<String> = offline.iter().map(|e| key(e)).collect();
    let fleet = SimulatedFleet::new();
    for device in registry {
        if offline.contains(&key(&device.endpoint)) {
            continue;
        }
        let [dimmer, front, back] = device.node_ids.clone();
        fleet.add_module(
            &device.endpoint,
            ModuleSpec::new(device.namespace).with_ids(dimmer, front, back),
        );
    }
    fleet
}

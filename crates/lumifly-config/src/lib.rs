//! Fleet configuration for lumifly.
//!
//! A TOML roster (`fleet.toml`) layered with `LUMIFLY_` environment
//! overrides, validated into a `lumifly_core::FleetRegistry` before any
//! device is contacted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lumifly_core::{CoreError, DeviceDescriptor, FleetOptions, FleetRegistry};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "LUMIFLY_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("invalid fleet roster: {0}")]
    Registry(#[from] CoreError),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level `fleet.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    /// Devices in fleet order.
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

/// Values applied to every device that does not override them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// Bound on each connect/read/write/disconnect call, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Devices in flight at once; 1 is strictly sequential.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_dimmer_id")]
    pub dimmer_id: String,

    #[serde(default = "default_front_id")]
    pub front_id: String,

    #[serde(default = "default_back_id")]
    pub back_id: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            concurrency: default_concurrency(),
            namespace: default_namespace(),
            dimmer_id: default_dimmer_id(),
            front_id: default_front_id(),
            back_id: default_back_id(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}
fn default_concurrency() -> usize {
    1
}
fn default_namespace() -> String {
    "ns=2".into()
}
fn default_dimmer_id() -> String {
    "i=2".into()
}
fn default_front_id() -> String {
    "i=3".into()
}
fn default_back_id() -> String {
    "i=4".into()
}

/// One `[[devices]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceEntry {
    /// Optional label shown in reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// OPC-UA endpoint, e.g. `opc.tcp://10.0.0.5:4840/`.
    pub endpoint: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimmer_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_id: Option<String>,
}

impl DeviceEntry {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            name: None,
            endpoint: endpoint.into(),
            namespace: None,
            dimmer_id: None,
            front_id: None,
            back_id: None,
        }
    }
}

// ── Validation ──────────────────────────────────────────────────────

impl Config {
    /// Validate every device and build the registry.
    ///
    /// Errors name the device index and field, e.g. `devices[3].front_id`.
    pub fn registry(&self) -> Result<FleetRegistry, ConfigError> {
        let devices = self
            .devices
            .iter()
            .enumerate()
            .map(|(index, entry)| self.descriptor(index, entry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FleetRegistry::new(devices)?)
    }

    fn descriptor(
        &self,
        index: usize,
        entry: &DeviceEntry,
    ) -> Result<DeviceDescriptor, ConfigError> {
        validate_endpoint(index, &entry.endpoint)?;
        let d = &self.defaults;
        let pick = |value: &Option<String>, fallback: &str| -> String {
            value.clone().unwrap_or_else(|| fallback.to_owned())
        };
        let namespace = pick(&entry.namespace, &d.namespace);
        let ids = [
            pick(&entry.dimmer_id, &d.dimmer_id),
            pick(&entry.front_id, &d.front_id),
            pick(&entry.back_id, &d.back_id),
        ];
        let descriptor = DeviceDescriptor::parse(
            &entry.endpoint,
            &namespace,
            [ids[0].as_str(), ids[1].as_str(), ids[2].as_str()],
        )
        .map_err(|err| match err {
            CoreError::InvalidDescriptor { field, reason, .. } => ConfigError::Validation {
                field: format!("devices[{index}].{field}"),
                reason,
            },
            other => ConfigError::Registry(other),
        })?;
        Ok(match &entry.name {
            Some(name) => descriptor.with_name(name.clone()),
            None => descriptor,
        })
    }

    /// Runtime options from `[defaults]`.
    pub fn fleet_options(&self) -> Result<FleetOptions, ConfigError> {
        if self.defaults.timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "defaults.timeout_secs".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.defaults.concurrency == 0 {
            return Err(ConfigError::Validation {
                field: "defaults.concurrency".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(FleetOptions {
            timeout: Duration::from_secs(self.defaults.timeout_secs),
            concurrency: self.defaults.concurrency,
        })
    }

    /// Roster of `count` devices on consecutive ports of `host`.
    pub fn sample(host: &str, base_port: u16, count: usize) -> Self {
        let devices = (0..count)
            .map_while(|i| {
                let port = u16::try_from(i).ok().and_then(|i| base_port.checked_add(i))?;
                let mut entry = DeviceEntry::new(format!("opc.tcp://{host}:{port}/"));
                entry.name = Some(format!("module-{}", i + 1));
                Some(entry)
            })
            .collect();
        Self {
            defaults: Defaults::default(),
            devices,
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn validate_endpoint(index: usize, endpoint: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Validation {
        field: format!("devices[{index}].endpoint"),
        reason,
    };
    let url =
        url::Url::parse(endpoint.trim()).map_err(|e| invalid(format!("'{endpoint}': {e}")))?;
    if url.scheme() != "opc.tcp" {
        return Err(invalid(format!("expected scheme opc.tcp, got '{}'", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid(format!("'{endpoint}' has no host")));
    }
    Ok(())
}

// ── Defaults for sample rosters ─────────────────────────────────────

/// Number of devices in the generated sample roster.
pub const SAMPLE_DEVICE_COUNT: usize = 12;
/// First port of the generated sample roster.
pub const SAMPLE_BASE_PORT: u16 = 4840;

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "lumifly", "lumifly").map_or_else(
        || PathBuf::from(".").join("fleet.toml"),
        |dirs| dirs.config_dir().join("fleet.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load `path`, layered over defaults and under `LUMIFLY_` environment
/// overrides (`__` separates nested keys, e.g. `LUMIFLY_DEFAULTS__TIMEOUT_SECS`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LUMIFLY_").split("__"))
        .extract()?;
    Ok(config)
}

/// Load from the canonical path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`, creating parents.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, cfg.to_toml()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ROSTER: &str = r#"
        [defaults]
        timeout_secs = 3
        concurrency = 2

        [[devices]]
        name = "hall-1"
        endpoint = "opc.tcp://localhost:4840/"

        [[devices]]
        endpoint = "opc.tcp://localhost:4841/"
        namespace = "ns=3;"
        dimmer_id = "s=Lamp.Dim"
    "#;

    fn write(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fleet.toml");
        std::fs::write(&path, body).expect("write roster");
        path
    }

    #[test]
    fn loads_roster_and_applies_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from(&write(&dir, ROSTER)).expect("load");
        let registry = config.registry().expect("valid roster");

        assert_eq!(registry.len(), 2);
        let first = registry.get(0).expect("first");
        assert_eq!(first.label(), "hall-1");
        assert_eq!(first.dimmer().to_string(), "ns=2;i=2");
        let second = registry.get(1).expect("second");
        assert_eq!(second.dimmer().to_string(), "ns=3;s=Lamp.Dim");
        assert_eq!(second.back().to_string(), "ns=3;i=4");

        let options = config.fleet_options().expect("options");
        assert_eq!(options.timeout, Duration::from_secs(3));
        assert_eq!(options.concurrency, 2);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_config_from(&dir.path().join("absent.toml")).expect_err("missing");
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn malformed_identifier_names_device_and_field() {
        let mut config = Config::sample("localhost", 4840, 3);
        config.devices[1].front_id = Some("i=front".into());
        let err = config.registry().expect_err("bad id");
        let ConfigError::Validation { field, .. } = &err else {
            panic!("unexpected {err:?}");
        };
        assert_eq!(field, "devices[1].front_id");
    }

    #[test]
    fn endpoint_must_be_opc_tcp() {
        for bad in ["http://localhost:4840", "not a url", "opc.tcp://"] {
            let mut config = Config::sample("localhost", 4840, 1);
            config.devices[0].endpoint = bad.into();
            let err = config.registry().expect_err(bad);
            assert!(
                matches!(&err, ConfigError::Validation { field, .. } if field == "devices[0].endpoint"),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn empty_and_duplicate_rosters_are_rejected() {
        let err = Config::default().registry().expect_err("empty");
        assert!(matches!(err, ConfigError::Registry(CoreError::EmptyRegistry)));

        let mut config = Config::sample("localhost", 4840, 2);
        config.devices[1].endpoint = "opc.tcp://localhost:4840".into();
        let err = config.registry().expect_err("duplicate");
        assert!(matches!(
            err,
            ConfigError::Registry(CoreError::DuplicateDevice { first: 0, second: 1, .. })
        ));
    }

    #[test]
    fn zero_timeout_or_concurrency_is_rejected() {
        let mut config = Config::sample("localhost", 4840, 1);
        config.defaults.timeout_secs = 0;
        assert!(config.fleet_options().is_err());
        config.defaults.timeout_secs = 5;
        config.defaults.concurrency = 0;
        assert!(config.fleet_options().is_err());
    }

    #[test]
    fn sample_roster_matches_default_layout() {
        let config = Config::sample("localhost", SAMPLE_BASE_PORT, SAMPLE_DEVICE_COUNT);
        let registry = config.registry().expect("sample is valid");
        assert_eq!(registry.len(), 12);
        let endpoint = |i: usize| registry.get(i).map(|d| d.endpoint.as_str());
        assert_eq!(endpoint(0), Some("opc.tcp://localhost:4840/"));
        assert_eq!(endpoint(11), Some("opc.tcp://localhost:4851/"));
    }

    #[test]
    fn save_then_load_preserves_roster() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("fleet.toml");
        let config = Config::sample("10.0.0.5", 4840, 2);
        save_config_to(&config, &path).expect("save");
        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded, config);
    }
}

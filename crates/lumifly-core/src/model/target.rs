// ── Command targets ──
//
// Desired fleet state for one batch. Dim levels are validated at
// construction so an out-of-domain value can never reach a session.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CoreError;

/// Dimmer level in controller units, always within `0..=10000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DimLevel(u16);

impl DimLevel {
    pub const MAX_RAW: u16 = 10_000;
    pub const OFF: Self = Self(0);
    pub const FULL: Self = Self(Self::MAX_RAW);

    pub fn new(raw: i64) -> Result<Self, CoreError> {
        u16::try_from(raw)
            .ok()
            .filter(|v| *v <= Self::MAX_RAW)
            .map(Self)
            .ok_or_else(|| {
                CoreError::input(
                    "dim",
                    format!("{raw} is outside 0..={}", Self::MAX_RAW),
                )
            })
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<i64> for DimLevel {
    type Error = CoreError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl FromStr for DimLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .trim()
            .parse::<i64>()
            .map_err(|_| CoreError::input("dim", format!("'{s}' is not an integer")))?;
        Self::new(raw)
    }
}

impl fmt::Display for DimLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Desired state for every device in a full batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandTarget {
    pub dim: DimLevel,
    pub relays: bool,
}

impl CommandTarget {
    /// Validate raw input into a target.
    pub fn new(dim: i64, relays: bool) -> Result<Self, CoreError> {
        Ok(Self {
            dim: DimLevel::new(dim)?,
            relays,
        })
    }

    /// Dimmer at zero, relays open.
    pub const fn all_off() -> Self {
        Self {
            dim: DimLevel::OFF,
            relays: false,
        }
    }

    /// Dimmer at full scale, relays closed.
    pub const fn all_on() -> Self {
        Self {
            dim: DimLevel::FULL,
            relays: true,
        }
    }
}

impl fmt::Display for CommandTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let relays = if self.relays { "on" } else { "off" };
        write!(f, "dim={} relays={relays}", self.dim)
    }
}

/// What a batch writes to each device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WritePlan {
    /// Dimmer, then front relay, then back relay.
    Full(CommandTarget),
    /// Front and back relays only; the dimmer is left untouched.
    RelaysOnly { state: bool },
}

impl WritePlan {
    pub fn relay_state(&self) -> bool {
        match self {
            Self::Full(target) => target.relays,
            Self::RelaysOnly { state } => *state,
        }
    }

    pub fn dim(&self) -> Option<DimLevel> {
        match self {
            Self::Full(target) => Some(target.dim),
            Self::RelaysOnly { .. } => None,
        }
    }
}

impl fmt::Display for WritePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(target) => target.fmt(f),
            Self::RelaysOnly { state } => {
                write!(f, "relays={}", if *state { "on" } else { "off" })
            }
        }
    }
}

// ── Node addressing ──
//
// An OPC-UA field is addressed by a namespace index plus an identifier
// (`ns=2;i=3`). Rosters carry the two halves separately, so both parse on
// their own and join into a `NodeAddress` at the session boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Rejected namespace or node identifier text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid namespace '{raw}': {reason}")]
    Namespace { raw: String, reason: String },

    #[error("invalid node identifier '{raw}': {reason}")]
    Identifier { raw: String, reason: String },
}

// ── Namespace ───────────────────────────────────────────────────────

/// Namespace qualifier (`ns=<index>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(u16);

impl Namespace {
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    pub fn index(self) -> u16 {
        self.0
    }

    /// Parse `ns=2`. A trailing `;` (as written in legacy rosters) is accepted.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let err = |reason: &str| AddressError::Namespace {
            raw: raw.to_owned(),
            reason: reason.to_owned(),
        };
        let trimmed = raw.trim();
        let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed);
        let digits = trimmed
            .strip_prefix("ns=")
            .ok_or_else(|| err("expected the form ns=<index>"))?;
        digits
            .parse::<u16>()
            .map(Self)
            .map_err(|_| err("index must be an integer in 0..=65535"))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={}", self.0)
    }
}

impl FromStr for Namespace {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Namespace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── NodeIdentifier ──────────────────────────────────────────────────

/// Identifier half of a node address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeIdentifier {
    /// `i=<u32>`
    Numeric(u32),
    /// `s=<text>`
    String(String),
    /// `g=<guid>`
    Guid(String),
    /// `b=<base64>`
    Opaque(String),
}

impl NodeIdentifier {
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let err = |reason: &str| AddressError::Identifier {
            raw: raw.to_owned(),
            reason: reason.to_owned(),
        };
        let trimmed = raw.trim();
        let Some((kind, body)) = trimmed.split_once('=') else {
            return Err(err("expected one of i=, s=, g=, b="));
        };
        if body.is_empty() {
            return Err(err("identifier body is empty"));
        }
        match kind {
            "i" => body
                .parse::<u32>()
                .map(Self::Numeric)
                .map_err(|_| err("numeric identifier must fit in u32")),
            "s" => Ok(Self::String(body.to_owned())),
            "g" if is_guid(body) => Ok(Self::Guid(body.to_ascii_lowercase())),
            "g" => Err(err("guid must look like 72962b91-fa75-4ae6-8d28-b404dc7daf63")),
            "b" => Ok(Self::Opaque(body.to_owned())),
            _ => Err(err("expected one of i=, s=, g=, b=")),
        }
    }
}

fn is_guid(body: &str) -> bool {
    let groups: Vec<&str> = body.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    groups.len() == lengths.len()
        && groups
            .iter()
            .zip(lengths)
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "i={n}"),
            Self::String(s) => write!(f, "s={s}"),
            Self::Guid(g) => write!(f, "g={g}"),
            Self::Opaque(b) => write!(f, "b={b}"),
        }
    }
}

impl FromStr for NodeIdentifier {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for NodeIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── NodeAddress ─────────────────────────────────────────────────────

/// Fully qualified node address, rendered as `ns=2;i=3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    pub namespace: Namespace,
    pub identifier: NodeIdentifier,
}

impl NodeAddress {
    pub fn new(namespace: Namespace, identifier: NodeIdentifier) -> Self {
        Self {
            namespace,
            identifier,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.namespace, self.identifier)
    }
}

impl Serialize for NodeAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── Core identity types ──
//
// Printers and floors are addressed by opaque string identifiers handed
// out by the backing store. The newtypes keep the two key spaces from
// being mixed up at compile time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;

// ── PrinterId ───────────────────────────────────────────────────────

/// Identifier of a printer in the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrinterId(String);

impl PrinterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrinterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PrinterId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for PrinterId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PrinterId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl CacheKey for PrinterId {
    fn is_valid_key(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

// ── FloorId ─────────────────────────────────────────────────────────

/// Identifier of a floor document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FloorId(String);

impl FloorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier, used by in-memory backing stores.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FloorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FloorId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FloorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl CacheKey for FloorId {
    fn is_valid_key(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

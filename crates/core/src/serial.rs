//! Serial-number value objects shared by every scan workflow.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A scanned serial/barcode identifier.
///
/// Always trimmed and non-empty. Construction from blank input fails
/// validation; callers treat a blank scan as a no-op before reaching the
/// domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerialCode(String);

impl SerialCode {
    pub fn new(raw: impl AsRef<str>) -> DomainResult<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("serial code cannot be blank"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SerialCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for SerialCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Linked item identity resolved from a serial code.
///
/// Absent on an entry when the directory lookup failed (fail-open insert).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub item_code: String,
    pub item_name: String,
}

impl ItemRef {
    pub fn new(item_code: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self {
            item_code: item_code.into(),
            item_name: item_name.into(),
        }
    }
}

/// Lifecycle status of a serial as reported by the registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialStatus {
    Active,
    Delivered,
    Inactive,
    Other,
}

/// Result of resolving a scanned code against the serial registry.
///
/// `Failed` carries the transport/backend failure text. It is surfaced as a
/// warning and the scan is still recorded; a physical scan is never lost to
/// a transport error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found {
        item: ItemRef,
        status: Option<SerialStatus>,
    },
    NotFound,
    Failed(String),
}

/// What to do with a new code the registry has no item for.
///
/// Selected per document kind as configuration, not branched in code:
/// custody intake records unresolved scans, stricter validation documents
/// reject them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedPolicy {
    /// Record the entry with empty item fields (fail-open).
    RecordUnresolved,
    /// Refuse the scan outright.
    RejectScan,
}

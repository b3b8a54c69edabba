use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use serialtrack_core::{ItemRef, SerialCode, TrackedEntry};

/// Signed unit count for a sale line.
///
/// `Sale` moves one unit out (+1), `Return` brings it back (-1). A line
/// only ever holds one of the two; reconciliation flips between them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QtySign {
    Sale,
    Return,
}

impl QtySign {
    /// The signed quantity as it appears on the document row.
    pub fn signed(&self) -> i8 {
        match self {
            QtySign::Sale => 1,
            QtySign::Return => -1,
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            QtySign::Sale => QtySign::Return,
            QtySign::Return => QtySign::Sale,
        }
    }
}

/// One row of a validation document, produced by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleEntry {
    pub code: SerialCode,
    /// Absent when the directory lookup failed and the scan was recorded
    /// fail-open.
    pub item: Option<ItemRef>,
    pub qty: QtySign,
    /// Time of scan, refreshed on the last sign change.
    pub scanned_at: DateTime<Utc>,
}

impl TrackedEntry for SaleEntry {
    fn code(&self) -> &SerialCode {
        &self.code
    }
}

use serde::{Deserialize, Serialize};

use serialtrack_core::{ItemRef, SerialCode};

use crate::entry::QtySign;

/// Why a fail-open entry was recorded without item identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnresolvedReason {
    /// The registry has no item for the code.
    NotFound,
    /// The lookup itself failed (transport/backend); surfaced to the
    /// operator as a warning, never fatal.
    LookupFailed(String),
}

/// Outcome of reconciling one scan against the current entry set.
///
/// The reconciler only decides; the caller applies the action to the
/// document (and from there to persistence). `Reject` and `Noop` leave the
/// entry set untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanAction {
    /// New code, item resolved, lifecycle allows use.
    Insert {
        code: SerialCode,
        item: ItemRef,
        qty: QtySign,
    },
    /// New code recorded with empty item fields (fail-open policy: a
    /// physical scan is never silently dropped).
    InsertUnresolved {
        code: SerialCode,
        reason: UnresolvedReason,
    },
    /// Existing entry's sign flips to `qty`.
    FlipQty { code: SerialCode, qty: QtySign },
    /// Scan refused outright.
    Reject { code: SerialCode, reason: String },
    /// Blank input, or a declined confirmation with no defined effect.
    Noop,
}

impl ScanAction {
    /// Whether applying this action can change the entry set.
    pub fn mutates(&self) -> bool {
        !matches!(self, ScanAction::Reject { .. } | ScanAction::Noop)
    }
}

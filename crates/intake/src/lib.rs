//! Sale/return scan intake (signed-quantity variant).
//!
//! A scanned serial either opens a new sale line, flips an existing line
//! between sale and return, or is refused. The [`reconciler`] decides; the
//! [`document`] aggregate applies the decision and enforces the set
//! boundaries (unique codes, no manual removal, frozen once finalized).

pub mod action;
pub mod document;
pub mod entry;
pub mod reconciler;

pub use action::{ScanAction, UnresolvedReason};
pub use document::{
    CancelDocument, DocumentStatus, FINALIZED_REASON, LinkOpeningSession, OpenDocument,
    RecordScan, RemoveEntry, SubmitDocument, ValidationCommand, ValidationDocument,
    ValidationDocumentId, ValidationEvent,
};
pub use entry::{QtySign, SaleEntry};
pub use reconciler::ScanReconciler;

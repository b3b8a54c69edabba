//! Customer item custody intake (status variant).
//!
//! Scans track items held on a customer's behalf: a new code takes the item
//! into custody, a rescan hands it back (or takes it again), always behind
//! an operator confirmation. Recording is fail-open by default — a physical
//! scan is kept even when the registry cannot resolve it.

pub mod custody;

pub use custody::{
    CancelCustody, CustodyAction, CustodyCommand, CustodyDocument, CustodyDocumentId,
    CustodyDocumentStatus, CustodyEntry, CustodyEvent, CustodyReconciler, CustodyStatus,
    OpenCustody, RecordCustodyScan, RemoveCustodyEntry, SubmitCustody,
};

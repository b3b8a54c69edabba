//! Daily item reconciliation: scanned serials vs invoiced quantities.
//!
//! At the end of a trading session, the serials physically scanned on
//! validation documents are compared against the quantities invoiced in the
//! closing entries. Any non-zero difference is shrinkage or a missed scan.

pub mod report;

pub use report::{DailyTracker, InvoicedItem, ScannedSerial, TrackerLine, scanned_from_document};

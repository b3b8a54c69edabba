//! Serial registry: directory lookups and serial number issuance.
//!
//! The directory is the external service scans are resolved against; the
//! reconcilers only ever see it through the [`SerialDirectory`] trait. The
//! generator side covers the receiving flow: issuing `PREFIX-ITEM-NNNN`
//! serials for goods-receipt lines and registering them as active.

pub mod directory;
pub mod generator;

pub use directory::{DirectoryRecord, InMemoryDirectory, SerialDirectory};
pub use generator::{ReceiptLine, SerialGenerator, serialise_receipt};

//! `serialtrack-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the error model, typed identifiers, aggregate traits, serial-number value
//! objects, and the ordered entry set that scan documents are built on.

pub mod aggregate;
pub mod confirm;
pub mod entry;
pub mod error;
pub mod id;
pub mod serial;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use confirm::ConfirmPrompt;
pub use entry::{EntrySet, TrackedEntry};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, OperatorId};
pub use serial::{ItemRef, LookupOutcome, SerialCode, SerialStatus, UnresolvedPolicy};

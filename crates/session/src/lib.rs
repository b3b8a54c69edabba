//! Document session: the caller side of the scan workflow.
//!
//! The domain crates decide and evolve; this crate owns everything around
//! them for one on-screen document: serializing scans (one at a time, one
//! suspend point at a time), re-arming the autosave timer on every change,
//! persisting snapshots through the store capability, and fanning applied
//! events out on the bus. Lifecycle entry points are named methods, not
//! dynamic event-name dispatch.

pub mod autosave;
pub mod gate;
pub mod session;
pub mod store;

pub use autosave::AutosaveScheduler;
pub use gate::{ScanGate, ScanPermit};
pub use session::{DocumentLifecycle, SessionConfig, SessionError, ValidationSession};
pub use store::{DocumentStore, InMemoryStore, StoreError};

//! Event/command mechanics for the scan-document domain.
//!
//! Documents decide (`handle`) and evolve (`apply`); this crate provides the
//! shared traits those decisions flow through, the envelope persisted per
//! event, and a lightweight pub/sub bus the session layer uses to fan
//! document events out to listeners (autosave, operator alerts).

pub mod bus;
pub mod command;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use command::Command;
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::InMemoryEventBus;

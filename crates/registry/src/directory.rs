//! Directory lookup capability and the in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use serialtrack_core::{ItemRef, LookupOutcome, SerialCode, SerialStatus};

/// Resolve a scanned code to item identity and lifecycle status.
///
/// Supplied by the external directory/registry service. The call is a
/// suspend point (it may block on a backend); the reconcilers treat it as a
/// single synchronous call and surface failures instead of retrying.
/// Adapters should impose their own timeout and report expiry as
/// [`LookupOutcome::Failed`].
pub trait SerialDirectory {
    fn lookup(&self, code: &SerialCode) -> LookupOutcome;
}

/// Closures double as directories, which keeps test setups terse.
impl<F> SerialDirectory for F
where
    F: Fn(&SerialCode) -> LookupOutcome,
{
    fn lookup(&self, code: &SerialCode) -> LookupOutcome {
        self(code)
    }
}

/// One registered serial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub item: ItemRef,
    pub status: SerialStatus,
}

/// In-memory serial directory for tests, dev sessions, and offline caches.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    records: RwLock<HashMap<SerialCode, DirectoryRecord>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or overwrite) a serial with its item identity and status.
    pub fn register(&self, code: SerialCode, item: ItemRef, status: SerialStatus) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(code, DirectoryRecord { item, status });
    }

    /// Update the lifecycle status of an already-registered serial.
    pub fn set_status(&self, code: &SerialCode, status: SerialStatus) -> bool {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        match records.get_mut(code) {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SerialDirectory for InMemoryDirectory {
    fn lookup(&self, code: &SerialCode) -> LookupOutcome {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        match records.get(code) {
            Some(record) => LookupOutcome::Found {
                item: record.item.clone(),
                status: Some(record.status),
            },
            None => LookupOutcome::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> SerialCode {
        SerialCode::new(s).unwrap()
    }

    #[test]
    fn registered_serial_resolves_with_item_and_status() {
        let directory = InMemoryDirectory::new();
        directory.register(
            code("SN001"),
            ItemRef::new("ITM1", "Espresso Machine"),
            SerialStatus::Active,
        );

        match directory.lookup(&code("SN001")) {
            LookupOutcome::Found { item, status } => {
                assert_eq!(item.item_code, "ITM1");
                assert_eq!(status, Some(SerialStatus::Active));
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn unknown_serial_is_not_found() {
        let directory = InMemoryDirectory::new();
        assert_eq!(directory.lookup(&code("SN404")), LookupOutcome::NotFound);
    }

    #[test]
    fn set_status_transitions_lifecycle() {
        let directory = InMemoryDirectory::new();
        directory.register(
            code("SN001"),
            ItemRef::new("ITM1", "Espresso Machine"),
            SerialStatus::Active,
        );

        assert!(directory.set_status(&code("SN001"), SerialStatus::Delivered));
        match directory.lookup(&code("SN001")) {
            LookupOutcome::Found { status, .. } => {
                assert_eq!(status, Some(SerialStatus::Delivered));
            }
            other => panic!("expected Found, got {other:?}"),
        }

        assert!(!directory.set_status(&code("SN404"), SerialStatus::Inactive));
    }
}

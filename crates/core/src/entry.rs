//! Ordered, code-keyed entry set backing every scan document.

use std::collections::HashMap;

use crate::error::{DomainError, DomainResult};
use crate::serial::SerialCode;

/// An entry that can live in an [`EntrySet`].
pub trait TrackedEntry {
    /// The serial code keying this entry. Must be stable for the entry's
    /// lifetime; the set's index is built on it.
    fn code(&self) -> &SerialCode;
}

/// Ordered sequence of entries, unique by serial code.
///
/// Iteration preserves insertion order (the order rows appeared on screen);
/// lookup by code goes through an index map. There is deliberately no
/// removal API: entries leave the set only when the owning document is
/// discarded. Manual removal is a policy violation rejected at the document
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySet<E> {
    entries: Vec<E>,
    index: HashMap<SerialCode, usize>,
}

impl<E: TrackedEntry> EntrySet<E> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, code: &SerialCode) -> bool {
        self.index.contains_key(code)
    }

    pub fn get(&self, code: &SerialCode) -> Option<&E> {
        self.index.get(code).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[E] {
        &self.entries
    }

    /// Append a new entry. Fails with a conflict if the code is already
    /// present — no two entries may share a code.
    pub fn insert(&mut self, entry: E) -> DomainResult<()> {
        let code = entry.code().clone();
        if self.index.contains_key(&code) {
            return Err(DomainError::conflict(format!(
                "serial {code} already recorded"
            )));
        }
        self.index.insert(code, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Mutate the entry for `code` in place.
    ///
    /// The closure must leave the entry's code untouched; the index is keyed
    /// on it.
    pub fn update(&mut self, code: &SerialCode, f: impl FnOnce(&mut E)) -> DomainResult<()> {
        match self.index.get(code) {
            Some(&i) => {
                f(&mut self.entries[i]);
                Ok(())
            }
            None => Err(DomainError::not_found()),
        }
    }
}

impl<E: TrackedEntry> Default for EntrySet<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestEntry {
        code: SerialCode,
        qty: i8,
    }

    impl TestEntry {
        fn new(code: &str, qty: i8) -> Self {
            Self {
                code: SerialCode::new(code).unwrap(),
                qty,
            }
        }
    }

    impl TrackedEntry for TestEntry {
        fn code(&self) -> &SerialCode {
            &self.code
        }
    }

    #[test]
    fn insert_preserves_scan_order() {
        let mut set = EntrySet::new();
        set.insert(TestEntry::new("B", 1)).unwrap();
        set.insert(TestEntry::new("A", 1)).unwrap();
        set.insert(TestEntry::new("C", 1)).unwrap();

        let codes: Vec<&str> = set.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["B", "A", "C"]);
    }

    #[test]
    fn duplicate_code_is_a_conflict() {
        let mut set = EntrySet::new();
        set.insert(TestEntry::new("SN1", 1)).unwrap();

        let err = set.insert(TestEntry::new("SN1", -1)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn update_mutates_entry_in_place() {
        let mut set = EntrySet::new();
        set.insert(TestEntry::new("SN1", 1)).unwrap();

        let code = SerialCode::new("SN1").unwrap();
        set.update(&code, |e| e.qty = -1).unwrap();
        assert_eq!(set.get(&code).unwrap().qty, -1);
    }

    #[test]
    fn update_missing_code_is_not_found() {
        let mut set: EntrySet<TestEntry> = EntrySet::new();
        let code = SerialCode::new("SN9").unwrap();
        assert_eq!(
            set.update(&code, |_| {}).unwrap_err(),
            DomainError::NotFound
        );
    }
}

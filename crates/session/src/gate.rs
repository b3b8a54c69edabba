//! Per-document single-flight scan gate.
//!
//! Scans arrive serially from one operator and one scanner, but a
//! double-triggered read or a stuck confirmation dialog can re-enter the
//! workflow. The gate admits at most one scan per document at a time; a
//! second scan while one is awaiting its lookup or confirmation is refused,
//! not queued.

use std::sync::Mutex;

use serialtrack_core::{DomainError, DomainResult};

/// Single-flight guard for one document's scan workflow.
#[derive(Debug, Default)]
pub struct ScanGate {
    in_flight: Mutex<Option<String>>,
}

/// Permit for one scan; releases the gate on drop.
#[derive(Debug)]
pub struct ScanPermit<'a> {
    gate: &'a ScanGate,
}

impl ScanGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a scan, or refuse it while another is in flight.
    pub fn begin(&self, raw_code: &str) -> DomainResult<ScanPermit<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(pending) = in_flight.as_deref() {
            return Err(DomainError::conflict(format!(
                "scan of {pending} is still awaiting confirmation"
            )));
        }

        *in_flight = Some(raw_code.trim().to_string());
        Ok(ScanPermit { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl Drop for ScanPermit<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .gate
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *in_flight = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_scan_is_refused_while_one_is_in_flight() {
        let gate = ScanGate::new();

        let permit = gate.begin("SN001").unwrap();
        assert!(gate.is_busy());

        let err = gate.begin("SN001").unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        // A different code is refused too; the document processes one scan
        // at a time.
        assert!(gate.begin("SN002").is_err());

        drop(permit);
        assert!(!gate.is_busy());
        assert!(gate.begin("SN002").is_ok());
    }

    #[test]
    fn refusal_names_the_pending_code() {
        let gate = ScanGate::new();
        let _permit = gate.begin("  SN001 ").unwrap();

        match gate.begin("SN002").unwrap_err() {
            DomainError::Conflict(msg) => assert!(msg.contains("SN001")),
            other => panic!("expected Conflict, got {other:?}"),
        }
    }
}

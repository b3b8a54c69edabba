//! Serial number issuance for the goods-receipt flow.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use serialtrack_core::{DomainResult, ItemRef, SerialCode, SerialStatus};

use crate::directory::InMemoryDirectory;

/// One line of a goods receipt awaiting serialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub item_code: String,
    pub item_name: String,
    pub qty: u32,
}

/// Issues serial numbers in the `{prefix}-{item_code}-{NNNN}` format with a
/// zero-padded, per-item sequence.
///
/// The sequence resumes from the last issued serial for an item; a
/// malformed tail restarts the sequence at 1 rather than failing the whole
/// receipt.
#[derive(Debug, Clone)]
pub struct SerialGenerator {
    prefix: String,
    next: HashMap<String, u32>,
}

impl SerialGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: HashMap::new(),
        }
    }

    /// Seed the sequence for `item_code` from the last serial the registry
    /// issued for it.
    pub fn resume_from(&mut self, item_code: &str, last_serial: &SerialCode) {
        let tail = last_serial.as_str().rsplit('-').next();
        let next = match tail.and_then(|t| t.parse::<u32>().ok()) {
            Some(n) => n + 1,
            None => 1,
        };
        self.next.insert(item_code.to_string(), next);
    }

    /// Issue the next serial for `item_code`.
    pub fn issue(&mut self, item_code: &str) -> DomainResult<SerialCode> {
        let counter = self.next.entry(item_code.to_string()).or_insert(1);
        let serial = format!("{}-{}-{:04}", self.prefix, item_code, counter);
        *counter += 1;
        SerialCode::new(serial)
    }
}

/// Generate serials for every receipt line and register them as active.
///
/// Lines with zero quantity are skipped. Returns the issued codes in line
/// order.
pub fn serialise_receipt(
    generator: &mut SerialGenerator,
    directory: &InMemoryDirectory,
    lines: &[ReceiptLine],
) -> DomainResult<Vec<SerialCode>> {
    let mut issued = Vec::new();

    for line in lines {
        if line.qty == 0 {
            continue;
        }
        for _ in 0..line.qty {
            let code = generator.issue(&line.item_code)?;
            directory.register(
                code.clone(),
                ItemRef::new(line.item_code.clone(), line.item_name.clone()),
                SerialStatus::Active,
            );
            issued.push(code);
        }
    }

    Ok(issued)
}

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use serialtrack_core::SerialCode;
use serialtrack_intake::ValidationDocument;

/// One scanned serial taken from a validation document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedSerial {
    pub item_code: String,
    pub item_name: String,
    pub serial_no: SerialCode,
}

/// One invoiced line taken from a closing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicedItem {
    pub item_code: String,
    pub item_name: String,
    pub qty: i64,
}

/// One report row: how many serials were scanned for an item vs how many
/// units were invoiced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerLine {
    pub item_code: String,
    pub item_name: String,
    pub serial_count: i64,
    pub invoice_count: i64,
    pub difference: i64,
}

/// The day's reconciliation report.
///
/// Rebuilding clears and refills the lines, so the report can be refreshed
/// whenever a closing entry lands without accumulating stale rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTracker {
    lines: Vec<TrackerLine>,
}

impl DailyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[TrackerLine] {
        &self.lines
    }

    /// Rows where the scanned and invoiced counts disagree.
    pub fn discrepancies(&self) -> impl Iterator<Item = &TrackerLine> {
        self.lines.iter().filter(|line| line.difference != 0)
    }

    /// Clear and refill the report from this session's scans and invoices.
    ///
    /// Serials are deduplicated per item before counting; invoice
    /// quantities are summed. Lines cover the union of item codes from both
    /// sides, ordered by item code; the item name comes from the serial
    /// side first, the invoice side as fallback.
    pub fn rebuild(&mut self, scanned: &[ScannedSerial], invoiced: &[InvoicedItem]) {
        struct SerialSide {
            item_name: String,
            serials: HashSet<SerialCode>,
        }

        let mut serial_items: BTreeMap<String, SerialSide> = BTreeMap::new();
        for scan in scanned {
            let side = serial_items
                .entry(scan.item_code.clone())
                .or_insert_with(|| SerialSide {
                    item_name: scan.item_name.clone(),
                    serials: HashSet::new(),
                });
            side.serials.insert(scan.serial_no.clone());
        }

        let mut invoice_items: BTreeMap<String, (String, i64)> = BTreeMap::new();
        for inv in invoiced {
            let entry = invoice_items
                .entry(inv.item_code.clone())
                .or_insert_with(|| (inv.item_name.clone(), 0));
            entry.1 += inv.qty;
        }

        let mut item_codes: BTreeMap<String, ()> = BTreeMap::new();
        item_codes.extend(serial_items.keys().cloned().map(|k| (k, ())));
        item_codes.extend(invoice_items.keys().cloned().map(|k| (k, ())));

        self.lines.clear();
        for item_code in item_codes.into_keys() {
            let serial_side = serial_items.get(&item_code);
            let invoice_side = invoice_items.get(&item_code);

            let serial_count = serial_side.map_or(0, |s| s.serials.len() as i64);
            let invoice_count = invoice_side.map_or(0, |(_, qty)| *qty);
            let item_name = serial_side
                .map(|s| s.item_name.clone())
                .filter(|name| !name.is_empty())
                .or_else(|| invoice_side.map(|(name, _)| name.clone()))
                .unwrap_or_default();

            self.lines.push(TrackerLine {
                item_code,
                item_name,
                serial_count,
                invoice_count,
                difference: serial_count - invoice_count,
            });
        }
    }
}

/// Pull the scanned-serial side of the report out of a validation document.
///
/// Unresolved entries are grouped under an empty item code, so missed
/// lookups still show up in the day's count instead of vanishing.
pub fn scanned_from_document(doc: &ValidationDocument) -> Vec<ScannedSerial> {
    doc.entries()
        .iter()
        .map(|entry| {
            let (item_code, item_name) = match &entry.item {
                Some(item) => (item.item_code.clone(), item.item_name.clone()),
                None => (String::new(), String::new()),
            };
            ScannedSerial {
                item_code,
                item_name,
                serial_no: entry.code.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> SerialCode {
        SerialCode::new(s).unwrap()
    }

    fn scan(item_code: &str, item_name: &str, serial: &str) -> ScannedSerial {
        ScannedSerial {
            item_code: item_code.into(),
            item_name: item_name.into(),
            serial_no: code(serial),
        }
    }

    fn invoice(item_code: &str, item_name: &str, qty: i64) -> InvoicedItem {
        InvoicedItem {
            item_code: item_code.into(),
            item_name: item_name.into(),
            qty,
        }
    }

    #[test]
    fn lines_cover_the_union_of_item_codes() {
        let mut tracker = DailyTracker::new();
        tracker.rebuild(
            &[scan("ITM1", "Espresso Machine", "SN1")],
            &[invoice("ITM2", "Grinder", 3)],
        );

        let codes: Vec<&str> = tracker.lines().iter().map(|l| l.item_code.as_str()).collect();
        assert_eq!(codes, vec!["ITM1", "ITM2"]);

        assert_eq!(tracker.lines()[0].serial_count, 1);
        assert_eq!(tracker.lines()[0].invoice_count, 0);
        assert_eq!(tracker.lines()[1].serial_count, 0);
        assert_eq!(tracker.lines()[1].invoice_count, 3);
    }

    #[test]
    fn duplicate_serials_count_once_per_item() {
        let mut tracker = DailyTracker::new();
        tracker.rebuild(
            &[
                scan("ITM1", "Espresso Machine", "SN1"),
                scan("ITM1", "Espresso Machine", "SN1"),
                scan("ITM1", "Espresso Machine", "SN2"),
            ],
            &[],
        );

        assert_eq!(tracker.lines()[0].serial_count, 2);
    }

    #[test]
    fn invoice_quantities_are_summed() {
        let mut tracker = DailyTracker::new();
        tracker.rebuild(
            &[],
            &[invoice("ITM1", "Espresso Machine", 2), invoice("ITM1", "Espresso Machine", 3)],
        );

        assert_eq!(tracker.lines()[0].invoice_count, 5);
        assert_eq!(tracker.lines()[0].difference, -5);
    }

    #[test]
    fn item_name_falls_back_to_invoice_side() {
        let mut tracker = DailyTracker::new();
        tracker.rebuild(
            &[scan("ITM1", "", "SN1")],
            &[invoice("ITM1", "Espresso Machine", 1)],
        );

        assert_eq!(tracker.lines()[0].item_name, "Espresso Machine");
        assert_eq!(tracker.lines()[0].difference, 0);
    }

    #[test]
    fn rebuild_replaces_previous_lines() {
        let mut tracker = DailyTracker::new();
        tracker.rebuild(&[scan("ITM1", "Espresso Machine", "SN1")], &[]);
        assert_eq!(tracker.lines().len(), 1);

        tracker.rebuild(&[scan("ITM2", "Grinder", "SN9")], &[]);
        let codes: Vec<&str> = tracker.lines().iter().map(|l| l.item_code.as_str()).collect();
        assert_eq!(codes, vec!["ITM2"]);
    }

    #[test]
    fn discrepancies_skip_balanced_lines() {
        let mut tracker = DailyTracker::new();
        tracker.rebuild(
            &[
                scan("ITM1", "Espresso Machine", "SN1"),
                scan("ITM2", "Grinder", "SN2"),
            ],
            &[invoice("ITM1", "Espresso Machine", 1), invoice("ITM2", "Grinder", 2)],
        );

        let off: Vec<&str> = tracker
            .discrepancies()
            .map(|l| l.item_code.as_str())
            .collect();
        assert_eq!(off, vec!["ITM2"]);
    }

    #[test]
    fn scanned_side_comes_out_of_a_validation_document() {
        use chrono::Utc;
        use serialtrack_core::{AggregateId, ItemRef, OperatorId};
        use serialtrack_events::execute;
        use serialtrack_intake::{
            OpenDocument, QtySign, RecordScan, ScanAction, UnresolvedReason, ValidationCommand,
            ValidationDocumentId,
        };

        let document_id = ValidationDocumentId::new(AggregateId::new());
        let mut doc = ValidationDocument::empty(document_id);
        execute(
            &mut doc,
            &ValidationCommand::OpenDocument(OpenDocument {
                document_id,
                operator_id: OperatorId::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        for (serial, item) in [("SN1", Some(("ITM1", "Espresso Machine"))), ("SN2", None)] {
            let action = match item {
                Some((item_code, item_name)) => ScanAction::Insert {
                    code: code(serial),
                    item: ItemRef::new(item_code, item_name),
                    qty: QtySign::Sale,
                },
                None => ScanAction::InsertUnresolved {
                    code: code(serial),
                    reason: UnresolvedReason::NotFound,
                },
            };
            execute(
                &mut doc,
                &ValidationCommand::RecordScan(RecordScan {
                    document_id,
                    action,
                    occurred_at: Utc::now(),
                }),
            )
            .unwrap();
        }

        let scanned = scanned_from_document(&doc);
        assert_eq!(scanned.len(), 2);
        assert_eq!(scanned[0].item_code, "ITM1");
        // Unresolved entries keep an empty item code so they still count.
        assert_eq!(scanned[1].item_code, "");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: lines are unique and sorted by item code, and each
            /// difference equals serial_count - invoice_count.
            #[test]
            fn report_lines_are_sorted_unique_and_balanced(
                scans in proptest::collection::vec(("[A-D]", "SN[0-9]{2}"), 0..30),
                invoices in proptest::collection::vec(("[A-E]", 0i64..5), 0..10),
            ) {
                let scanned: Vec<ScannedSerial> = scans
                    .iter()
                    .map(|(item, serial)| scan(item, "Item", serial))
                    .collect();
                let invoiced: Vec<InvoicedItem> = invoices
                    .iter()
                    .map(|(item, qty)| invoice(item, "Item", *qty))
                    .collect();

                let mut tracker = DailyTracker::new();
                tracker.rebuild(&scanned, &invoiced);

                let codes: Vec<&String> =
                    tracker.lines().iter().map(|l| &l.item_code).collect();
                let mut sorted = codes.clone();
                sorted.sort();
                sorted.dedup();
                prop_assert_eq!(&codes, &sorted);

                for line in tracker.lines() {
                    prop_assert_eq!(line.difference, line.serial_count - line.invoice_count);
                }
            }
        }
    }
}

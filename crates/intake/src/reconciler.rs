//! Scan reconciliation for sale/return documents.
//!
//! One scan in, one [`ScanAction`] out. The reconciler holds the lookup and
//! confirmation capabilities and is otherwise a pure decision over the
//! document's current entry set; applying the action is the caller's job.

use serialtrack_core::{ConfirmPrompt, LookupOutcome, SerialCode, SerialStatus, UnresolvedPolicy};
use serialtrack_registry::SerialDirectory;

use crate::action::{ScanAction, UnresolvedReason};
use crate::document::{FINALIZED_REASON, ValidationDocument};
use crate::entry::QtySign;

/// Decides what a scanned serial does to a validation document.
///
/// The state machine per code:
///
/// - absent, item active → insert as sale
/// - absent, item delivered → confirm; yes → insert as return, no → reject
/// - present as sale → confirm; yes → flip to return, no → noop
/// - present as return → flip to sale, no prompt (re-sale after a return is
///   reversible; sale→return reverses revenue and stays confirmed)
/// - finalized document → reject, fixed reason
pub struct ScanReconciler<'a, D: ?Sized, C: ?Sized> {
    directory: &'a D,
    prompt: &'a C,
    policy: UnresolvedPolicy,
}

impl<'a, D, C> ScanReconciler<'a, D, C>
where
    D: SerialDirectory + ?Sized,
    C: ConfirmPrompt + ?Sized,
{
    pub fn new(directory: &'a D, prompt: &'a C, policy: UnresolvedPolicy) -> Self {
        Self {
            directory,
            prompt,
            policy,
        }
    }

    pub fn policy(&self) -> UnresolvedPolicy {
        self.policy
    }

    /// Reconcile one scan against the document's current entries.
    ///
    /// Blank input is a no-op. Both capability calls are suspend points;
    /// callers serialize scans per document so at most one reconcile is in
    /// flight at a time.
    pub fn reconcile(&self, raw_code: &str, doc: &ValidationDocument) -> ScanAction {
        let Ok(code) = SerialCode::new(raw_code) else {
            return ScanAction::Noop;
        };

        if doc.is_finalized() {
            return ScanAction::Reject {
                code,
                reason: FINALIZED_REASON.to_string(),
            };
        }

        if let Some(entry) = doc.entries().get(&code) {
            return self.reconcile_existing(code, entry.qty);
        }

        self.reconcile_new(code)
    }

    fn reconcile_existing(&self, code: SerialCode, current: QtySign) -> ScanAction {
        match current {
            // Re-sale after a return, no prompt.
            QtySign::Return => ScanAction::FlipQty {
                code,
                qty: QtySign::Sale,
            },
            QtySign::Sale => {
                let prompt =
                    format!("Serial {code} already exists. Do you want to return this item?");
                if self.prompt.confirm(&prompt) {
                    ScanAction::FlipQty {
                        code,
                        qty: QtySign::Return,
                    }
                } else {
                    ScanAction::Noop
                }
            }
        }
    }

    fn reconcile_new(&self, code: SerialCode) -> ScanAction {
        match self.directory.lookup(&code) {
            LookupOutcome::Found { item, status } => match status {
                None | Some(SerialStatus::Active) => ScanAction::Insert {
                    code,
                    item,
                    qty: QtySign::Sale,
                },
                Some(SerialStatus::Delivered) => {
                    let prompt = format!(
                        "Serial {code} is already delivered. Treat this scan as a return?"
                    );
                    if self.prompt.confirm(&prompt) {
                        ScanAction::Insert {
                            code,
                            item,
                            qty: QtySign::Return,
                        }
                    } else {
                        ScanAction::Reject {
                            reason: format!("delivered serial {code} declined by operator"),
                            code,
                        }
                    }
                }
                Some(SerialStatus::Inactive) | Some(SerialStatus::Other) => ScanAction::Reject {
                    reason: format!("serial {code} is not available for use"),
                    code,
                },
            },
            LookupOutcome::NotFound => match self.policy {
                UnresolvedPolicy::RecordUnresolved => ScanAction::InsertUnresolved {
                    code,
                    reason: UnresolvedReason::NotFound,
                },
                UnresolvedPolicy::RejectScan => ScanAction::Reject {
                    reason: format!("no item found for serial {code}"),
                    code,
                },
            },
            // A transport failure never loses a physical scan, even under
            // the strict policy; only a definitive NotFound is rejected.
            LookupOutcome::Failed(reason) => ScanAction::InsertUnresolved {
                code,
                reason: UnresolvedReason::LookupFailed(reason),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use chrono::Utc;
    use serialtrack_core::{AggregateId, ItemRef, OperatorId};
    use serialtrack_events::execute;
    use serialtrack_registry::InMemoryDirectory;

    use crate::document::{
        OpenDocument, RecordScan, SubmitDocument, ValidationCommand, ValidationDocumentId,
    };

    /// Prompt double that counts invocations and answers a fixed value.
    struct CountingPrompt {
        answer: bool,
        asked: Cell<usize>,
    }

    impl CountingPrompt {
        fn answering(answer: bool) -> Self {
            Self {
                answer,
                asked: Cell::new(0),
            }
        }
    }

    impl ConfirmPrompt for CountingPrompt {
        fn confirm(&self, _prompt: &str) -> bool {
            self.asked.set(self.asked.get() + 1);
            self.answer
        }
    }

    fn code(s: &str) -> SerialCode {
        SerialCode::new(s).unwrap()
    }

    fn opened_document() -> ValidationDocument {
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
        doc
    }

    fn active_directory() -> InMemoryDirectory {
        let directory = InMemoryDirectory::new();
        directory.register(
            code("SN001"),
            ItemRef::new("ITM1", "Espresso Machine"),
            SerialStatus::Active,
        );
        directory
    }

    fn record(doc: &mut ValidationDocument, action: ScanAction) {
        execute(
            doc,
            &ValidationCommand::RecordScan(RecordScan {
                document_id: doc.id_typed(),
                action,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
    }

    #[test]
    fn new_active_serial_inserts_as_sale() {
        let directory = active_directory();
        let prompt = CountingPrompt::answering(true);
        let reconciler =
            ScanReconciler::new(&directory, &prompt, UnresolvedPolicy::RejectScan);
        let doc = opened_document();

        let action = reconciler.reconcile("SN001", &doc);

        assert_eq!(
            action,
            ScanAction::Insert {
                code: code("SN001"),
                item: ItemRef::new("ITM1", "Espresso Machine"),
                qty: QtySign::Sale,
            }
        );
        assert_eq!(prompt.asked.get(), 0);
    }

    #[test]
    fn blank_scan_is_a_noop() {
        let directory = active_directory();
        let prompt = CountingPrompt::answering(true);
        let reconciler =
            ScanReconciler::new(&directory, &prompt, UnresolvedPolicy::RejectScan);
        let doc = opened_document();

        assert_eq!(reconciler.reconcile("", &doc), ScanAction::Noop);
        assert_eq!(reconciler.reconcile("   \t", &doc), ScanAction::Noop);
        assert_eq!(prompt.asked.get(), 0);
    }

    #[test]
    fn rescanning_a_sale_prompts_and_flips_on_yes() {
        let directory = active_directory();
        let prompt = CountingPrompt::answering(true);
        let reconciler =
            ScanReconciler::new(&directory, &prompt, UnresolvedPolicy::RejectScan);
        let mut doc = opened_document();
        record(
            &mut doc,
            ScanAction::Insert {
                code: code("SN001"),
                item: ItemRef::new("ITM1", "Espresso Machine"),
                qty: QtySign::Sale,
            },
        );

        let action = reconciler.reconcile("SN001", &doc);

        assert_eq!(
            action,
            ScanAction::FlipQty {
                code: code("SN001"),
                qty: QtySign::Return,
            }
        );
        assert_eq!(prompt.asked.get(), 1);
    }

    #[test]
    fn rescanning_a_sale_leaves_entry_untouched_on_no() {
        let directory = active_directory();
        let prompt = CountingPrompt::answering(false);
        let reconciler =
            ScanReconciler::new(&directory, &prompt, UnresolvedPolicy::RejectScan);
        let mut doc = opened_document();
        record(
            &mut doc,
            ScanAction::Insert {
                code: code("SN001"),
                item: ItemRef::new("ITM1", "Espresso Machine"),
                qty: QtySign::Sale,
            },
        );
        let before = doc.clone();

        let action = reconciler.reconcile("SN001", &doc);
        assert_eq!(action, ScanAction::Noop);
        assert_eq!(prompt.asked.get(), 1);

        record(&mut doc, action);
        assert_eq!(doc, before);
    }

    #[test]
    fn rescanning_a_return_flips_to_sale_without_prompting() {
        let directory = active_directory();
        let prompt = CountingPrompt::answering(false);
        let reconciler =
            ScanReconciler::new(&directory, &prompt, UnresolvedPolicy::RejectScan);
        let mut doc = opened_document();
        record(
            &mut doc,
            ScanAction::Insert {
                code: code("SN001"),
                item: ItemRef::new("ITM1", "Espresso Machine"),
                qty: QtySign::Return,
            },
        );

        let action = reconciler.reconcile("SN001", &doc);

        assert_eq!(
            action,
            ScanAction::FlipQty {
                code: code("SN001"),
                qty: QtySign::Sale,
            }
        );
        assert_eq!(prompt.asked.get(), 0);
    }

    #[test]
    fn unknown_serial_is_rejected_under_strict_policy() {
        let directory = InMemoryDirectory::new();
        let prompt = CountingPrompt::answering(true);
        let reconciler =
            ScanReconciler::new(&directory, &prompt, UnresolvedPolicy::RejectScan);
        let doc = opened_document();

        match reconciler.reconcile("SN002", &doc) {
            ScanAction::Reject { code: c, reason } => {
                assert_eq!(c, code("SN002"));
                assert!(reason.contains("no item found"));
            }
            other => panic!("expected Reject, got {other:?}"),
        }
    }

    #[test]
    fn unknown_serial_is_recorded_under_fail_open_policy() {
        let directory = InMemoryDirectory::new();
        let prompt = CountingPrompt::answering(true);
        let reconciler =
            ScanReconciler::new(&directory, &prompt, UnresolvedPolicy::RecordUnresolved);
        let doc = opened_document();

        assert_eq!(
            reconciler.reconcile("SN002", &doc),
            ScanAction::InsertUnresolved {
                code: code("SN002"),
                reason: UnresolvedReason::NotFound,
            }
        );
    }

    #[test]
    fn lookup_failure_records_unresolved_even_under_strict_policy() {
        let failing = |_: &SerialCode| LookupOutcome::Failed("backend unreachable".into());
        let prompt = CountingPrompt::answering(true);
        let reconciler = ScanReconciler::new(&failing, &prompt, UnresolvedPolicy::RejectScan);
        let doc = opened_document();

        assert_eq!(
            reconciler.reconcile("SN003", &doc),
            ScanAction::InsertUnresolved {
                code: code("SN003"),
                reason: UnresolvedReason::LookupFailed("backend unreachable".into()),
            }
        );
    }

    #[test]
    fn delivered_serial_inserts_as_return_when_confirmed() {
        let directory = InMemoryDirectory::new();
        directory.register(
            code("SN004"),
            ItemRef::new("ITM2", "Grinder"),
            SerialStatus::Delivered,
        );
        let prompt = CountingPrompt::answering(true);
        let reconciler =
            ScanReconciler::new(&directory, &prompt, UnresolvedPolicy::RejectScan);
        let doc = opened_document();

        assert_eq!(
            reconciler.reconcile("SN004", &doc),
            ScanAction::Insert {
                code: code("SN004"),
                item: ItemRef::new("ITM2", "Grinder"),
                qty: QtySign::Return,
            }
        );
        assert_eq!(prompt.asked.get(), 1);
    }

    #[test]
    fn delivered_serial_is_rejected_when_declined() {
        let directory = InMemoryDirectory::new();
        directory.register(
            code("SN004"),
            ItemRef::new("ITM2", "Grinder"),
            SerialStatus::Delivered,
        );
        let prompt = CountingPrompt::answering(false);
        let reconciler =
            ScanReconciler::new(&directory, &prompt, UnresolvedPolicy::RejectScan);
        let doc = opened_document();

        match reconciler.reconcile("SN004", &doc) {
            ScanAction::Reject { reason, .. } => assert!(reason.contains("declined")),
            other => panic!("expected Reject, got {other:?}"),
        }
    }

    #[test]
    fn inactive_serial_is_rejected_without_prompting() {
        let directory = InMemoryDirectory::new();
        directory.register(
            code("SN005"),
            ItemRef::new("ITM3", "Kettle"),
            SerialStatus::Inactive,
        );
        let prompt = CountingPrompt::answering(true);
        let reconciler =
            ScanReconciler::new(&directory, &prompt, UnresolvedPolicy::RejectScan);
        let doc = opened_document();

        match reconciler.reconcile("SN005", &doc) {
            ScanAction::Reject { reason, .. } => {
                assert!(reason.contains("not available"));
            }
            other => panic!("expected Reject, got {other:?}"),
        }
        assert_eq!(prompt.asked.get(), 0);
    }

    #[test]
    fn finalized_document_rejects_every_scan_with_fixed_reason() {
        let directory = active_directory();
        let prompt = CountingPrompt::answering(true);
        let reconciler =
            ScanReconciler::new(&directory, &prompt, UnresolvedPolicy::RejectScan);
        let mut doc = opened_document();
        let document_id = doc.id_typed();
        execute(
            &mut doc,
            &ValidationCommand::SubmitDocument(SubmitDocument {
                document_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        assert_eq!(
            reconciler.reconcile("SN001", &doc),
            ScanAction::Reject {
                code: code("SN001"),
                reason: FINALIZED_REASON.to_string(),
            }
        );
        assert_eq!(prompt.asked.get(), 0);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;
        use std::cell::RefCell;
        use std::collections::VecDeque;

        /// Prompt double answering from a scripted queue (defaults to "no"
        /// once the script runs out, matching a dismissed dialog).
        struct ScriptedPrompt {
            answers: RefCell<VecDeque<bool>>,
        }

        impl ScriptedPrompt {
            fn new(answers: Vec<bool>) -> Self {
                Self {
                    answers: RefCell::new(answers.into()),
                }
            }
        }

        impl ConfirmPrompt for ScriptedPrompt {
            fn confirm(&self, _prompt: &str) -> bool {
                self.answers.borrow_mut().pop_front().unwrap_or(false)
            }
        }

        fn directory_for(kind: u8) -> impl Fn(&SerialCode) -> LookupOutcome {
            move |c: &SerialCode| match kind % 4 {
                0 => LookupOutcome::Found {
                    item: ItemRef::new(format!("ITM-{c}"), "Item"),
                    status: Some(SerialStatus::Active),
                },
                1 => LookupOutcome::Found {
                    item: ItemRef::new(format!("ITM-{c}"), "Item"),
                    status: Some(SerialStatus::Delivered),
                },
                2 => LookupOutcome::NotFound,
                _ => LookupOutcome::Failed("backend unreachable".into()),
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: re-sale after return never prompts (asymmetry law).
            #[test]
            fn return_entries_flip_to_sale_without_confirmation(idx in 0u8..26) {
                let serial = format!("SN{idx:03}");
                let directory = directory_for(0);
                let prompt = CountingPrompt::answering(false);
                let reconciler =
                    ScanReconciler::new(&directory, &prompt, UnresolvedPolicy::RecordUnresolved);

                let mut doc = opened_document();
                record(&mut doc, ScanAction::Insert {
                    code: code(&serial),
                    item: ItemRef::new("ITM1", "Item"),
                    qty: QtySign::Return,
                });

                let action = reconciler.reconcile(&serial, &doc);
                prop_assert_eq!(action, ScanAction::FlipQty {
                    code: code(&serial),
                    qty: QtySign::Sale,
                });
                prop_assert_eq!(prompt.asked.get(), 0);
            }

            /// Property: after any scan stream, codes stay unique and every
            /// entry holds a legal sign.
            #[test]
            fn scan_streams_preserve_code_uniqueness(
                scans in proptest::collection::vec((0u8..8, 0u8..4, any::<bool>()), 0..40)
            ) {
                let answers: Vec<bool> = scans.iter().map(|(_, _, yes)| *yes).collect();
                let prompt = ScriptedPrompt::new(answers);
                let mut doc = opened_document();

                for (code_idx, lookup_kind, _) in &scans {
                    let serial = format!("SN{code_idx:03}");
                    let directory = directory_for(*lookup_kind);
                    let reconciler = ScanReconciler::new(
                        &directory,
                        &prompt,
                        UnresolvedPolicy::RecordUnresolved,
                    );

                    let action = reconciler.reconcile(&serial, &doc);
                    let document_id = doc.id_typed();
                    execute(&mut doc, &ValidationCommand::RecordScan(RecordScan {
                        document_id,
                        action,
                        occurred_at: Utc::now(),
                    })).unwrap();
                }

                let mut seen = std::collections::HashSet::new();
                for entry in doc.entries().iter() {
                    prop_assert!(seen.insert(entry.code.clone()), "duplicate code in set");
                    prop_assert!(matches!(entry.qty, QtySign::Sale | QtySign::Return));
                }
            }

            /// Property: applying a `Noop` never changes the entry set.
            #[test]
            fn noop_never_changes_the_document(idx in 0u8..8) {
                let serial = format!("SN{idx:03}");
                let directory = directory_for(0);
                let prompt = CountingPrompt::answering(true);
                let reconciler =
                    ScanReconciler::new(&directory, &prompt, UnresolvedPolicy::RecordUnresolved);

                let mut doc = opened_document();
                let action = reconciler.reconcile(&serial, &doc);
                record(&mut doc, action);

                let before = doc.clone();
                record(&mut doc, ScanAction::Noop);
                prop_assert_eq!(doc, before);
            }
        }
    }
}

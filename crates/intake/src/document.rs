use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use serialtrack_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, EntrySet, OperatorId, SerialCode,
};
use serialtrack_events::{Command, Event};

use crate::action::ScanAction;
use crate::entry::{QtySign, SaleEntry};

/// Fixed rejection reason for scans against a finalized document.
pub const FINALIZED_REASON: &str = "document finalized";

/// Validation document identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationDocumentId(pub AggregateId);

impl ValidationDocumentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ValidationDocumentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Document status lifecycle. `Submitted` and `Cancelled` are finalized:
/// the entry set is frozen and further scans are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Open,
    Submitted,
    Cancelled,
}

/// Aggregate root: ValidationDocument (sale/return scan sheet for one
/// trading session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDocument {
    id: ValidationDocumentId,
    status: DocumentStatus,
    opening_session: Option<AggregateId>,
    posting_date: Option<NaiveDate>,
    entries: EntrySet<SaleEntry>,
    version: u64,
    opened: bool,
}

impl ValidationDocument {
    /// Create an empty, not-yet-opened instance for rehydration.
    pub fn empty(id: ValidationDocumentId) -> Self {
        Self {
            id,
            status: DocumentStatus::Open,
            opening_session: None,
            posting_date: None,
            entries: EntrySet::new(),
            version: 0,
            opened: false,
        }
    }

    pub fn id_typed(&self) -> ValidationDocumentId {
        self.id
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn opening_session(&self) -> Option<AggregateId> {
        self.opening_session
    }

    pub fn posting_date(&self) -> Option<NaiveDate> {
        self.posting_date
    }

    pub fn entries(&self) -> &EntrySet<SaleEntry> {
        &self.entries
    }

    pub fn is_finalized(&self) -> bool {
        matches!(
            self.status,
            DocumentStatus::Submitted | DocumentStatus::Cancelled
        )
    }
}

impl AggregateRoot for ValidationDocument {
    type Id = ValidationDocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenDocument {
    pub document_id: ValidationDocumentId,
    pub operator_id: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LinkOpeningSession.
///
/// Carries the posting date already read from the linked session record;
/// the aggregate never performs the lookup itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOpeningSession {
    pub document_id: ValidationDocumentId,
    pub session_id: AggregateId,
    pub posting_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordScan. The action comes out of the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordScan {
    pub document_id: ValidationDocumentId,
    pub action: ScanAction,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveEntry. Always rejected — entries leave the set only with
/// the document; manual removal is a policy violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveEntry {
    pub document_id: ValidationDocumentId,
    pub code: SerialCode,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitDocument {
    pub document_id: ValidationDocumentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelDocument {
    pub document_id: ValidationDocumentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationCommand {
    OpenDocument(OpenDocument),
    LinkOpeningSession(LinkOpeningSession),
    RecordScan(RecordScan),
    RemoveEntry(RemoveEntry),
    SubmitDocument(SubmitDocument),
    CancelDocument(CancelDocument),
}

impl Command for ValidationCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        match self {
            ValidationCommand::OpenDocument(c) => c.document_id.0,
            ValidationCommand::LinkOpeningSession(c) => c.document_id.0,
            ValidationCommand::RecordScan(c) => c.document_id.0,
            ValidationCommand::RemoveEntry(c) => c.document_id.0,
            ValidationCommand::SubmitDocument(c) => c.document_id.0,
            ValidationCommand::CancelDocument(c) => c.document_id.0,
        }
    }
}

/// Event: DocumentOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOpened {
    pub document_id: ValidationDocumentId,
    pub operator_id: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OpeningSessionLinked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningSessionLinked {
    pub document_id: ValidationDocumentId,
    pub session_id: AggregateId,
    pub posting_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryInserted (resolved item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInserted {
    pub document_id: ValidationDocumentId,
    pub entry: SaleEntry,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UnresolvedEntryInserted (fail-open, empty item fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedEntryInserted {
    pub document_id: ValidationDocumentId,
    pub code: SerialCode,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryQtyFlipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryQtyFlipped {
    pub document_id: ValidationDocumentId,
    pub code: SerialCode,
    pub qty: QtySign,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSubmitted {
    pub document_id: ValidationDocumentId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DocumentCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCancelled {
    pub document_id: ValidationDocumentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationEvent {
    DocumentOpened(DocumentOpened),
    OpeningSessionLinked(OpeningSessionLinked),
    EntryInserted(EntryInserted),
    UnresolvedEntryInserted(UnresolvedEntryInserted),
    EntryQtyFlipped(EntryQtyFlipped),
    DocumentSubmitted(DocumentSubmitted),
    DocumentCancelled(DocumentCancelled),
}

impl Event for ValidationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ValidationEvent::DocumentOpened(_) => "intake.document.opened",
            ValidationEvent::OpeningSessionLinked(_) => "intake.document.session_linked",
            ValidationEvent::EntryInserted(_) => "intake.entry.inserted",
            ValidationEvent::UnresolvedEntryInserted(_) => "intake.entry.inserted_unresolved",
            ValidationEvent::EntryQtyFlipped(_) => "intake.entry.qty_flipped",
            ValidationEvent::DocumentSubmitted(_) => "intake.document.submitted",
            ValidationEvent::DocumentCancelled(_) => "intake.document.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ValidationEvent::DocumentOpened(e) => e.occurred_at,
            ValidationEvent::OpeningSessionLinked(e) => e.occurred_at,
            ValidationEvent::EntryInserted(e) => e.occurred_at,
            ValidationEvent::UnresolvedEntryInserted(e) => e.occurred_at,
            ValidationEvent::EntryQtyFlipped(e) => e.occurred_at,
            ValidationEvent::DocumentSubmitted(e) => e.occurred_at,
            ValidationEvent::DocumentCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ValidationDocument {
    type Command = ValidationCommand;
    type Event = ValidationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ValidationEvent::DocumentOpened(e) => {
                self.id = e.document_id;
                self.status = DocumentStatus::Open;
                self.entries = EntrySet::new();
                self.opened = true;
            }
            ValidationEvent::OpeningSessionLinked(e) => {
                self.opening_session = Some(e.session_id);
                self.posting_date = Some(e.posting_date);
            }
            ValidationEvent::EntryInserted(e) => {
                let _ = self.entries.insert(e.entry.clone());
            }
            ValidationEvent::UnresolvedEntryInserted(e) => {
                let _ = self.entries.insert(SaleEntry {
                    code: e.code.clone(),
                    item: None,
                    qty: QtySign::Sale,
                    scanned_at: e.occurred_at,
                });
            }
            ValidationEvent::EntryQtyFlipped(e) => {
                let _ = self.entries.update(&e.code, |entry| {
                    entry.qty = e.qty;
                    entry.scanned_at = e.occurred_at;
                });
            }
            ValidationEvent::DocumentSubmitted(_) => {
                self.status = DocumentStatus::Submitted;
            }
            ValidationEvent::DocumentCancelled(_) => {
                self.status = DocumentStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ValidationCommand::OpenDocument(cmd) => self.handle_open(cmd),
            ValidationCommand::LinkOpeningSession(cmd) => self.handle_link_session(cmd),
            ValidationCommand::RecordScan(cmd) => self.handle_record_scan(cmd),
            ValidationCommand::RemoveEntry(cmd) => self.handle_remove_entry(cmd),
            ValidationCommand::SubmitDocument(cmd) => self.handle_submit(cmd),
            ValidationCommand::CancelDocument(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl ValidationDocument {
    fn ensure_document_id(&self, document_id: ValidationDocumentId) -> Result<(), DomainError> {
        if self.id != document_id {
            return Err(DomainError::invariant("document_id mismatch"));
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        if !self.opened {
            return Err(DomainError::not_found());
        }
        if self.is_finalized() {
            return Err(DomainError::invariant(FINALIZED_REASON));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenDocument) -> Result<Vec<ValidationEvent>, DomainError> {
        if self.opened {
            return Err(DomainError::conflict("document already opened"));
        }

        Ok(vec![ValidationEvent::DocumentOpened(DocumentOpened {
            document_id: cmd.document_id,
            operator_id: cmd.operator_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_link_session(
        &self,
        cmd: &LinkOpeningSession,
    ) -> Result<Vec<ValidationEvent>, DomainError> {
        self.ensure_document_id(cmd.document_id)?;
        self.ensure_open()?;

        Ok(vec![ValidationEvent::OpeningSessionLinked(
            OpeningSessionLinked {
                document_id: cmd.document_id,
                session_id: cmd.session_id,
                posting_date: cmd.posting_date,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_record_scan(&self, cmd: &RecordScan) -> Result<Vec<ValidationEvent>, DomainError> {
        self.ensure_document_id(cmd.document_id)?;
        self.ensure_open()?;

        match &cmd.action {
            ScanAction::Insert { code, item, qty } => {
                if self.entries.contains(code) {
                    return Err(DomainError::conflict(format!(
                        "serial {code} already recorded"
                    )));
                }
                Ok(vec![ValidationEvent::EntryInserted(EntryInserted {
                    document_id: cmd.document_id,
                    entry: SaleEntry {
                        code: code.clone(),
                        item: Some(item.clone()),
                        qty: *qty,
                        scanned_at: cmd.occurred_at,
                    },
                    occurred_at: cmd.occurred_at,
                })])
            }
            ScanAction::InsertUnresolved { code, .. } => {
                if self.entries.contains(code) {
                    return Err(DomainError::conflict(format!(
                        "serial {code} already recorded"
                    )));
                }
                Ok(vec![ValidationEvent::UnresolvedEntryInserted(
                    UnresolvedEntryInserted {
                        document_id: cmd.document_id,
                        code: code.clone(),
                        occurred_at: cmd.occurred_at,
                    },
                )])
            }
            ScanAction::FlipQty { code, qty } => {
                let entry = self
                    .entries
                    .get(code)
                    .ok_or_else(DomainError::not_found)?;

                // A re-applied flip to the value already held is a no-op, so
                // a double-triggered scan cannot flip the sign back.
                if entry.qty == *qty {
                    return Ok(Vec::new());
                }

                Ok(vec![ValidationEvent::EntryQtyFlipped(EntryQtyFlipped {
                    document_id: cmd.document_id,
                    code: code.clone(),
                    qty: *qty,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ScanAction::Reject { .. } | ScanAction::Noop => Ok(Vec::new()),
        }
    }

    fn handle_remove_entry(&self, cmd: &RemoveEntry) -> Result<Vec<ValidationEvent>, DomainError> {
        self.ensure_document_id(cmd.document_id)?;

        Err(DomainError::policy(format!(
            "manual removal of entry {} is not allowed; entries change only through scans",
            cmd.code
        )))
    }

    fn handle_submit(&self, cmd: &SubmitDocument) -> Result<Vec<ValidationEvent>, DomainError> {
        self.ensure_document_id(cmd.document_id)?;
        self.ensure_open()?;

        Ok(vec![ValidationEvent::DocumentSubmitted(DocumentSubmitted {
            document_id: cmd.document_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelDocument) -> Result<Vec<ValidationEvent>, DomainError> {
        self.ensure_document_id(cmd.document_id)?;
        if !self.opened {
            return Err(DomainError::not_found());
        }
        if self.status == DocumentStatus::Cancelled {
            return Err(DomainError::invariant("document already cancelled"));
        }

        Ok(vec![ValidationEvent::DocumentCancelled(DocumentCancelled {
            document_id: cmd.document_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

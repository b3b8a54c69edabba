use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use serialtrack_core::{
    Aggregate, AggregateId, AggregateRoot, ConfirmPrompt, DomainError, EntrySet, ItemRef,
    LookupOutcome, OperatorId, SerialCode, TrackedEntry, UnresolvedPolicy,
};
use serialtrack_events::{Command, Event};
use serialtrack_registry::SerialDirectory;

/// Fixed rejection reason for scans against a finalized document.
pub const FINALIZED_REASON: &str = "document finalized";

/// Custody document identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustodyDocumentId(pub AggregateId);

impl CustodyDocumentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CustodyDocumentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Where an item currently sits relative to its owner.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustodyStatus {
    InCustody,
    Returned,
}

/// Custody document status lifecycle. `Submitted` and `Cancelled` freeze
/// the entry set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustodyDocumentStatus {
    Open,
    Submitted,
    Cancelled,
}

/// One tracked item, keyed by serial code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyEntry {
    pub code: SerialCode,
    /// Absent when the registry lookup failed and the scan was recorded
    /// fail-open.
    pub item: Option<ItemRef>,
    pub status: CustodyStatus,
    /// When custody was (last) taken.
    pub scanned_at: DateTime<Utc>,
    /// When the item was handed back; cleared when custody is taken again.
    pub returned_at: Option<DateTime<Utc>>,
}

impl TrackedEntry for CustodyEntry {
    fn code(&self) -> &SerialCode {
        &self.code
    }
}

/// Outcome of reconciling one custody scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustodyAction {
    /// New code, item resolved.
    Insert {
        code: SerialCode,
        item: ItemRef,
    },
    /// New code recorded with empty item fields (fail-open).
    InsertUnresolved {
        code: SerialCode,
        /// Warning text surfaced to the operator.
        warning: String,
    },
    /// Existing entry transitions to `status`.
    SetStatus {
        code: SerialCode,
        status: CustodyStatus,
    },
    /// Scan refused outright.
    Reject { code: SerialCode, reason: String },
    /// Blank input or declined confirmation.
    Noop,
}

impl CustodyAction {
    pub fn mutates(&self) -> bool {
        !matches!(self, CustodyAction::Reject { .. } | CustodyAction::Noop)
    }
}

/// Decides what a scanned serial does to a custody document.
///
/// Every status transition goes through the operator: in-custody items ask
/// before being handed back, returned items ask before custody is taken
/// again. New codes are recorded without a prompt.
pub struct CustodyReconciler<'a, D: ?Sized, C: ?Sized> {
    directory: &'a D,
    prompt: &'a C,
    policy: UnresolvedPolicy,
}

impl<'a, D, C> CustodyReconciler<'a, D, C>
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

    /// Fail-open reconciler, the default for custody intake.
    pub fn fail_open(directory: &'a D, prompt: &'a C) -> Self {
        Self::new(directory, prompt, UnresolvedPolicy::RecordUnresolved)
    }

    /// Reconcile one scan against the document's current entries.
    pub fn reconcile(&self, raw_code: &str, doc: &CustodyDocument) -> CustodyAction {
        let Ok(code) = SerialCode::new(raw_code) else {
            return CustodyAction::Noop;
        };

        if doc.is_finalized() {
            return CustodyAction::Reject {
                code,
                reason: FINALIZED_REASON.to_string(),
            };
        }

        if let Some(entry) = doc.entries().get(&code) {
            return self.reconcile_existing(code, entry.status);
        }

        self.reconcile_new(code)
    }

    fn reconcile_existing(&self, code: SerialCode, current: CustodyStatus) -> CustodyAction {
        let (prompt, next) = match current {
            CustodyStatus::InCustody => (
                format!("Item {code} is currently in custody. Are you returning it to the customer?"),
                CustodyStatus::Returned,
            ),
            CustodyStatus::Returned => (
                format!("Item {code} was previously returned. Are you taking custody again?"),
                CustodyStatus::InCustody,
            ),
        };

        if self.prompt.confirm(&prompt) {
            CustodyAction::SetStatus { code, status: next }
        } else {
            CustodyAction::Noop
        }
    }

    fn reconcile_new(&self, code: SerialCode) -> CustodyAction {
        match self.directory.lookup(&code) {
            LookupOutcome::Found { item, .. } => CustodyAction::Insert { code, item },
            LookupOutcome::NotFound => match self.policy {
                UnresolvedPolicy::RecordUnresolved => CustodyAction::InsertUnresolved {
                    warning: format!("item details not found for {code}"),
                    code,
                },
                UnresolvedPolicy::RejectScan => CustodyAction::Reject {
                    reason: format!("no item found for serial {code}"),
                    code,
                },
            },
            // Transport failure never loses a physical scan.
            LookupOutcome::Failed(reason) => CustodyAction::InsertUnresolved {
                warning: format!("could not fetch item details for {code}: {reason}"),
                code,
            },
        }
    }
}

/// Aggregate root: CustodyDocument (items held for one customer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustodyDocument {
    id: CustodyDocumentId,
    customer: String,
    status: CustodyDocumentStatus,
    entries: EntrySet<CustodyEntry>,
    version: u64,
    opened: bool,
}

impl CustodyDocument {
    /// Create an empty, not-yet-opened instance for rehydration.
    pub fn empty(id: CustodyDocumentId) -> Self {
        Self {
            id,
            customer: String::new(),
            status: CustodyDocumentStatus::Open,
            entries: EntrySet::new(),
            version: 0,
            opened: false,
        }
    }

    pub fn id_typed(&self) -> CustodyDocumentId {
        self.id
    }

    pub fn customer(&self) -> &str {
        &self.customer
    }

    pub fn status(&self) -> CustodyDocumentStatus {
        self.status
    }

    pub fn entries(&self) -> &EntrySet<CustodyEntry> {
        &self.entries
    }

    pub fn is_finalized(&self) -> bool {
        matches!(
            self.status,
            CustodyDocumentStatus::Submitted | CustodyDocumentStatus::Cancelled
        )
    }
}

impl AggregateRoot for CustodyDocument {
    type Id = CustodyDocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenCustody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCustody {
    pub document_id: CustodyDocumentId,
    pub customer: String,
    pub operator_id: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordCustodyScan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCustodyScan {
    pub document_id: CustodyDocumentId,
    pub action: CustodyAction,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveCustodyEntry. Always rejected; rows are managed through
/// scans only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveCustodyEntry {
    pub document_id: CustodyDocumentId,
    pub code: SerialCode,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitCustody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitCustody {
    pub document_id: CustodyDocumentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelCustody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelCustody {
    pub document_id: CustodyDocumentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustodyCommand {
    OpenCustody(OpenCustody),
    RecordCustodyScan(RecordCustodyScan),
    RemoveCustodyEntry(RemoveCustodyEntry),
    SubmitCustody(SubmitCustody),
    CancelCustody(CancelCustody),
}

impl Command for CustodyCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        match self {
            CustodyCommand::OpenCustody(c) => c.document_id.0,
            CustodyCommand::RecordCustodyScan(c) => c.document_id.0,
            CustodyCommand::RemoveCustodyEntry(c) => c.document_id.0,
            CustodyCommand::SubmitCustody(c) => c.document_id.0,
            CustodyCommand::CancelCustody(c) => c.document_id.0,
        }
    }
}

/// Event: CustodyOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyOpened {
    pub document_id: CustodyDocumentId,
    pub customer: String,
    pub operator_id: OperatorId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryTakenIntoCustody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTakenIntoCustody {
    pub document_id: CustodyDocumentId,
    pub code: SerialCode,
    pub item: Option<ItemRef>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EntryStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryStatusChanged {
    pub document_id: CustodyDocumentId,
    pub code: SerialCode,
    pub status: CustodyStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CustodySubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodySubmitted {
    pub document_id: CustodyDocumentId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CustodyCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyCancelled {
    pub document_id: CustodyDocumentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustodyEvent {
    CustodyOpened(CustodyOpened),
    EntryTakenIntoCustody(EntryTakenIntoCustody),
    EntryStatusChanged(EntryStatusChanged),
    CustodySubmitted(CustodySubmitted),
    CustodyCancelled(CustodyCancelled),
}

impl Event for CustodyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustodyEvent::CustodyOpened(_) => "custody.document.opened",
            CustodyEvent::EntryTakenIntoCustody(_) => "custody.entry.taken",
            CustodyEvent::EntryStatusChanged(_) => "custody.entry.status_changed",
            CustodyEvent::CustodySubmitted(_) => "custody.document.submitted",
            CustodyEvent::CustodyCancelled(_) => "custody.document.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CustodyEvent::CustodyOpened(e) => e.occurred_at,
            CustodyEvent::EntryTakenIntoCustody(e) => e.occurred_at,
            CustodyEvent::EntryStatusChanged(e) => e.occurred_at,
            CustodyEvent::CustodySubmitted(e) => e.occurred_at,
            CustodyEvent::CustodyCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CustodyDocument {
    type Command = CustodyCommand;
    type Event = CustodyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CustodyEvent::CustodyOpened(e) => {
                self.id = e.document_id;
                self.customer = e.customer.clone();
                self.status = CustodyDocumentStatus::Open;
                self.entries = EntrySet::new();
                self.opened = true;
            }
            CustodyEvent::EntryTakenIntoCustody(e) => {
                let _ = self.entries.insert(CustodyEntry {
                    code: e.code.clone(),
                    item: e.item.clone(),
                    status: CustodyStatus::InCustody,
                    scanned_at: e.occurred_at,
                    returned_at: None,
                });
            }
            CustodyEvent::EntryStatusChanged(e) => {
                let _ = self.entries.update(&e.code, |entry| {
                    entry.status = e.status;
                    match e.status {
                        CustodyStatus::Returned => entry.returned_at = Some(e.occurred_at),
                        CustodyStatus::InCustody => {
                            entry.scanned_at = e.occurred_at;
                            entry.returned_at = None;
                        }
                    }
                });
            }
            CustodyEvent::CustodySubmitted(_) => {
                self.status = CustodyDocumentStatus::Submitted;
            }
            CustodyEvent::CustodyCancelled(_) => {
                self.status = CustodyDocumentStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CustodyCommand::OpenCustody(cmd) => self.handle_open(cmd),
            CustodyCommand::RecordCustodyScan(cmd) => self.handle_record_scan(cmd),
            CustodyCommand::RemoveCustodyEntry(cmd) => self.handle_remove_entry(cmd),
            CustodyCommand::SubmitCustody(cmd) => self.handle_submit(cmd),
            CustodyCommand::CancelCustody(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl CustodyDocument {
    fn ensure_document_id(&self, document_id: CustodyDocumentId) -> Result<(), DomainError> {
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

    fn handle_open(&self, cmd: &OpenCustody) -> Result<Vec<CustodyEvent>, DomainError> {
        if self.opened {
            return Err(DomainError::conflict("custody document already opened"));
        }
        if cmd.customer.trim().is_empty() {
            return Err(DomainError::validation("customer cannot be empty"));
        }

        Ok(vec![CustodyEvent::CustodyOpened(CustodyOpened {
            document_id: cmd.document_id,
            customer: cmd.customer.clone(),
            operator_id: cmd.operator_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_scan(
        &self,
        cmd: &RecordCustodyScan,
    ) -> Result<Vec<CustodyEvent>, DomainError> {
        self.ensure_document_id(cmd.document_id)?;
        self.ensure_open()?;

        match &cmd.action {
            CustodyAction::Insert { code, item } => {
                if self.entries.contains(code) {
                    return Err(DomainError::conflict(format!(
                        "serial {code} already recorded"
                    )));
                }
                Ok(vec![CustodyEvent::EntryTakenIntoCustody(
                    EntryTakenIntoCustody {
                        document_id: cmd.document_id,
                        code: code.clone(),
                        item: Some(item.clone()),
                        occurred_at: cmd.occurred_at,
                    },
                )])
            }
            CustodyAction::InsertUnresolved { code, .. } => {
                if self.entries.contains(code) {
                    return Err(DomainError::conflict(format!(
                        "serial {code} already recorded"
                    )));
                }
                Ok(vec![CustodyEvent::EntryTakenIntoCustody(
                    EntryTakenIntoCustody {
                        document_id: cmd.document_id,
                        code: code.clone(),
                        item: None,
                        occurred_at: cmd.occurred_at,
                    },
                )])
            }
            CustodyAction::SetStatus { code, status } => {
                let entry = self
                    .entries
                    .get(code)
                    .ok_or_else(DomainError::not_found)?;

                // A re-applied transition to the status already held is a
                // no-op, so a double-triggered scan cannot bounce the state.
                if entry.status == *status {
                    return Ok(Vec::new());
                }

                Ok(vec![CustodyEvent::EntryStatusChanged(EntryStatusChanged {
                    document_id: cmd.document_id,
                    code: code.clone(),
                    status: *status,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CustodyAction::Reject { .. } | CustodyAction::Noop => Ok(Vec::new()),
        }
    }

    fn handle_remove_entry(
        &self,
        cmd: &RemoveCustodyEntry,
    ) -> Result<Vec<CustodyEvent>, DomainError> {
        self.ensure_document_id(cmd.document_id)?;

        Err(DomainError::policy(format!(
            "manual removal of item {} is not allowed; use barcode scanning to manage items",
            cmd.code
        )))
    }

    fn handle_submit(&self, cmd: &SubmitCustody) -> Result<Vec<CustodyEvent>, DomainError> {
        self.ensure_document_id(cmd.document_id)?;
        self.ensure_open()?;

        Ok(vec![CustodyEvent::CustodySubmitted(CustodySubmitted {
            document_id: cmd.document_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelCustody) -> Result<Vec<CustodyEvent>, DomainError> {
        self.ensure_document_id(cmd.document_id)?;
        if !self.opened {
            return Err(DomainError::not_found());
        }
        if self.status == CustodyDocumentStatus::Cancelled {
            return Err(DomainError::invariant("document already cancelled"));
        }

        Ok(vec![CustodyEvent::CustodyCancelled(CustodyCancelled {
            document_id: cmd.document_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

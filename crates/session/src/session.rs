//! Session orchestrator for one validation document.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use serialtrack_core::{
    AggregateId, AggregateRoot, ConfirmPrompt, DomainError, ExpectedVersion, OperatorId,
    UnresolvedPolicy,
};
use serialtrack_events::{Command, Event, EventBus, EventEnvelope, InMemoryEventBus, execute};
use serialtrack_intake::{
    CancelDocument, LinkOpeningSession, OpenDocument, RecordScan, ScanAction, ScanReconciler,
    SubmitDocument, ValidationCommand, ValidationDocument, ValidationDocumentId, ValidationEvent,
};
use serialtrack_registry::SerialDirectory;

use crate::autosave::AutosaveScheduler;
use crate::gate::ScanGate;
use crate::store::{DocumentStore, StoreError};

const AGGREGATE_TYPE: &str = "validation_document";

/// Session-level failure: a domain rejection or a persistence problem.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-document-kind session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// What to do with codes the registry cannot resolve.
    pub policy: UnresolvedPolicy,
    /// Delay between the last change and the autosave fire.
    pub autosave_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            // Validation documents reject unknown serials; custody-style
            // kinds opt into RecordUnresolved instead.
            policy: UnresolvedPolicy::RejectScan,
            autosave_interval: Duration::from_secs(10),
        }
    }
}

/// Named lifecycle entry points for an on-screen document.
///
/// Callers invoke these from their own state machine; there is no dynamic
/// dispatch on event-name strings.
pub trait DocumentLifecycle {
    /// A barcode read reached the form's scan field.
    fn on_scan(&mut self, raw_code: &str) -> Result<(), SessionError>;

    /// The autosave timer fired.
    fn on_autosave_due(&mut self) -> Result<(), SessionError>;

    /// The operator submitted the document.
    fn on_submit(&mut self) -> Result<(), SessionError>;

    /// The operator cancelled the document.
    fn on_cancel(&mut self) -> Result<(), SessionError>;
}

/// One operator, one document, one scanner.
///
/// Owns the document aggregate and everything around it: the reconciler's
/// capabilities, the single-flight scan gate, the autosave timer, the
/// persistence capability, and the event bus fan-out. Scans are processed
/// strictly one at a time; both suspend points (lookup, confirm) resolve
/// before the next scan is admitted.
pub struct ValidationSession<D, C, S> {
    doc: ValidationDocument,
    directory: D,
    prompt: C,
    store: S,
    bus: Arc<InMemoryEventBus<EventEnvelope<ValidationEvent>>>,
    config: SessionConfig,
    gate: ScanGate,
    autosave: AutosaveScheduler,
    dirty: bool,
    saved_version: u64,
}

impl<D, C, S> ValidationSession<D, C, S>
where
    D: SerialDirectory,
    C: ConfirmPrompt,
    S: DocumentStore<ValidationDocument>,
{
    /// Open a fresh document and persist its initial snapshot.
    ///
    /// Returns the session plus the autosave due-tick receiver; the caller
    /// invokes [`DocumentLifecycle::on_autosave_due`] for each tick.
    pub fn open(
        document_id: ValidationDocumentId,
        operator_id: OperatorId,
        directory: D,
        prompt: C,
        store: S,
        bus: Arc<InMemoryEventBus<EventEnvelope<ValidationEvent>>>,
        config: SessionConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<()>), SessionError> {
        let mut doc = ValidationDocument::empty(document_id);
        let events = execute(
            &mut doc,
            &ValidationCommand::OpenDocument(OpenDocument {
                document_id,
                operator_id,
                occurred_at: Utc::now(),
            }),
        )?;

        let (autosave, due) = AutosaveScheduler::spawn();
        let mut session = Self {
            doc,
            directory,
            prompt,
            store,
            bus,
            config,
            gate: ScanGate::new(),
            autosave,
            dirty: false,
            saved_version: 0,
        };

        session.publish(&events);
        session.persist()?;
        info!(document_id = %document_id, "validation session opened");

        Ok((session, due))
    }

    pub fn document(&self) -> &ValidationDocument {
        &self.doc
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Populate the linked opening-session fields.
    ///
    /// The posting date is read from the related record by the caller and
    /// passed in resolved; the aggregate never looks it up.
    pub fn link_opening_session(
        &mut self,
        session_id: AggregateId,
        posting_date: NaiveDate,
    ) -> Result<(), SessionError> {
        let cmd = ValidationCommand::LinkOpeningSession(LinkOpeningSession {
            document_id: self.doc.id_typed(),
            session_id,
            posting_date,
            occurred_at: Utc::now(),
        });
        let events = self.dispatch(&cmd)?;
        self.after_change(&events);
        Ok(())
    }

    /// Run one scan through the reconciler and apply the outcome.
    ///
    /// Returns the action so callers can drive operator feedback. A second
    /// scan while this one is awaiting its confirmation is refused by the
    /// gate.
    pub fn scan(&mut self, raw_code: &str) -> Result<ScanAction, SessionError> {
        let permit = self.gate.begin(raw_code)?;

        let reconciler = ScanReconciler::new(&self.directory, &self.prompt, self.config.policy);
        let action = reconciler.reconcile(raw_code, &self.doc);

        // Both suspend points have resolved; release the gate before the
        // synchronous apply.
        drop(permit);

        match &action {
            ScanAction::Insert { code, .. } => info!(%code, "serial added"),
            ScanAction::InsertUnresolved { code, .. } => {
                warn!(%code, "serial recorded without item details")
            }
            ScanAction::FlipQty { code, qty } => info!(%code, ?qty, "entry sign changed"),
            ScanAction::Reject { code, reason } => warn!(%code, %reason, "scan rejected"),
            ScanAction::Noop => debug!("scan was a no-op"),
        }

        if action.mutates() {
            let cmd = ValidationCommand::RecordScan(RecordScan {
                document_id: self.doc.id_typed(),
                action: action.clone(),
                occurred_at: Utc::now(),
            });
            let events = self.dispatch(&cmd)?;
            self.after_change(&events);
        }

        Ok(action)
    }

    /// Persist the current snapshot immediately.
    pub fn save_now(&mut self) -> Result<(), SessionError> {
        self.persist()?;
        Ok(())
    }

    /// Stop the autosave timer and release the session.
    pub async fn close(self) {
        self.autosave.shutdown().await;
    }

    fn dispatch(&mut self, cmd: &ValidationCommand) -> Result<Vec<ValidationEvent>, DomainError> {
        debug!(target = %cmd.target_aggregate_id(), "dispatching command");
        execute(&mut self.doc, cmd)
    }

    fn after_change(&mut self, events: &[ValidationEvent]) {
        if events.is_empty() {
            return;
        }
        self.publish(events);
        self.dirty = true;
        self.autosave.schedule(self.config.autosave_interval);
    }

    fn publish(&self, events: &[ValidationEvent]) {
        let base = self.doc.version() - events.len() as u64;
        for (i, event) in events.iter().enumerate() {
            debug!(event_type = event.event_type(), "publishing applied event");
            let envelope = EventEnvelope::new(
                Uuid::now_v7(),
                self.doc.id_typed().0,
                AGGREGATE_TYPE,
                base + i as u64 + 1,
                event.clone(),
            );
            if self.bus.publish(envelope).is_err() {
                warn!("event bus publish failed");
            }
        }
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let expected = if self.saved_version == 0 {
            ExpectedVersion::Any
        } else {
            ExpectedVersion::Exact(self.saved_version)
        };
        self.store.save(
            self.doc.id_typed().0,
            expected,
            self.doc.version(),
            self.doc.clone(),
        )?;
        self.saved_version = self.doc.version();
        self.dirty = false;
        Ok(())
    }
}

impl<D, C, S> DocumentLifecycle for ValidationSession<D, C, S>
where
    D: SerialDirectory,
    C: ConfirmPrompt,
    S: DocumentStore<ValidationDocument>,
{
    fn on_scan(&mut self, raw_code: &str) -> Result<(), SessionError> {
        self.scan(raw_code).map(|_| ())
    }

    fn on_autosave_due(&mut self) -> Result<(), SessionError> {
        if !self.dirty {
            debug!("autosave skipped, no unsaved changes");
            return Ok(());
        }

        match self.persist() {
            Ok(()) => info!("document auto-saved"),
            Err(e) => {
                // Keep the dirty flag and try again after the next change.
                warn!(error = %e, "autosave failed");
                self.autosave.schedule(self.config.autosave_interval);
            }
        }
        Ok(())
    }

    fn on_submit(&mut self) -> Result<(), SessionError> {
        let cmd = ValidationCommand::SubmitDocument(SubmitDocument {
            document_id: self.doc.id_typed(),
            occurred_at: Utc::now(),
        });
        let events = self.dispatch(&cmd)?;
        self.publish(&events);
        self.autosave.cancel();
        self.persist()?;
        info!(document_id = %self.doc.id_typed(), "document submitted");
        Ok(())
    }

    fn on_cancel(&mut self) -> Result<(), SessionError> {
        let cmd = ValidationCommand::CancelDocument(CancelDocument {
            document_id: self.doc.id_typed(),
            occurred_at: Utc::now(),
        });
        let events = self.dispatch(&cmd)?;
        self.publish(&events);
        self.autosave.cancel();
        self.persist()?;
        info!(document_id = %self.doc.id_typed(), "document cancelled");
        Ok(())
    }
}

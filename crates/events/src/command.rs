use serialtrack_core::AggregateId;

/// A command targets a specific aggregate.
///
/// Commands represent **intent** — a request to perform an action on a
/// document. They are transient (not persisted) and are transformed into
/// events, which are. A command is rejected if invalid; events represent
/// accepted changes.
///
/// Commands must specify which document they target via
/// `target_aggregate_id()`, so callers can route them to the right
/// in-memory instance and keep one document as the serialization boundary
/// (scans for a document are processed one at a time).
///
/// The `Clone + Send + Sync + 'static` bounds let commands be queued,
/// logged, and replayed across threads without borrowed data.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_aggregate_id(&self) -> AggregateId;
}

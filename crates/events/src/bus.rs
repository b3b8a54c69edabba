//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes already-applied document events to consumers: the
//! autosave trigger, operator alert sinks, report builders. It is
//! transport-agnostic and makes at-least-once delivery assumptions, so
//! consumers must tolerate duplicates. The bus is for distribution, not
//! storage — the document store remains the source of truth.

use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to an event stream.
///
/// Each subscription gets a copy of every message published after it was
/// created (broadcast semantics). Designed for single-threaded consumption:
/// one subscription, one consumer loop.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// Publication happens after the event has been applied and persisted; if
/// publication fails the event is not lost, it is still in the store and
/// can be republished.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug;

    /// Publish a message to all current subscribers.
    fn publish(&self, message: M) -> Result<(), Self::Error>;

    /// Create a new subscription receiving all subsequently published
    /// messages.
    fn subscribe(&self) -> Subscription<M>;
}

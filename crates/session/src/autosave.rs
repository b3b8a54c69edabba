//! Autosave timer owned by the document session.
//!
//! Replaces the old per-form global timer: an explicit scheduler with
//! `schedule(delay)`/`cancel()`, decoupled from the reconciliation logic.
//! Re-scheduling re-arms the timer (debounce), so a burst of scans produces
//! one save after the burst goes quiet. The scheduler only emits due ticks;
//! deciding whether the document is dirty stays with the session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc};
use tokio::time::Instant;
use tracing::debug;

enum Control {
    Arm(Duration),
    Cancel,
}

/// Background autosave timer.
pub struct AutosaveScheduler {
    control: mpsc::UnboundedSender<Control>,
    shutdown: Arc<Notify>,
    handle: tokio::task::JoinHandle<()>,
}

impl AutosaveScheduler {
    /// Spawn the timer task. Due ticks arrive on the returned receiver;
    /// the owner calls its session's `on_autosave_due` for each one.
    pub fn spawn() -> (Self, mpsc::UnboundedReceiver<()>) {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel::<Control>();
        let (due_tx, due_rx) = mpsc::unbounded_channel::<()>();
        let shutdown = Arc::new(Notify::new());
        let shutdown_task = shutdown.clone();

        let handle = tokio::spawn(async move {
            let mut deadline: Option<Instant> = None;

            loop {
                // Disabled branch still evaluates its expression, so feed it
                // a harmless far-future deadline while disarmed.
                let sleep_until = deadline
                    .unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400));

                tokio::select! {
                    _ = shutdown_task.notified() => {
                        debug!("autosave scheduler shutting down");
                        break;
                    }
                    msg = control_rx.recv() => match msg {
                        Some(Control::Arm(delay)) => {
                            deadline = Some(Instant::now() + delay);
                        }
                        Some(Control::Cancel) => {
                            deadline = None;
                        }
                        None => break,
                    },
                    _ = tokio::time::sleep_until(sleep_until), if deadline.is_some() => {
                        deadline = None;
                        if due_tx.send(()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        (
            Self {
                control: control_tx,
                shutdown,
                handle,
            },
            due_rx,
        )
    }

    /// Arm (or re-arm) the timer. A pending fire is replaced, not stacked.
    pub fn schedule(&self, delay: Duration) {
        let _ = self.control.send(Control::Arm(delay));
    }

    /// Disarm the timer; a pending fire is dropped.
    pub fn cancel(&self) {
        let _ = self.control.send(Control::Cancel);
    }

    /// Stop the timer task and wait for it to finish.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        let _ = self.handle.await;
    }
}

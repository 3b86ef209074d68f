use std::sync::Arc;

use tokio::sync::watch;

/// Why a session was stopped from outside the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptKind {
    /// The pointer reached the reserved corner.
    SafetyTrigger,
    /// The operator asked to stop (Ctrl-C).
    UserRequested,
}

/// Shared stop flag for one session. The first trip wins; the loop polls it
/// between steps and races it against every awaited phase.
#[derive(Debug, Clone)]
pub struct InterruptSignal {
    tx: Arc<watch::Sender<Option<InterruptKind>>>,
}

impl InterruptSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Returns `false` if the signal had already been tripped.
    pub fn trip(&self, kind: InterruptKind) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(kind);
            true
        })
    }

    pub fn current(&self) -> Option<InterruptKind> {
        *self.tx.borrow()
    }

    /// Resolves once the signal is tripped.
    pub async fn tripped(&self) -> InterruptKind {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(kind) = *rx.borrow_and_update() {
                return kind;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for InterruptSignal {
    fn default() -> Self {
        Self::new()
    }
}

use std::sync::Arc;

use tokio::sync::watch;

use easel_core::phase::RunPhase;

/// Shared, observable phase of one run. Once terminal it no longer changes.
#[derive(Clone)]
pub struct PhaseHandle {
    tx: Arc<watch::Sender<RunPhase>>,
}

impl Default for PhaseHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RunPhase::Idle);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, phase: RunPhase) {
        self.tx.send_if_modified(|current| {
            if current.is_terminal() || *current == phase {
                return false;
            }
            *current = phase;
            true
        });
    }

    pub fn current(&self) -> RunPhase {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunPhase> {
        self.tx.subscribe()
    }
}

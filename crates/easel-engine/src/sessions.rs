//! Per-session snapshot routing between the UI and running agents.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use easel_core::canvas::StateSnapshot;
use easel_core::ids::SessionId;

use crate::mailbox::StateMailbox;

/// Maps session ids to the producer side of their mailbox.
///
/// The lock covers map operations only; sends happen after it is released.
#[derive(Default)]
pub struct SessionRegistry {
    senders: Mutex<HashMap<SessionId, mpsc::Sender<StateSnapshot>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh mailbox for `session_id`, replacing any existing one.
    /// The replaced mailbox's consumer sees its channel close.
    pub fn register(&self, session_id: SessionId) -> StateMailbox {
        let (tx, mailbox) = StateMailbox::channel();
        if self.senders.lock().insert(session_id.clone(), tx).is_some() {
            debug!(%session_id, "replaced existing mailbox");
        }
        mailbox
    }

    /// Close and forget the session's mailbox. Unknown ids are ignored.
    pub fn unregister(&self, session_id: &SessionId) -> bool {
        let removed = self.senders.lock().remove(session_id).is_some();
        if removed {
            debug!(%session_id, "mailbox unregistered");
        }
        removed
    }

    /// Offer a snapshot without blocking. `false` when the session is unknown,
    /// its slot is still occupied, or its consumer is gone.
    pub fn deliver(&self, session_id: &SessionId, snapshot: StateSnapshot) -> bool {
        let Some(tx) = self.senders.lock().get(session_id).cloned() else {
            debug!(%session_id, "snapshot for unknown session dropped");
            return false;
        };
        match tx.try_send(snapshot) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(%session_id, "mailbox full, snapshot dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.senders.lock().contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.senders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::MailboxRecv;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn snap(tag: &str) -> StateSnapshot {
        StateSnapshot::new(json!([{ "id": tag }]), json!([]))
    }

    #[test]
    fn deliver_to_unknown_session_is_rejected() {
        let registry = SessionRegistry::new();
        assert!(!registry.deliver(&SessionId::from_raw("nope"), snap("a")));
        assert!(registry.is_empty());
    }

    #[test]
    fn second_delivery_dropped_until_consumed() {
        let registry = SessionRegistry::new();
        let id = SessionId::new();
        let mut mailbox = registry.register(id.clone());

        assert!(registry.deliver(&id, snap("first")));
        assert!(!registry.deliver(&id, snap("second")));
        assert_eq!(mailbox.take_pending(), Some(snap("first")));
        assert!(registry.deliver(&id, snap("third")));
        assert_eq!(mailbox.take_pending(), Some(snap("third")));
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = SessionRegistry::new();
        let id = SessionId::new();
        let _mailbox = registry.register(id.clone());
        assert!(registry.contains(&id));

        assert!(registry.unregister(&id));
        assert!(!registry.unregister(&id));
        assert!(!registry.unregister(&SessionId::from_raw("unknown")));
        assert!(!registry.deliver(&id, snap("late")));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn unregister_closes_consumer() {
        let registry = SessionRegistry::new();
        let id = SessionId::new();
        let mut mailbox = registry.register(id.clone());
        registry.unregister(&id);
        assert_eq!(mailbox.wait(Duration::from_secs(5)).await, MailboxRecv::Closed);
    }

    #[tokio::test]
    async fn reregister_replaces_mailbox() {
        let registry = SessionRegistry::new();
        let id = SessionId::new();
        let mut old = registry.register(id.clone());
        let mut new = registry.register(id.clone());

        assert_eq!(old.wait(Duration::from_secs(5)).await, MailboxRecv::Closed);
        assert!(registry.deliver(&id, snap("x")));
        assert_eq!(new.take_pending(), Some(snap("x")));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let registry = Arc::new(SessionRegistry::new());
        let a = SessionId::new();
        let b = SessionId::new();
        let mut mailbox_a = registry.register(a.clone());
        let mut mailbox_b = registry.register(b.clone());

        let producers: Vec<_> = (0..2)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let (id, tag) = if i == 0 { (a.clone(), "for-a") } else { (b.clone(), "for-b") };
                tokio::spawn(async move { registry.deliver(&id, snap(tag)) })
            })
            .collect();
        for p in producers {
            assert!(p.await.unwrap());
        }

        assert_eq!(mailbox_a.take_pending(), Some(snap("for-a")));
        assert_eq!(mailbox_b.take_pending(), Some(snap("for-b")));
        assert_eq!(mailbox_a.take_pending(), None);
    }
}

use std::time::Duration;

use tokio::sync::mpsc;

use easel_core::canvas::StateSnapshot;

/// Outcome of waiting on a [`StateMailbox`].
#[derive(Debug, PartialEq)]
pub enum MailboxRecv {
    Snapshot(StateSnapshot),
    TimedOut,
    /// The session was unregistered or its mailbox replaced.
    Closed,
}

/// Consumer end of a session's single-slot snapshot channel.
#[derive(Debug)]
pub struct StateMailbox {
    rx: mpsc::Receiver<StateSnapshot>,
}

impl StateMailbox {
    pub(crate) fn channel() -> (mpsc::Sender<StateSnapshot>, Self) {
        let (tx, rx) = mpsc::channel(1);
        (tx, Self { rx })
    }

    /// A snapshot already sitting in the slot, if any. Never waits.
    pub fn take_pending(&mut self) -> Option<StateSnapshot> {
        self.rx.try_recv().ok()
    }

    pub async fn wait(&mut self, timeout: Duration) -> MailboxRecv {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(snapshot)) => MailboxRecv::Snapshot(snapshot),
            Ok(None) => MailboxRecv::Closed,
            Err(_) => MailboxRecv::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snap(id: &str) -> StateSnapshot {
        StateSnapshot::new(json!([{ "id": id }]), json!([]))
    }

    #[test]
    fn capacity_is_one() {
        let (tx, mut mailbox) = StateMailbox::channel();
        assert!(tx.try_send(snap("a")).is_ok());
        assert!(tx.try_send(snap("b")).is_err());
        assert_eq!(mailbox.take_pending(), Some(snap("a")));
        assert_eq!(mailbox.take_pending(), None);
        assert!(tx.try_send(snap("c")).is_ok());
    }

    #[tokio::test]
    async fn wait_returns_delivered_snapshot() {
        let (tx, mut mailbox) = StateMailbox::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(snap("late")).await;
        });
        assert_eq!(mailbox.wait(Duration::from_secs(5)).await, MailboxRecv::Snapshot(snap("late")));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out() {
        let (_tx, mut mailbox) = StateMailbox::channel();
        let start = tokio::time::Instant::now();
        assert_eq!(mailbox.wait(Duration::from_secs(2)).await, MailboxRecv::TimedOut);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn dropped_sender_closes() {
        let (tx, mut mailbox) = StateMailbox::channel();
        drop(tx);
        assert_eq!(mailbox.wait(Duration::from_secs(5)).await, MailboxRecv::Closed);
    }
}

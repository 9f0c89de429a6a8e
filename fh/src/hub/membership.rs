//! Membership set and the fan-out pass
//!
//! Owned by the Hub task alone. Removing a member drops the only producer of
//! its mailbox, which closes the mailbox and stops the connection's writer.

use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::messages::Frame;

/// Outcome of one fan-out pass
#[derive(Debug, Default)]
pub(crate) struct FanOut {
    pub delivered: usize,
    /// Members removed during the pass, in eviction order
    pub evicted: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct Membership {
    members: HashMap<String, mpsc::Sender<Frame>>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    /// Sorted member identities
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.members.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Add a member; returns false (and keeps the existing entry) if already present
    pub fn insert(&mut self, id: String, mailbox: mpsc::Sender<Frame>) -> bool {
        if self.members.contains_key(&id) {
            return false;
        }
        self.members.insert(id, mailbox);
        true
    }

    /// Remove a member, closing its mailbox; returns false if it was not a member
    pub fn remove(&mut self, id: &str) -> bool {
        self.members.remove(id).is_some()
    }

    /// Offer `frame` to every member except `exclude` without blocking
    ///
    /// Targets come from a snapshot taken before the first enqueue. A member whose
    /// mailbox is full or already closed is removed on the spot.
    pub fn fan_out(&mut self, frame: &Frame, exclude: Option<&str>) -> FanOut {
        let snapshot: Vec<String> = self
            .members
            .keys()
            .filter(|id| Some(id.as_str()) != exclude)
            .cloned()
            .collect();
        debug!(targets = snapshot.len(), ?exclude, "Membership::fan_out: called");

        let mut result = FanOut::default();
        for id in snapshot {
            let Some(mailbox) = self.members.get(&id) else {
                continue;
            };
            match mailbox.try_send(frame.clone()) {
                Ok(()) => result.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(%id, "Mailbox full, evicting slow consumer");
                    self.members.remove(&id);
                    result.evicted.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%id, "Mailbox closed by its writer, evicting");
                    self.members.remove(&id);
                    result.evicted.push(id);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use proptest::prelude::*;

    fn frame(text: &'static str) -> Frame {
        Bytes::from_static(text.as_bytes())
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut membership = Membership::new();
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);

        assert!(membership.insert("a".to_string(), tx1));
        assert!(!membership.insert("a".to_string(), tx2));
        assert_eq!(membership.len(), 1);

        // The rejected mailbox producer was dropped
        assert!(matches!(rx2.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
    }

    #[test]
    fn test_remove_closes_mailbox() {
        let mut membership = Membership::new();
        let (tx, mut rx) = mpsc::channel(4);
        membership.insert("a".to_string(), tx);

        assert!(membership.remove("a"));
        assert!(!membership.remove("a"));
        assert!(matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
    }

    #[test]
    fn test_fan_out_skips_excluded() {
        let mut membership = Membership::new();
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        membership.insert("a".to_string(), tx_a);
        membership.insert("b".to_string(), tx_b);

        let result = membership.fan_out(&frame("hi"), Some("a"));

        assert_eq!(result.delivered, 1);
        assert!(result.evicted.is_empty());
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), frame("hi"));
    }

    #[test]
    fn test_fan_out_evicts_full_mailbox() {
        let mut membership = Membership::new();
        let (tx_fast, mut rx_fast) = mpsc::channel(8);
        let (tx_slow, mut rx_slow) = mpsc::channel(1);
        membership.insert("fast".to_string(), tx_fast);
        membership.insert("slow".to_string(), tx_slow);

        let first = membership.fan_out(&frame("1"), None);
        assert_eq!(first.delivered, 2);

        let second = membership.fan_out(&frame("2"), None);
        assert_eq!(second.delivered, 1);
        assert_eq!(second.evicted, vec!["slow".to_string()]);
        assert!(!membership.contains("slow"));

        assert_eq!(rx_fast.try_recv().unwrap(), frame("1"));
        assert_eq!(rx_fast.try_recv().unwrap(), frame("2"));

        // The slow member keeps what it had, then sees its mailbox closed
        assert_eq!(rx_slow.try_recv().unwrap(), frame("1"));
        assert!(matches!(rx_slow.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
    }

    #[test]
    fn test_fan_out_evicts_closed_mailbox() {
        let mut membership = Membership::new();
        let (tx, rx) = mpsc::channel(4);
        membership.insert("gone".to_string(), tx);
        drop(rx);

        let result = membership.fan_out(&frame("x"), None);
        assert_eq!(result.delivered, 0);
        assert_eq!(result.evicted, vec!["gone".to_string()]);
        assert_eq!(membership.len(), 0);
    }

    #[test]
    fn test_ids_sorted() {
        let mut membership = Membership::new();
        for id in ["c", "a", "b"] {
            let (tx, _rx) = mpsc::channel(1);
            membership.insert(id.to_string(), tx);
        }
        assert_eq!(membership.ids(), vec!["a", "b", "c"]);
    }

    proptest! {
        #[test]
        fn prop_every_member_but_sender_gets_one_copy(n in 1usize..24, k_seed in 0usize..1000) {
            let k = k_seed % n;
            let mut membership = Membership::new();
            let mut receivers = Vec::new();
            for i in 0..n {
                let (tx, rx) = mpsc::channel(4);
                membership.insert(format!("peer-{i}"), tx);
                receivers.push(rx);
            }

            let sender = format!("peer-{k}");
            let result = membership.fan_out(&frame("msg"), Some(&sender));
            prop_assert_eq!(result.delivered, n - 1);
            prop_assert!(result.evicted.is_empty());

            for (i, rx) in receivers.iter_mut().enumerate() {
                let mut copies = 0;
                while rx.try_recv().is_ok() {
                    copies += 1;
                }
                let expected = if i == k { 0 } else { 1 };
                prop_assert_eq!(copies, expected);
            }
        }
    }
}

//! # nomad-mailbox
//!
//! Asynchronous message exchange between agents that land on the same node.
//!
//! An agent arriving with a mailbox key first collects what the previous
//! agent left under that key on this host, then leaves its own message for
//! the next one. Each `(key, host)` slot holds only the latest deposit:
//! collecting never accumulates messages across calls.
//!
//! All operations go through one node-wide `Mutex`.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use nomad_contracts::agent::AgentId;

// ── Entries ───────────────────────────────────────────────────────────────────

/// The latest message left in one `(key, host)` slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxEntry {
    pub message: String,
    /// Agent that left the message, when known.
    pub deposited_by: Option<AgentId>,
    pub deposited_at: DateTime<Utc>,
}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Per-node mailbox, indexed by mailbox key and then by host name.
#[derive(Default)]
pub struct MailboxStore {
    slots: Mutex<HashMap<String, HashMap<String, MailboxEntry>>>,
}

impl MailboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leave `message` under `(key, host)`, replacing whatever was there.
    pub fn deposit(
        &self,
        key: &str,
        host: &str,
        message: impl Into<String>,
        deposited_by: Option<AgentId>,
    ) {
        let entry = MailboxEntry {
            message: message.into(),
            deposited_by,
            deposited_at: Utc::now(),
        };
        let replaced = self
            .lock()
            .entry(key.to_string())
            .or_default()
            .insert(host.to_string(), entry)
            .is_some();

        debug!(key, host, agent_id = ?deposited_by, replaced, "mailbox deposit");
    }

    /// Messages left under `key` for `host`: the latest deposit, or none.
    pub fn collect(&self, key: &str, host: &str) -> Vec<String> {
        self.entry(key, host).map(|e| e.message).into_iter().collect()
    }

    /// The full entry under `(key, host)`, if any.
    pub fn entry(&self, key: &str, host: &str) -> Option<MailboxEntry> {
        self.lock().get(key).and_then(|hosts| hosts.get(host)).cloned()
    }

    /// Number of occupied `(key, host)` slots.
    pub fn len(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Each operation is a single map update, so a poisoned lock still guards
    // consistent data.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, HashMap<String, MailboxEntry>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use super::*;

    #[test]
    fn empty_store_collects_nothing() {
        let store = MailboxStore::new();
        assert!(store.collect("K101", "uw1-320-11").is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn last_write_wins() {
        let store = MailboxStore::new();
        store.deposit("K101", "h1", "(1) first", Some(AgentId(1)));
        store.deposit("K101", "h1", "(2) second", Some(AgentId(2)));

        assert_eq!(store.collect("K101", "h1"), vec!["(2) second".to_string()]);
        let entry = store.entry("K101", "h1").unwrap();
        assert_eq!(entry.deposited_by, Some(AgentId(2)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn hosts_are_isolated() {
        let store = MailboxStore::new();
        store.deposit("K101", "h1", "for h1", None);
        store.deposit("K101", "h2", "for h2", None);

        assert_eq!(store.collect("K101", "h1"), vec!["for h1".to_string()]);
        assert_eq!(store.collect("K101", "h2"), vec!["for h2".to_string()]);
        assert!(store.collect("K101", "h3").is_empty());
        assert!(store.collect("K999", "h1").is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn collecting_does_not_accumulate() {
        let store = MailboxStore::new();
        store.deposit("K", "h", "a", None);
        assert_eq!(store.collect("K", "h").len(), 1);
        assert_eq!(store.collect("K", "h").len(), 1);

        store.deposit("K", "h", "b", None);
        assert_eq!(store.collect("K", "h"), vec!["b".to_string()]);
    }

    #[test]
    fn concurrent_deposits_keep_one_entry_per_slot() {
        let store = Arc::new(MailboxStore::new());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    store.deposit("K", "h", format!("({}) hi", i), Some(AgentId(i)));
                    store.deposit("K", &format!("h{}", i), "own", None);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.collect("K", "h").len(), 1);
        assert_eq!(store.len(), 9);
    }
}

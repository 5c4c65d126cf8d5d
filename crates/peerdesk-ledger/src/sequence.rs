//! Per-day sequence counters for transaction id minting.
//!
//! Each `(namespace, date)` pair carries its own monotonic counter.
//! Gaps are allowed; a value is never handed out twice. After a restart
//! the deployment restores each day's floor from durable storage via
//! [`SequenceGenerator::advance_to`] before minting resumes.

use std::collections::HashMap;

use chrono::NaiveDate;
use peerdesk_types::TransactionId;

/// Monotonic per-(namespace, day) counter service.
pub struct SequenceGenerator {
    counters: HashMap<(String, NaiveDate), u64>,
}

impl SequenceGenerator {
    /// Create a new generator with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: HashMap::new(),
        }
    }

    /// Next value for `(namespace, date)`, starting at 1.
    pub fn next(&mut self, namespace: &str, date: NaiveDate) -> u64 {
        let counter = self
            .counters
            .entry((namespace.to_string(), date))
            .or_insert(0);
        *counter += 1;
        *counter
    }

    /// Mint a transaction id: `{YYYYMMDD}_{seq:06}`.
    pub fn mint(&mut self, namespace: &str, date: NaiveDate) -> TransactionId {
        let seq = self.next(namespace, date);
        TransactionId::mint(date, seq)
    }

    /// Raise the counter floor for `(namespace, date)` to at least
    /// `floor`. Used to restore state after a restart; never lowers.
    pub fn advance_to(&mut self, namespace: &str, date: NaiveDate, floor: u64) {
        let counter = self
            .counters
            .entry((namespace.to_string(), date))
            .or_insert(0);
        *counter = (*counter).max(floor);
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

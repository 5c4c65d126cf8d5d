//! Ledger account state.
//!
//! Every user has a `total` balance and an `available` balance; the gap
//! between the two is the frozen portion locked by open listings,
//! transfers and withdrawals. `available <= total` always.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Per-user balance store with two counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerAccount {
    pub user_id: UserId,
    /// Everything the user owns on the platform, frozen or not.
    pub total: Decimal,
    /// Usable for new listings, transfers, withdrawals.
    pub available: Decimal,
}

impl LedgerAccount {
    /// Create a zeroed account for `user_id`.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            total: Decimal::ZERO,
            available: Decimal::ZERO,
        }
    }

    /// Funds locked by open listings / transfers / withdrawals.
    #[must_use]
    pub fn frozen(&self) -> Decimal {
        self.total - self.available
    }

    /// Whether both counters satisfy the ledger invariant:
    /// non-negative and `available <= total`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.available >= Decimal::ZERO && self.available <= self.total
    }
}

//! Account ledger — per-user total/available balance accounting.
//!
//! All mutations are atomic: either the full operation succeeds or the
//! balance is unchanged. Every operation validates first and mutates
//! last, so no error path leaves a half-applied balance.

use std::collections::HashMap;

use peerdesk_types::{DeskError, LedgerAccount, Result, UserId};
use rust_decimal::Decimal;

/// Source of truth for all account balance state.
///
/// The listing, order and funds engines call into it to freeze, release
/// and settle funds; they never touch the counters directly.
pub struct AccountLedger {
    accounts: HashMap<UserId, LedgerAccount>,
}

impl AccountLedger {
    /// Create a new empty account ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
        }
    }

    /// Credit funds: `total += amount`, `available += amount`.
    /// Creates the account if it does not exist yet.
    pub fn credit(&mut self, user_id: UserId, amount: Decimal) {
        let acct = self
            .accounts
            .entry(user_id)
            .or_insert_with(|| LedgerAccount::new(user_id));
        acct.total += amount;
        acct.available += amount;
        tracing::debug!(user = %user_id, %amount, "account credited");
    }

    /// Freeze funds: `available -= amount`, `total` unchanged.
    ///
    /// # Errors
    /// Returns `InsufficientBalance` if `available < amount`.
    pub fn freeze(&mut self, user_id: UserId, amount: Decimal) -> Result<()> {
        let acct = self
            .accounts
            .get_mut(&user_id)
            .ok_or(DeskError::InsufficientBalance {
                needed: amount,
                available: Decimal::ZERO,
            })?;

        if acct.available < amount {
            return Err(DeskError::InsufficientBalance {
                needed: amount,
                available: acct.available,
            });
        }

        acct.available -= amount;
        Ok(())
    }

    /// Unfreeze funds: `available += amount`, `total` unchanged.
    ///
    /// # Errors
    /// Returns `InsufficientFrozen` if the frozen portion is smaller
    /// than `amount` (unfreezing more would break `available <= total`).
    pub fn unfreeze(&mut self, user_id: UserId, amount: Decimal) -> Result<()> {
        let acct = self
            .accounts
            .get_mut(&user_id)
            .ok_or(DeskError::InsufficientFrozen)?;

        if acct.frozen() < amount {
            return Err(DeskError::InsufficientFrozen);
        }

        acct.available += amount;
        Ok(())
    }

    /// Consume frozen funds (settlement): `total -= amount`, nothing is
    /// returned to `available`.
    ///
    /// # Errors
    /// Returns `InsufficientFrozen` if the frozen portion is smaller
    /// than `amount`.
    pub fn consume_frozen(&mut self, user_id: UserId, amount: Decimal) -> Result<()> {
        let acct = self
            .accounts
            .get_mut(&user_id)
            .ok_or(DeskError::InsufficientFrozen)?;

        if acct.frozen() < amount {
            return Err(DeskError::InsufficientFrozen);
        }

        acct.total -= amount;
        Ok(())
    }

    /// Snapshot of a user's account. Zeroed if it does not exist.
    #[must_use]
    pub fn account(&self, user_id: UserId) -> LedgerAccount {
        self.accounts
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| LedgerAccount::new(user_id))
    }

    /// Current total balance of a user (0 if the account does not exist).
    #[must_use]
    pub fn total(&self, user_id: UserId) -> Decimal {
        self.account(user_id).total
    }

    /// Sum of all users' total balances.
    #[must_use]
    pub fn supply(&self) -> Decimal {
        self.accounts.values().map(|a| a.total).sum()
    }

    /// Iterate over all accounts (read-only; reconciliation checks).
    pub fn iter(&self) -> impl Iterator<Item = &LedgerAccount> {
        self.accounts.values()
    }
}

impl Default for AccountLedger {
    fn default() -> Self {
        Self::new()
    }
}

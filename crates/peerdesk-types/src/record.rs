//! Financial record types — the ledger rows behind every money movement.
//!
//! A record is opened `Ongoing` with zeroed amounts when the business
//! event begins and finalized exactly once (by confirmation, arbitration
//! or request approval). Once `Completed` it is immutable.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{TransactionId, UserId};

/// The business event a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Recharge,
    Withdraw,
    TransferSend,
    TransferReceive,
    OrderBuy,
    OrderSell,
    /// Auto-trading channel variants; kept for statement compatibility.
    OrderAutoBuy,
    OrderAutoSell,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recharge => write!(f, "RECHARGE"),
            Self::Withdraw => write!(f, "WITHDRAW"),
            Self::TransferSend => write!(f, "TRANSFER_SEND"),
            Self::TransferReceive => write!(f, "TRANSFER_RECEIVE"),
            Self::OrderBuy => write!(f, "ORDER_BUY"),
            Self::OrderSell => write!(f, "ORDER_SELL"),
            Self::OrderAutoBuy => write!(f, "ORDER_AUTO_BUY"),
            Self::OrderAutoSell => write!(f, "ORDER_AUTO_SELL"),
        }
    }
}

/// Settlement status of a record. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    Ongoing,
    Completed,
}

impl RecordStatus {
    /// Wire code kept stable for external consumers.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Ongoing => 0,
            Self::Completed => 1,
        }
    }
}

/// One signed money movement tied to a business event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialRecord {
    /// Unique, sequence-stamped id (`{date}_{seq}`).
    pub transaction_id: TransactionId,
    pub user_id: UserId,
    /// Nominal size of the business event.
    pub amount: Decimal,
    /// Signed settled amount: positive = credit, negative = debit,
    /// 0.00 = reversed / no-op. Meaningless until `Completed`.
    pub actual_amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub transaction_type: TransactionType,
    /// The order / transfer / withdraw / recharge row this belongs to.
    pub reference_id: Uuid,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, when the record is finalized.
    pub settled_at: Option<DateTime<Utc>>,
}

impl FinancialRecord {
    /// Open a fresh `Ongoing` record with zeroed amounts and balances.
    #[must_use]
    pub fn open(
        transaction_id: TransactionId,
        user_id: UserId,
        amount: Decimal,
        transaction_type: TransactionType,
        reference_id: Uuid,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            user_id,
            amount,
            actual_amount: Decimal::ZERO,
            balance_before: Decimal::ZERO,
            balance_after: Decimal::ZERO,
            transaction_type,
            reference_id,
            status: RecordStatus::Ongoing,
            created_at: at,
            settled_at: None,
        }
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.status == RecordStatus::Completed
    }
}

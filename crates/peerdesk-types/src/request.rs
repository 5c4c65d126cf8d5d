//! Peer money-movement requests: transfer, withdraw, recharge.
//!
//! All three follow the same settlement pattern as order arbitration:
//! frozen (where applicable) at submission, then approved or rejected by
//! an admin verdict that finalizes the associated financial record(s).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{RequestId, TransactionId, UserId};

/// Admin decision state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Wait,
    Approve,
    Reject,
}

impl RequestStatus {
    /// Wire code kept stable for external consumers.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Wait => 0,
            Self::Approve => 1,
            Self::Reject => -1,
        }
    }

    #[must_use]
    pub fn is_decided(self) -> bool {
        !matches!(self, Self::Wait)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wait => write!(f, "WAIT"),
            Self::Approve => write!(f, "APPROVE"),
            Self::Reject => write!(f, "REJECT"),
        }
    }
}

/// A peer-to-peer balance transfer awaiting approval.
/// `amount + fee` is frozen on the sender at submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub id: RequestId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: RequestStatus,
    pub send_transaction_id: TransactionId,
    pub receive_transaction_id: TransactionId,
    /// Sender totals, snapshotted at approval.
    pub balance_before: Option<Decimal>,
    pub balance_after: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl TransferRequest {
    /// What the sender's account actually parts with.
    #[must_use]
    pub fn charged(&self) -> Decimal {
        self.amount + self.fee
    }
}

/// A withdrawal to an off-platform destination awaiting approval.
/// `amount + fee` is frozen at submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: RequestStatus,
    pub transaction_id: TransactionId,
    pub balance_before: Option<Decimal>,
    pub balance_after: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl WithdrawRequest {
    #[must_use]
    pub fn charged(&self) -> Decimal {
        self.amount + self.fee
    }
}

/// An inbound top-up awaiting approval. Nothing is frozen at submission;
/// the funds originate off-platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RechargeRequest {
    pub id: RequestId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub status: RequestStatus,
    pub transaction_id: TransactionId,
    pub balance_before: Option<Decimal>,
    pub balance_after: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

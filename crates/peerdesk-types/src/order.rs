//! Order types and the order state machine.
//!
//! An order is a buyer's claim against a listing's stock. It moves
//! through a two-sided confirmation handshake (buyer marks the fiat
//! payment sent, seller confirms receipt) and can fall into timeout or
//! dispute along the way.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DeskError, ListingId, OrderId, PaymentMethod, Result, TransactionId, UserId};

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Waiting for the buyer to send the fiat payment.
    WaitBuyer,
    /// Buyer paid; waiting for the seller to confirm receipt.
    WaitSeller,
    /// Seller confirmed. Terminal.
    Completed,
    /// Timed out before the buyer paid. Terminal.
    Expired,
    /// Under dispute; only arbitration can move it further.
    Argue,
    /// Dispute resolved for the buyer. Terminal.
    ArgueApprove,
    /// Dispute voided. Terminal.
    ArgueReject,
}

impl OrderStatus {
    /// Wire code kept stable for external consumers.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::WaitBuyer => 0,
            Self::WaitSeller => 1,
            Self::Completed => 2,
            Self::Expired => 3,
            Self::Argue => 4,
            Self::ArgueApprove => 5,
            Self::ArgueReject => 6,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Expired | Self::ArgueApprove | Self::ArgueReject
        )
    }

    /// An open order still blocks its listing from being cancelled.
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, Self::WaitBuyer | Self::WaitSeller | Self::Argue)
    }

    /// The closed transition relation of the order state machine.
    #[must_use]
    pub fn can_become(self, next: Self) -> bool {
        match (self, next) {
            // Confirmation handshake.
            (Self::WaitBuyer, Self::WaitSeller) | (Self::WaitSeller, Self::Completed) => true,
            // Timeout: unpaid orders expire, silent sellers escalate.
            (Self::WaitBuyer, Self::Expired) | (Self::WaitSeller, Self::Argue) => true,
            // Arbitration verdicts.
            (Self::Argue, Self::ArgueApprove) | (Self::Argue, Self::ArgueReject) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WaitBuyer => write!(f, "WAIT_BUYER"),
            Self::WaitSeller => write!(f, "WAIT_SELLER"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Argue => write!(f, "ARGUE"),
            Self::ArgueApprove => write!(f, "ARGUE_APPROVE"),
            Self::ArgueReject => write!(f, "ARGUE_REJECT"),
        }
    }
}

/// Which side of the handshake is confirming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmRole {
    Buyer,
    Seller,
}

/// Arbitration verdict on a disputed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The buyer paid; settle in their favor.
    Approve,
    /// The dispute is void; no money moves.
    Reject,
}

impl Verdict {
    /// The terminal order status this verdict produces.
    #[must_use]
    pub fn order_status(self) -> OrderStatus {
        match self {
            Self::Approve => OrderStatus::ArgueApprove,
            Self::Reject => OrderStatus::ArgueReject,
        }
    }
}

/// Buyer-supplied fiat account details attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// Account holder name on the fiat side.
    pub account_name: String,
    /// Account number / handle on the fiat side.
    pub account_no: String,
}

impl PaymentDetails {
    const MAX_FIELD_LEN: usize = 128;

    /// Reject empty or oversized fields before anything is persisted.
    pub fn validate(&self) -> Result<()> {
        let bad = |reason: &str| DeskError::InvalidPaymentDetails {
            reason: reason.to_string(),
        };
        if self.account_name.trim().is_empty() {
            return Err(bad("account name is empty"));
        }
        if self.account_no.trim().is_empty() {
            return Err(bad("account number is empty"));
        }
        if self.account_name.len() > Self::MAX_FIELD_LEN
            || self.account_no.len() > Self::MAX_FIELD_LEN
        {
            return Err(bad("field exceeds 128 bytes"));
        }
        Ok(())
    }
}

/// One buy transaction against a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// The listing this order consumes stock from.
    pub listing_id: ListingId,
    /// Asset quantity bought.
    pub amount: Decimal,
    pub buy_user_id: UserId,
    pub sell_user_id: UserId,
    pub payment_method: PaymentMethod,
    /// CNY per asset unit at creation time.
    pub exchange_rate: Decimal,
    /// Asset-denominated settlement value (2 dp).
    pub total_price: Decimal,
    /// Fiat the buyer pays off-platform, rounded up to the fen.
    pub total_cny_price: Decimal,
    pub status: OrderStatus,
    /// Buy-side financial record, minted at creation.
    pub buy_transaction_id: TransactionId,
    /// Sell-side financial record, minted at creation.
    pub sell_transaction_id: TransactionId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(OrderStatus::WaitBuyer.code(), 0);
        assert_eq!(OrderStatus::WaitSeller.code(), 1);
        assert_eq!(OrderStatus::Completed.code(), 2);
        assert_eq!(OrderStatus::Expired.code(), 3);
        assert_eq!(OrderStatus::Argue.code(), 4);
        assert_eq!(OrderStatus::ArgueApprove.code(), 5);
        assert_eq!(OrderStatus::ArgueReject.code(), 6);
    }

    #[test]
    fn handshake_transitions() {
        assert!(OrderStatus::WaitBuyer.can_become(OrderStatus::WaitSeller));
        assert!(OrderStatus::WaitSeller.can_become(OrderStatus::Completed));
        assert!(!OrderStatus::WaitBuyer.can_become(OrderStatus::Completed));
        assert!(!OrderStatus::Completed.can_become(OrderStatus::WaitSeller));
    }

    #[test]
    fn timeout_transitions() {
        assert!(OrderStatus::WaitBuyer.can_become(OrderStatus::Expired));
        assert!(OrderStatus::WaitSeller.can_become(OrderStatus::Argue));
        assert!(!OrderStatus::WaitSeller.can_become(OrderStatus::Expired));
        assert!(!OrderStatus::Argue.can_become(OrderStatus::Expired));
    }

    #[test]
    fn arbitration_transitions() {
        assert!(OrderStatus::Argue.can_become(OrderStatus::ArgueApprove));
        assert!(OrderStatus::Argue.can_become(OrderStatus::ArgueReject));
        assert!(!OrderStatus::ArgueApprove.can_become(OrderStatus::ArgueReject));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [
            OrderStatus::Completed,
            OrderStatus::Expired,
            OrderStatus::ArgueApprove,
            OrderStatus::ArgueReject,
        ] {
            assert!(terminal.is_terminal());
            for next in [
                OrderStatus::WaitBuyer,
                OrderStatus::WaitSeller,
                OrderStatus::Completed,
                OrderStatus::Expired,
                OrderStatus::Argue,
                OrderStatus::ArgueApprove,
                OrderStatus::ArgueReject,
            ] {
                assert!(!terminal.can_become(next));
            }
        }
    }

    #[test]
    fn open_states_block_listing_cancel() {
        assert!(OrderStatus::WaitBuyer.is_open());
        assert!(OrderStatus::WaitSeller.is_open());
        assert!(OrderStatus::Argue.is_open());
        assert!(!OrderStatus::Expired.is_open());
    }

    #[test]
    fn verdict_maps_to_terminal_status() {
        assert_eq!(Verdict::Approve.order_status(), OrderStatus::ArgueApprove);
        assert_eq!(Verdict::Reject.order_status(), OrderStatus::ArgueReject);
    }

    #[test]
    fn payment_details_validation() {
        let ok = PaymentDetails {
            account_name: "Zhang San".into(),
            account_no: "6222-0000-1111".into(),
        };
        assert!(ok.validate().is_ok());

        let empty = PaymentDetails {
            account_name: "  ".into(),
            account_no: "x".into(),
        };
        assert!(empty.validate().is_err());

        let oversized = PaymentDetails {
            account_name: "a".repeat(200),
            account_no: "x".into(),
        };
        assert!(oversized.validate().is_err());
    }
}

//! Sell listing types.
//!
//! A listing is a seller's standing offer to sell a fixed quantity of the
//! platform asset through one fiat payment channel. Creating a listing
//! freezes the full `amount` on the seller's account; `remain_amount`
//! tracks the unsold portion.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ListingId, UserId};

/// Fiat payment channel attached to a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum PaymentMethod {
    Alipay,
    Wechat,
    Bank,
    Ecny,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alipay => write!(f, "ALIPAY"),
            Self::Wechat => write!(f, "WECHAT"),
            Self::Bank => write!(f, "BANK"),
            Self::Ecny => write!(f, "ECNY"),
        }
    }
}

/// Lifecycle status of a listing.
///
/// `Offsell` and `Forbidden` are admin-controlled shelf states;
/// `StockLock` parks the remaining stock while a child order is disputed;
/// `SellOut` and `Cancel` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ListingStatus {
    Offsell,
    Online,
    Forbidden,
    StockLock,
    SellOut,
    Cancel,
}

impl ListingStatus {
    /// Wire code kept stable for external consumers.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Offsell => 0,
            Self::Online => 1,
            Self::Forbidden => 2,
            Self::StockLock => 3,
            Self::SellOut => 4,
            Self::Cancel => 5,
        }
    }

    /// Whether the listing still occupies its seller's payment channel.
    /// One channel carries at most one listing in these states.
    #[must_use]
    pub fn occupies_channel(self) -> bool {
        matches!(self, Self::Online | Self::Forbidden | Self::StockLock)
    }

    /// Terminal states can never change again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::SellOut | Self::Cancel)
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offsell => write!(f, "OFFSELL"),
            Self::Online => write!(f, "ONLINE"),
            Self::Forbidden => write!(f, "FORBIDDEN"),
            Self::StockLock => write!(f, "STOCK_LOCK"),
            Self::SellOut => write!(f, "SELL_OUT"),
            Self::Cancel => write!(f, "CANCEL"),
        }
    }
}

/// A standing sell offer. Owns no orders; orders reference back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderListing {
    pub id: ListingId,
    /// The seller.
    pub user_id: UserId,
    /// Original size. Frozen on the seller's account at creation.
    pub amount: Decimal,
    /// Unsold / unlocked size. `0 <= remain_amount <= amount`.
    pub remain_amount: Decimal,
    /// Smallest order a buyer may open against this listing.
    pub min_sale_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub status: ListingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderListing {
    /// Whether the stock counters satisfy the listing invariant.
    #[must_use]
    pub fn stock_consistent(&self) -> bool {
        self.remain_amount >= Decimal::ZERO && self.remain_amount <= self.amount
    }
}

//! Error types for the PeerDesk settlement core.
//!
//! All errors use the `PD_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Listing errors
//! - 2xx: Balance errors
//! - 3xx: Order errors
//! - 4xx: Financial record errors
//! - 5xx: Request (transfer/withdraw/recharge) errors
//! - 9xx: General / internal errors
//!
//! Every variant also maps to an [`ErrorKind`] so callers can translate
//! failures uniformly: validation and not-found surface without state
//! change, conflicts mean the entity was in the wrong state, internal
//! means the whole operation rolled back.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{ListingId, OrderId, OrderStatus, RequestId, RequestStatus, TransactionId, UserId};

/// Coarse error classification for the response layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input. No state change.
    Validation,
    /// Entity missing. No state change.
    NotFound,
    /// Wrong state for the transition, or insufficient stock/balance.
    /// No state change.
    Conflict,
    /// Persistence-level failure; the operation rolled back.
    Internal,
}

/// Central error enum for all PeerDesk operations.
#[derive(Debug, Error)]
pub enum DeskError {
    // =================================================================
    // Listing Errors (1xx)
    // =================================================================
    /// The requested listing was not found (or is not visible to the caller).
    #[error("PD_ERR_100: Listing not found: {0}")]
    ListingNotFound(ListingId),

    /// The seller already has a live listing on this payment channel.
    #[error("PD_ERR_101: Payment channel already carries an active listing")]
    ListingChannelBusy,

    /// The listing is not in a sellable state.
    #[error("PD_ERR_102: Listing is {actual}, not ONLINE")]
    ListingNotOnline { actual: crate::ListingStatus },

    /// The listing still has an open child order.
    #[error("PD_ERR_103: Listing cannot be cancelled while orders are open")]
    ListingCancelForbidden,

    /// Not enough unsold stock left on the listing.
    #[error("PD_ERR_104: Insufficient listing stock: need {needed}, have {remaining}")]
    InsufficientListingStock { needed: Decimal, remaining: Decimal },

    /// The admin status change is not allowed from/to this state.
    #[error("PD_ERR_105: Listing status change forbidden: {actual} -> {requested}")]
    ListingStatusForbidden {
        actual: crate::ListingStatus,
        requested: crate::ListingStatus,
    },

    /// The seller has no default account bound for this payment channel.
    #[error("PD_ERR_106: No default payment account bound for {method}")]
    PaymentMethodNotBound { method: crate::PaymentMethod },

    // =================================================================
    // Balance Errors (2xx)
    // =================================================================
    /// Not enough available balance to perform the operation.
    #[error("PD_ERR_200: Insufficient available balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    /// Not enough frozen balance to consume or unfreeze.
    #[error("PD_ERR_201: Insufficient frozen balance")]
    InsufficientFrozen,

    /// The amount is non-positive or carries more than 2 decimal places.
    #[error("PD_ERR_202: Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// The requested account does not exist.
    #[error("PD_ERR_203: Account not found: {0}")]
    AccountNotFound(UserId),

    // =================================================================
    // Order Errors (3xx)
    // =================================================================
    /// The requested order was not found.
    #[error("PD_ERR_300: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order is in the wrong state for the requested transition.
    #[error("PD_ERR_301: Wrong order status: expected {expected}, got {actual}")]
    WrongOrderStatus {
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// The order is smaller than the listing's minimum sale amount.
    #[error("PD_ERR_302: Order below listing minimum: {min}")]
    OrderBelowMinimum { min: Decimal },

    /// Generic wrap of a persistence failure during order creation.
    /// The stock reservation has been undone.
    #[error("PD_ERR_303: Order creation failed: {reason}")]
    OrderCreateFail { reason: String },

    /// Buyer-supplied fiat account details failed validation.
    #[error("PD_ERR_304: Invalid payment details: {reason}")]
    InvalidPaymentDetails { reason: String },

    /// Both sides of the deal are the same user (own listing, self-transfer).
    #[error("PD_ERR_305: Self-trade prevented: counterparties are the same user")]
    SelfTradeBlocked,

    // =================================================================
    // Financial Record Errors (4xx)
    // =================================================================
    /// The referenced financial record does not exist.
    #[error("PD_ERR_400: Financial record not found: {0}")]
    RecordNotFound(TransactionId),

    /// The record was already finalized; settled rows are immutable.
    #[error("PD_ERR_401: Financial record already finalized: {0}")]
    RecordAlreadyFinalized(TransactionId),

    // =================================================================
    // Request Errors (5xx)
    // =================================================================
    /// The transfer/withdraw/recharge request does not exist.
    #[error("PD_ERR_500: Request not found: {0}")]
    RequestNotFound(RequestId),

    /// The request was already decided.
    #[error("PD_ERR_501: Wrong request status: expected {expected}, got {actual}")]
    WrongRequestStatus {
        expected: RequestStatus,
        actual: RequestStatus,
    },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error. Indicates a correctness bug, not a
    /// business conflict; the operation rolled back.
    #[error("PD_ERR_900: Internal error: {0}")]
    Internal(String),
}

impl DeskError {
    /// Stable numeric code surfaced to API consumers.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            Self::ListingNotFound(_) => 100,
            Self::ListingChannelBusy => 101,
            Self::ListingNotOnline { .. } => 102,
            Self::ListingCancelForbidden => 103,
            Self::InsufficientListingStock { .. } => 104,
            Self::ListingStatusForbidden { .. } => 105,
            Self::PaymentMethodNotBound { .. } => 106,
            Self::InsufficientBalance { .. } => 200,
            Self::InsufficientFrozen => 201,
            Self::InvalidAmount(_) => 202,
            Self::AccountNotFound(_) => 203,
            Self::OrderNotFound(_) => 300,
            Self::WrongOrderStatus { .. } => 301,
            Self::OrderBelowMinimum { .. } => 302,
            Self::OrderCreateFail { .. } => 303,
            Self::InvalidPaymentDetails { .. } => 304,
            Self::SelfTradeBlocked => 305,
            Self::RecordNotFound(_) => 400,
            Self::RecordAlreadyFinalized(_) => 401,
            Self::RequestNotFound(_) => 500,
            Self::WrongRequestStatus { .. } => 501,
            Self::Internal(_) => 900,
        }
    }

    /// Coarse classification for the response layer.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount(_)
            | Self::InvalidPaymentDetails { .. }
            | Self::OrderBelowMinimum { .. }
            | Self::SelfTradeBlocked
            | Self::PaymentMethodNotBound { .. } => ErrorKind::Validation,
            Self::ListingNotFound(_)
            | Self::AccountNotFound(_)
            | Self::OrderNotFound(_)
            | Self::RecordNotFound(_)
            | Self::RequestNotFound(_) => ErrorKind::NotFound,
            Self::ListingChannelBusy
            | Self::ListingNotOnline { .. }
            | Self::ListingCancelForbidden
            | Self::InsufficientListingStock { .. }
            | Self::ListingStatusForbidden { .. }
            | Self::InsufficientBalance { .. }
            | Self::InsufficientFrozen
            | Self::WrongOrderStatus { .. }
            | Self::RecordAlreadyFinalized(_)
            | Self::WrongRequestStatus { .. } => ErrorKind::Conflict,
            Self::OrderCreateFail { .. } | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, DeskError>;

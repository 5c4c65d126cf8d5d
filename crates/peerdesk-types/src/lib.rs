//! # peerdesk-types
//!
//! Shared types, errors, and configuration for the **PeerDesk**
//! marketplace settlement core.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`UserId`], [`ListingId`], [`OrderId`], [`RequestId`], [`TransactionId`]
//! - **Account model**: [`LedgerAccount`]
//! - **Listing model**: [`OrderListing`], [`ListingStatus`], [`PaymentMethod`]
//! - **Order model**: [`Order`], [`OrderStatus`], [`ConfirmRole`], [`Verdict`], [`PaymentDetails`]
//! - **Record model**: [`FinancialRecord`], [`TransactionType`], [`RecordStatus`]
//! - **Request model**: [`TransferRequest`], [`WithdrawRequest`], [`RechargeRequest`], [`RequestStatus`]
//! - **Money arithmetic**: the two rounding policies in [`money`]
//! - **Configuration**: [`DeskConfig`]
//! - **Errors**: [`DeskError`] with `PD_ERR_` prefix codes and the
//!   [`ErrorKind`] taxonomy
//! - **Constants**: system-wide limits and defaults

pub mod account;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod listing;
pub mod money;
pub mod order;
pub mod record;
pub mod request;

// Re-export all primary types at crate root for ergonomic imports:
//   use peerdesk_types::{Order, OrderStatus, FinancialRecord, ...};

pub use account::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use listing::*;
pub use order::*;
pub use record::*;
pub use request::*;

// Money helpers are accessed via `peerdesk_types::money::round_money`
// and constants via `peerdesk_types::constants::FOO`
// (not re-exported to avoid name collisions).

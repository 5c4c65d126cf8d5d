//! # peerdesk-market
//!
//! **Market Plane**: sell-listing lifecycle, stock reservation, and the
//! payment channel directory.
//!
//! ## Architecture
//!
//! 1. **PaymentDirectory**: which fiat channels a user can receive on
//! 2. **ListingEngine**: create (freeze-backed), cancel, stock
//!    reservation, admin shelf states
//!
//! ## Listing flow
//!
//! ```text
//! seller → AccountLedger.freeze() → ListingEngine.create() → ONLINE
//!        → OrderEngine.create_order() → reserve_stock()
//!        → cancel() → unfreeze(remainder) → CANCEL
//! ```
//!
//! Every listing is fully funded: the frozen portion of the seller's
//! account always covers the listing's unsettled stock.

pub mod listings;
pub mod payment;

pub use listings::{ChildOrderIndex, DisputeStockOutcome, ListingEngine};
pub use payment::PaymentDirectory;

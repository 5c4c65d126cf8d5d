//! # peerdesk-settlement
//!
//! **Settlement Plane**: order lifecycle, timeout sweep, arbitration,
//! and transfer/withdraw/recharge approval.
//!
//! ## Architecture
//!
//! The settlement plane sits on the ledger and market planes:
//! 1. **OrderEngine**: opens orders against listing stock and drives the
//!    two-sided confirmation handshake
//! 2. **arbitration::judge**: settles disputed orders one way or the
//!    other, keeping account, listing and record state consistent
//! 3. **FundsEngine**: the shared settle-or-unfreeze pattern for
//!    transfer, withdraw and recharge requests
//! 4. **SettlementDesk**: the facade owning every engine; a `&mut` of it
//!    is the transaction scope, and it notifies collaborators only after
//!    an operation committed
//!
//! ## Order flow
//!
//! ```text
//! create_order  → reserve_stock + open both records       (WAIT_BUYER)
//! confirm buyer → finalize buy-side record                (WAIT_SELLER)
//! confirm seller→ consume seller stake, credit buyer,
//!                 finalize sell-side record               (COMPLETED)
//! sweep         → WAIT_BUYER  -> EXPIRED (stale, unpaid)
//!                 WAIT_SELLER -> ARGUE   (stale, unreleased)
//! judge         → ARGUE -> ARGUE_APPROVE | ARGUE_REJECT
//! ```

pub mod arbitration;
pub mod desk;
pub mod funds;
pub mod notify;
pub mod orders;

pub use arbitration::{judge, JudgeOutcome};
pub use desk::SettlementDesk;
pub use funds::{FundsEngine, RequestKind, RequestOutcome};
pub use notify::{
    Broadcaster, MessageKind, MessagePush, Messenger, NullBroadcaster, NullMessenger,
    RecordingBroadcaster, RecordingMessenger,
};
pub use orders::{OrderEngine, SweepOutcome};

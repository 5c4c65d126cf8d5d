//! # peerdesk-ledger
//!
//! **Ledger Plane**: account balances, the financial record log, and
//! transaction-id sequence minting.
//!
//! ## Architecture
//!
//! 1. **AccountLedger**: per-user total/available accounting — every
//!    money-moving engine calls into it, none mutate balances directly
//! 2. **FinancialLedger**: one row per money movement, opened `Ongoing`,
//!    finalized exactly once, immutable afterwards
//! 3. **SequenceGenerator**: per-(namespace, day) monotonic counters
//!    minting `{date}_{seq}` transaction ids
//!
//! ## Balance model
//!
//! ```text
//! total = available + frozen
//! freeze:          available -= x            (listing / request created)
//! unfreeze:        available += x            (cancel / reject)
//! consume_frozen:  total     -= x            (settlement)
//! credit:          total += x, available += x (receive / recharge)
//! ```

pub mod accounts;
pub mod records;
pub mod sequence;

pub use accounts::AccountLedger;
pub use records::FinancialLedger;
pub use sequence::SequenceGenerator;

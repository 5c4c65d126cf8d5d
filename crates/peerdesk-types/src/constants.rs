//! System-wide constants for the PeerDesk settlement core.

/// Minutes before an unconfirmed order times out (either side).
pub const DEFAULT_ORDER_TIMEOUT_MINUTES: i64 = 20;

/// Zero-padded width of the per-day sequence in a transaction id.
pub const TRANSACTION_SEQ_WIDTH: usize = 6;

/// Sequence namespace for order records.
pub const SEQ_NS_ORDER: &str = "order";

/// Sequence namespace for transfer records.
pub const SEQ_NS_TRANSFER: &str = "transfer";

/// Sequence namespace for withdraw records.
pub const SEQ_NS_WITHDRAW: &str = "withdraw";

/// Sequence namespace for recharge records.
pub const SEQ_NS_RECHARGE: &str = "recharge";

/// Default page size cap for read-only queries.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

/// Broadcast event emitted after every settled verdict.
pub const EVENT_DESK_REFRESH: &str = "desk.refresh";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "PeerDesk";

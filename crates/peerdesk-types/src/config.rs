//! Configuration for the settlement desk.

use serde::{Deserialize, Serialize};

use crate::constants;

/// Tunable settlement parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskConfig {
    /// Minutes before an unconfirmed order times out. The sweep expires
    /// unpaid orders and escalates unreleased ones to dispute.
    pub order_timeout_minutes: i64,
    /// Hard cap applied to every paged query.
    pub max_page_size: usize,
}

impl DeskConfig {
    /// The order timeout as a `chrono` duration.
    #[must_use]
    pub fn order_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.order_timeout_minutes)
    }

    /// Clamp a caller-supplied page size to the configured cap.
    #[must_use]
    pub fn clamp_page_size(&self, requested: usize) -> usize {
        requested.min(self.max_page_size)
    }
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            order_timeout_minutes: constants::DEFAULT_ORDER_TIMEOUT_MINUTES,
            max_page_size: constants::DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_twenty_minutes() {
        let cfg = DeskConfig::default();
        assert_eq!(cfg.order_timeout(), chrono::Duration::minutes(20));
    }

    #[test]
    fn page_size_is_clamped() {
        let cfg = DeskConfig::default();
        assert_eq!(cfg.clamp_page_size(10), 10);
        assert_eq!(cfg.clamp_page_size(10_000), constants::DEFAULT_MAX_PAGE_SIZE);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = DeskConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: DeskConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.order_timeout_minutes, back.order_timeout_minutes);
        assert_eq!(cfg.max_page_size, back.max_page_size);
    }
}

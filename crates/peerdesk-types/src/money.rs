//! Money arithmetic for the PeerDesk ledger.
//!
//! All amounts are `rust_decimal::Decimal` fixed at 2 fractional digits.
//! Two rounding policies exist and are applied at their own call sites:
//!
//! - [`round_money`] — half-up to 2 dp, for platform-asset amounts;
//! - [`ceil_cny`] — ceiling to 2 dp, only for the fiat conversion
//!   `total_cny_price = ceil_cny(amount * exchange_rate)`.
//!
//! The two must not be unified: the fiat leg always rounds against the
//! payer, the asset leg rounds to nearest.

use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits carried by every ledger amount.
pub const MONEY_DP: u32 = 2;

/// Round a platform-asset amount half-up to 2 decimal places.
#[must_use]
pub fn round_money(x: Decimal) -> Decimal {
    x.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a CNY amount up to the next fen (2 dp ceiling).
#[must_use]
pub fn ceil_cny(x: Decimal) -> Decimal {
    x.round_dp_with_strategy(MONEY_DP, RoundingStrategy::ToPositiveInfinity)
}

/// Whether `x` is a valid ledger amount: strictly positive and
/// representable in 2 decimal places without truncation.
#[must_use]
pub fn is_valid_amount(x: Decimal) -> bool {
    x > Decimal::ZERO && x == x.round_dp_with_strategy(MONEY_DP, RoundingStrategy::ToZero)
}

/// Like [`is_valid_amount`] but admits zero (fees may be waived).
#[must_use]
pub fn is_valid_fee(x: Decimal) -> bool {
    x == Decimal::ZERO || is_valid_amount(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn round_money_half_up() {
        assert_eq!(round_money(dec("1.005")), dec("1.01"));
        assert_eq!(round_money(dec("1.004")), dec("1.00"));
        assert_eq!(round_money(dec("1.115")), dec("1.12"));
    }

    #[test]
    fn ceil_cny_always_rounds_up() {
        assert_eq!(ceil_cny(dec("1.001")), dec("1.01"));
        assert_eq!(ceil_cny(dec("6.9301")), dec("6.94"));
        assert_eq!(ceil_cny(dec("7.10")), dec("7.10"));
    }

    #[test]
    fn policies_diverge() {
        // 40.00 * 7.2501 = 290.004: half-up keeps 290.00, ceiling pays 290.01.
        let raw = dec("40.00") * dec("7.2501");
        assert_eq!(round_money(raw), dec("290.00"));
        assert_eq!(ceil_cny(raw), dec("290.01"));
    }

    #[test]
    fn valid_amount_checks() {
        assert!(is_valid_amount(dec("0.01")));
        assert!(is_valid_amount(dec("100.00")));
        assert!(!is_valid_amount(dec("0.001")));
        assert!(!is_valid_amount(Decimal::ZERO));
        assert!(!is_valid_amount(dec("-5.00")));
    }

    #[test]
    fn valid_fee_admits_zero() {
        assert!(is_valid_fee(Decimal::ZERO));
        assert!(is_valid_fee(dec("0.50")));
        assert!(!is_valid_fee(dec("-0.50")));
    }
}

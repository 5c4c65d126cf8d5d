//! Order engine — the confirmation handshake and the timeout sweep.
//!
//! An order is born `WaitBuyer` together with its two `Ongoing`
//! financial records (buy side and sell side). The buyer confirming the
//! fiat payment finalizes the buy-side record and hands the order to the
//! seller; the seller confirming receipt settles the balances and
//! finalizes the sell-side record. Orders nobody confirms are swept:
//! unpaid ones expire, unreleased ones escalate to dispute.
//!
//! Every transition re-validates the order status after exclusive access
//! is acquired, so a confirm racing the sweep loses cleanly.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use peerdesk_ledger::{AccountLedger, FinancialLedger, SequenceGenerator};
use peerdesk_market::{ChildOrderIndex, ListingEngine};
use peerdesk_types::{
    constants::SEQ_NS_ORDER, money, ConfirmRole, DeskError, FinancialRecord, ListingId, Order,
    OrderId, OrderStatus, PaymentDetails, Result, TransactionType, UserId,
};
use rust_decimal::Decimal;

/// What one run of the timeout sweep did.
#[derive(Debug, Default, Clone)]
pub struct SweepOutcome {
    /// Unpaid orders moved to `Expired`.
    pub expired: Vec<OrderId>,
    /// Paid-but-unreleased orders escalated to `Argue`.
    pub escalated: Vec<OrderId>,
}

/// Manages order lifecycle from creation through the handshake.
pub struct OrderEngine {
    orders: HashMap<OrderId, Order>,
    by_listing: HashMap<ListingId, Vec<OrderId>>,
}

impl OrderEngine {
    /// Create a new empty order engine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            orders: HashMap::new(),
            by_listing: HashMap::new(),
        }
    }

    /// Open an order against a listing.
    ///
    /// 1. Validate the payment details, the amount and the counterparty
    /// 2. Reserve stock on the listing
    /// 3. Mint both transaction ids and open both `Ongoing` records
    /// 4. Persist the order in `WaitBuyer`
    ///
    /// If record persistence fails, the stock reservation is undone and
    /// the error surfaces as `OrderCreateFail` — the caller observes no
    /// partial state.
    ///
    /// # Errors
    /// - `InvalidPaymentDetails` / `InvalidAmount` / `SelfTradeBlocked`
    ///   / `OrderBelowMinimum` for bad input
    /// - `ListingNotFound` / `ListingNotOnline` /
    ///   `InsufficientListingStock` from the stock reservation
    /// - `OrderCreateFail` when persistence breaks mid-way
    #[allow(clippy::too_many_arguments)]
    pub fn create_order(
        &mut self,
        listings: &mut ListingEngine,
        records: &mut FinancialLedger,
        sequence: &mut SequenceGenerator,
        listing_id: ListingId,
        buyer: UserId,
        amount: Decimal,
        exchange_rate: Decimal,
        details: &PaymentDetails,
        now: DateTime<Utc>,
    ) -> Result<OrderId> {
        details.validate()?;
        if !money::is_valid_amount(amount) {
            return Err(DeskError::InvalidAmount(amount));
        }
        if exchange_rate <= Decimal::ZERO {
            return Err(DeskError::InvalidAmount(exchange_rate));
        }

        let listing = listings
            .get(listing_id)
            .ok_or(DeskError::ListingNotFound(listing_id))?;
        let seller = listing.user_id;
        let payment_method = listing.payment_method;
        let min_sale_amount = listing.min_sale_amount;

        if buyer == seller {
            return Err(DeskError::SelfTradeBlocked);
        }
        if amount < min_sale_amount {
            return Err(DeskError::OrderBelowMinimum {
                min: min_sale_amount,
            });
        }

        listings.reserve_stock(listing_id, amount)?;

        // Both rounding policies live here on purpose: the asset leg
        // rounds to nearest, the fiat leg rounds against the payer.
        let total_price = money::round_money(amount);
        let total_cny_price = money::ceil_cny(amount * exchange_rate);

        let order_id = OrderId::new();
        let date = now.date_naive();
        let buy_transaction_id = sequence.mint(SEQ_NS_ORDER, date);
        let sell_transaction_id = sequence.mint(SEQ_NS_ORDER, date);

        let opened = records
            .open(FinancialRecord::open(
                buy_transaction_id.clone(),
                buyer,
                total_price,
                TransactionType::OrderBuy,
                order_id.0,
                now,
            ))
            .and_then(|()| {
                records.open(FinancialRecord::open(
                    sell_transaction_id.clone(),
                    seller,
                    total_price,
                    TransactionType::OrderSell,
                    order_id.0,
                    now,
                ))
            });
        if let Err(err) = opened {
            // Roll back: give the stock back and drop the half-opened
            // record pair before surfacing the wrapped failure.
            let _ = records.discard_ongoing(&buy_transaction_id);
            let _ = listings.restore_stock(listing_id, amount);
            return Err(DeskError::OrderCreateFail {
                reason: err.to_string(),
            });
        }

        self.orders.insert(
            order_id,
            Order {
                id: order_id,
                listing_id,
                amount,
                buy_user_id: buyer,
                sell_user_id: seller,
                payment_method,
                exchange_rate,
                total_price,
                total_cny_price,
                status: OrderStatus::WaitBuyer,
                buy_transaction_id,
                sell_transaction_id,
                created_at: now,
                updated_at: now,
            },
        );
        self.by_listing.entry(listing_id).or_default().push(order_id);
        tracing::info!(order = %order_id, listing = %listing_id, buyer = %buyer, %amount, "order created");
        Ok(order_id)
    }

    /// Advance the confirmation handshake.
    ///
    /// - `Buyer` marks the fiat payment sent: `WaitBuyer -> WaitSeller`,
    ///   finalizing the buy-side record with `+total_price`.
    /// - `Seller` confirms receipt: `WaitSeller -> Completed`, consuming
    ///   the seller's frozen stake, crediting the buyer, and finalizing
    ///   the sell-side record with `-total_price`.
    ///
    /// The status check runs against current state under exclusive
    /// access; a stale caller gets `WrongOrderStatus`, never a double
    /// settlement.
    ///
    /// # Errors
    /// - `OrderNotFound` if the order is unknown
    /// - `WrongOrderStatus` if the order is not waiting on this role
    pub fn confirm(
        &mut self,
        accounts: &mut AccountLedger,
        records: &mut FinancialLedger,
        order_id: OrderId,
        role: ConfirmRole,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let order = self
            .orders
            .get(&order_id)
            .ok_or(DeskError::OrderNotFound(order_id))?;

        match role {
            ConfirmRole::Buyer => {
                if order.status != OrderStatus::WaitBuyer {
                    return Err(DeskError::WrongOrderStatus {
                        expected: OrderStatus::WaitBuyer,
                        actual: order.status,
                    });
                }
                let buy_txid = order.buy_transaction_id.clone();
                let total_price = order.total_price;
                records.ensure_ongoing(&buy_txid)?;

                let before = accounts.total(order.buy_user_id);
                records.finalize(&buy_txid, total_price, before, before + total_price, now)?;
            }
            ConfirmRole::Seller => {
                if order.status != OrderStatus::WaitSeller {
                    return Err(DeskError::WrongOrderStatus {
                        expected: OrderStatus::WaitSeller,
                        actual: order.status,
                    });
                }
                let sell_txid = order.sell_transaction_id.clone();
                let total_price = order.total_price;
                let seller = order.sell_user_id;
                let buyer = order.buy_user_id;
                records.ensure_ongoing(&sell_txid)?;

                let before = accounts.total(seller);
                accounts.consume_frozen(seller, total_price)?;
                accounts.credit(buyer, total_price);
                records.finalize(&sell_txid, -total_price, before, before - total_price, now)?;
            }
        }

        let order = self
            .orders
            .get_mut(&order_id)
            .ok_or(DeskError::OrderNotFound(order_id))?;
        order.status = match role {
            ConfirmRole::Buyer => OrderStatus::WaitSeller,
            ConfirmRole::Seller => OrderStatus::Completed,
        };
        order.updated_at = now;
        tracing::info!(order = %order_id, status = %order.status, "order confirmed");
        Ok(())
    }

    /// Timeout sweep, called periodically by an external scheduler.
    ///
    /// Orders still `WaitBuyer` after `timeout` expire; orders still
    /// `WaitSeller` escalate to `Argue` for arbitration. Each order's
    /// status is re-checked right before mutating, so a sweep racing a
    /// confirm is a no-op for orders that moved on.
    pub fn sweep(&mut self, now: DateTime<Utc>, timeout: chrono::Duration) -> SweepOutcome {
        let stale: Vec<OrderId> = self
            .orders
            .values()
            .filter(|o| !o.status.is_terminal() && now - o.created_at >= timeout)
            .map(|o| o.id)
            .collect();

        let mut outcome = SweepOutcome::default();
        for order_id in stale {
            let Some(order) = self.orders.get_mut(&order_id) else {
                continue;
            };
            match order.status {
                OrderStatus::WaitBuyer => {
                    // TODO: restore the listing's reserved stock when an
                    // unpaid order expires; today the stock stays consumed.
                    order.status = OrderStatus::Expired;
                    order.updated_at = now;
                    outcome.expired.push(order_id);
                }
                OrderStatus::WaitSeller => {
                    order.status = OrderStatus::Argue;
                    order.updated_at = now;
                    outcome.escalated.push(order_id);
                }
                // Anything else moved on since the scan; leave it alone.
                _ => {}
            }
        }

        if !outcome.expired.is_empty() || !outcome.escalated.is_empty() {
            tracing::info!(
                expired = outcome.expired.len(),
                escalated = outcome.escalated.len(),
                "timeout sweep"
            );
        }
        outcome
    }

    /// Look up an order by id.
    #[must_use]
    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    /// Mutable access for arbitration. Crate-internal.
    pub(crate) fn get_mut(&mut self, order_id: OrderId) -> Option<&mut Order> {
        self.orders.get_mut(&order_id)
    }

    /// One page of a user's orders (either side), oldest first.
    #[must_use]
    pub fn page_for_user(&self, user_id: UserId, offset: usize, limit: usize) -> Vec<&Order> {
        let mut rows: Vec<&Order> = self
            .orders
            .values()
            .filter(|o| o.buy_user_id == user_id || o.sell_user_id == user_id)
            .collect();
        rows.sort_by_key(|o| o.id);
        rows.into_iter().skip(offset).take(limit).collect()
    }

    /// Number of orders tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether no orders exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl Default for OrderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ChildOrderIndex for OrderEngine {
    fn open_child_count(&self, listing_id: ListingId) -> usize {
        self.by_listing
            .get(&listing_id)
            .map_or(0, |ids| {
                ids.iter()
                    .filter(|id| {
                        self.orders
                            .get(id)
                            .is_some_and(|o| o.status.is_open())
                    })
                    .count()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerdesk_market::PaymentDirectory;
    use peerdesk_types::{PaymentMethod, RecordStatus};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    struct Fixture {
        accounts: AccountLedger,
        listings: ListingEngine,
        records: FinancialLedger,
        sequence: SequenceGenerator,
        orders: OrderEngine,
        seller: UserId,
        buyer: UserId,
        listing_id: ListingId,
    }

    fn fixture() -> Fixture {
        let mut accounts = AccountLedger::new();
        let mut listings = ListingEngine::new();
        let mut directory = PaymentDirectory::new();
        let seller = UserId::new();
        let buyer = UserId::new();
        accounts.credit(seller, dec("100.00"));
        directory.bind(seller, PaymentMethod::Alipay);
        let listing_id = listings
            .create(
                &mut accounts,
                &directory,
                seller,
                dec("100.00"),
                dec("10.00"),
                PaymentMethod::Alipay,
                Utc::now(),
            )
            .unwrap();
        Fixture {
            accounts,
            listings,
            records: FinancialLedger::new(),
            sequence: SequenceGenerator::new(),
            orders: OrderEngine::new(),
            seller,
            buyer,
            listing_id,
        }
    }

    fn details() -> PaymentDetails {
        PaymentDetails {
            account_name: "Li Si".into(),
            account_no: "13800000000".into(),
        }
    }

    fn open_order(fx: &mut Fixture, amount: &str) -> OrderId {
        fx.orders
            .create_order(
                &mut fx.listings,
                &mut fx.records,
                &mut fx.sequence,
                fx.listing_id,
                fx.buyer,
                dec(amount),
                dec("7.25"),
                &details(),
                Utc::now(),
            )
            .unwrap()
    }

    #[test]
    fn create_order_reserves_stock_and_opens_records() {
        let mut fx = fixture();
        let order_id = open_order(&mut fx, "40.00");

        let order = fx.orders.get(order_id).unwrap();
        assert_eq!(order.status, OrderStatus::WaitBuyer);
        assert_eq!(order.total_price, dec("40.00"));
        // 40.00 * 7.25 = 290.00 exactly; ceiling is a no-op here.
        assert_eq!(order.total_cny_price, dec("290.00"));
        assert_eq!(
            fx.listings.get(fx.listing_id).unwrap().remain_amount,
            dec("60.00")
        );

        let buy = fx.records.get(&order.buy_transaction_id).unwrap();
        let sell = fx.records.get(&order.sell_transaction_id).unwrap();
        assert_eq!(buy.status, RecordStatus::Ongoing);
        assert_eq!(sell.status, RecordStatus::Ongoing);
        assert_eq!(buy.actual_amount, Decimal::ZERO);
        assert_eq!(sell.actual_amount, Decimal::ZERO);
    }

    #[test]
    fn cny_price_rounds_up() {
        let mut fx = fixture();
        let order_id = fx
            .orders
            .create_order(
                &mut fx.listings,
                &mut fx.records,
                &mut fx.sequence,
                fx.listing_id,
                fx.buyer,
                dec("40.00"),
                dec("7.2501"),
                &details(),
                Utc::now(),
            )
            .unwrap();
        // 40.00 * 7.2501 = 290.004 -> buyer pays 290.01.
        assert_eq!(
            fx.orders.get(order_id).unwrap().total_cny_price,
            dec("290.01")
        );
    }

    #[test]
    fn create_order_rejects_own_listing() {
        let mut fx = fixture();
        let err = fx
            .orders
            .create_order(
                &mut fx.listings,
                &mut fx.records,
                &mut fx.sequence,
                fx.listing_id,
                fx.seller,
                dec("40.00"),
                dec("7.25"),
                &details(),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DeskError::SelfTradeBlocked));
    }

    #[test]
    fn create_order_below_minimum_rejected() {
        let mut fx = fixture();
        let err = fx
            .orders
            .create_order(
                &mut fx.listings,
                &mut fx.records,
                &mut fx.sequence,
                fx.listing_id,
                fx.buyer,
                dec("5.00"),
                dec("7.25"),
                &details(),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DeskError::OrderBelowMinimum { .. }));
        assert_eq!(
            fx.listings.get(fx.listing_id).unwrap().remain_amount,
            dec("100.00")
        );
    }

    #[test]
    fn create_order_beyond_stock_rejected() {
        let mut fx = fixture();
        open_order(&mut fx, "80.00");
        let err = fx
            .orders
            .create_order(
                &mut fx.listings,
                &mut fx.records,
                &mut fx.sequence,
                fx.listing_id,
                fx.buyer,
                dec("30.00"),
                dec("7.25"),
                &details(),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DeskError::InsufficientListingStock { .. }));
    }

    #[test]
    fn buyer_confirm_finalizes_buy_record() {
        let mut fx = fixture();
        let order_id = open_order(&mut fx, "40.00");

        fx.orders
            .confirm(
                &mut fx.accounts,
                &mut fx.records,
                order_id,
                ConfirmRole::Buyer,
                Utc::now(),
            )
            .unwrap();

        let order = fx.orders.get(order_id).unwrap();
        assert_eq!(order.status, OrderStatus::WaitSeller);
        let buy = fx.records.get(&order.buy_transaction_id).unwrap();
        assert_eq!(buy.status, RecordStatus::Completed);
        assert_eq!(buy.actual_amount, dec("40.00"));
        // No balance moves on the buyer leg.
        assert_eq!(fx.accounts.total(fx.buyer), Decimal::ZERO);
    }

    #[test]
    fn seller_confirm_settles_balances() {
        let mut fx = fixture();
        let order_id = open_order(&mut fx, "40.00");
        fx.orders
            .confirm(
                &mut fx.accounts,
                &mut fx.records,
                order_id,
                ConfirmRole::Buyer,
                Utc::now(),
            )
            .unwrap();
        fx.orders
            .confirm(
                &mut fx.accounts,
                &mut fx.records,
                order_id,
                ConfirmRole::Seller,
                Utc::now(),
            )
            .unwrap();

        let order = fx.orders.get(order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Completed);

        // Seller parts with 40.00 of frozen stake, buyer receives it.
        let seller_acct = fx.accounts.account(fx.seller);
        assert_eq!(seller_acct.total, dec("60.00"));
        assert_eq!(seller_acct.available, dec("0.00"));
        let buyer_acct = fx.accounts.account(fx.buyer);
        assert_eq!(buyer_acct.total, dec("40.00"));
        assert_eq!(buyer_acct.available, dec("40.00"));

        let sell = fx.records.get(&order.sell_transaction_id).unwrap();
        assert_eq!(sell.actual_amount, dec("-40.00"));
        assert_eq!(sell.balance_before, dec("100.00"));
        assert_eq!(sell.balance_after, dec("60.00"));
    }

    #[test]
    fn confirm_out_of_turn_is_conflict() {
        let mut fx = fixture();
        let order_id = open_order(&mut fx, "40.00");

        let err = fx
            .orders
            .confirm(
                &mut fx.accounts,
                &mut fx.records,
                order_id,
                ConfirmRole::Seller,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DeskError::WrongOrderStatus { .. }));

        fx.orders
            .confirm(
                &mut fx.accounts,
                &mut fx.records,
                order_id,
                ConfirmRole::Buyer,
                Utc::now(),
            )
            .unwrap();
        let err = fx
            .orders
            .confirm(
                &mut fx.accounts,
                &mut fx.records,
                order_id,
                ConfirmRole::Buyer,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DeskError::WrongOrderStatus { .. }));
    }

    #[test]
    fn sweep_expires_unpaid_orders() {
        let mut fx = fixture();
        let order_id = open_order(&mut fx, "40.00");
        let created = fx.orders.get(order_id).unwrap().created_at;

        // One minute early: nothing happens.
        let outcome = fx
            .orders
            .sweep(created + chrono::Duration::minutes(19), chrono::Duration::minutes(20));
        assert!(outcome.expired.is_empty());

        let outcome = fx
            .orders
            .sweep(created + chrono::Duration::minutes(21), chrono::Duration::minutes(20));
        assert_eq!(outcome.expired, vec![order_id]);
        assert_eq!(fx.orders.get(order_id).unwrap().status, OrderStatus::Expired);
        // Listing stock stays consumed when an unpaid order expires.
        assert_eq!(
            fx.listings.get(fx.listing_id).unwrap().remain_amount,
            dec("60.00")
        );
    }

    #[test]
    fn sweep_escalates_unreleased_orders() {
        let mut fx = fixture();
        let order_id = open_order(&mut fx, "40.00");
        fx.orders
            .confirm(
                &mut fx.accounts,
                &mut fx.records,
                order_id,
                ConfirmRole::Buyer,
                Utc::now(),
            )
            .unwrap();
        let created = fx.orders.get(order_id).unwrap().created_at;

        let outcome = fx
            .orders
            .sweep(created + chrono::Duration::minutes(21), chrono::Duration::minutes(20));
        assert_eq!(outcome.escalated, vec![order_id]);
        assert_eq!(fx.orders.get(order_id).unwrap().status, OrderStatus::Argue);
    }

    #[test]
    fn sweep_skips_settled_orders() {
        let mut fx = fixture();
        let order_id = open_order(&mut fx, "40.00");
        for role in [ConfirmRole::Buyer, ConfirmRole::Seller] {
            fx.orders
                .confirm(&mut fx.accounts, &mut fx.records, order_id, role, Utc::now())
                .unwrap();
        }
        let created = fx.orders.get(order_id).unwrap().created_at;

        let outcome = fx
            .orders
            .sweep(created + chrono::Duration::hours(1), chrono::Duration::minutes(20));
        assert!(outcome.expired.is_empty());
        assert!(outcome.escalated.is_empty());
        assert_eq!(
            fx.orders.get(order_id).unwrap().status,
            OrderStatus::Completed
        );
    }

    #[test]
    fn open_children_block_listing_cancel() {
        let mut fx = fixture();
        let order_id = open_order(&mut fx, "40.00");
        assert_eq!(fx.orders.open_child_count(fx.listing_id), 1);

        for role in [ConfirmRole::Buyer, ConfirmRole::Seller] {
            fx.orders
                .confirm(&mut fx.accounts, &mut fx.records, order_id, role, Utc::now())
                .unwrap();
        }
        assert_eq!(fx.orders.open_child_count(fx.listing_id), 0);
    }
}

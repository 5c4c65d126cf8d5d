//! Listing engine — sell-listing lifecycle and stock reservation.
//!
//! Creating a listing atomically freezes the full `amount` on the
//! seller's account; if the freeze fails, no listing exists. Cancelling
//! returns the unsold remainder to the seller. Stock reservation is the
//! order engine's entry point and never changes the listing status:
//! a listing that sells down to zero stays `Online` until arbitration
//! or the seller decides otherwise.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use peerdesk_ledger::AccountLedger;
use peerdesk_types::{
    money, DeskError, ListingId, ListingStatus, OrderListing, PaymentMethod, Result, UserId,
};
use rust_decimal::Decimal;

use crate::payment::PaymentDirectory;

/// The settlement crate's order engine implements this so the market
/// crate can refuse to cancel a listing with live children without
/// depending on the order model itself.
pub trait ChildOrderIndex {
    /// Number of orders against `listing_id` still in an open state
    /// (waiting on either side, or under dispute).
    fn open_child_count(&self, listing_id: ListingId) -> usize;
}

/// Manages the listing lifecycle: create, cancel, stock, admin states.
pub struct ListingEngine {
    listings: HashMap<ListingId, OrderListing>,
}

impl ListingEngine {
    /// Create a new empty listing engine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listings: HashMap::new(),
        }
    }

    /// Post a sell listing, freezing `amount` on the seller's account.
    ///
    /// 1. Validate the amounts and the seller's payment channel
    /// 2. Refuse if the channel already carries a live listing
    /// 3. Freeze `amount` (atomic — if this fails, nothing changes)
    /// 4. Insert the listing `Online` with `remain_amount = amount`
    ///
    /// # Errors
    /// - `InvalidAmount` for non-positive or sub-cent amounts
    /// - `PaymentMethodNotBound` if the seller cannot receive on `method`
    /// - `ListingChannelBusy` if a live listing occupies the channel
    /// - `InsufficientBalance` if the freeze fails
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &mut self,
        accounts: &mut AccountLedger,
        directory: &PaymentDirectory,
        seller: UserId,
        amount: Decimal,
        min_sale_amount: Decimal,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<ListingId> {
        if !money::is_valid_amount(amount) {
            return Err(DeskError::InvalidAmount(amount));
        }
        if !money::is_valid_amount(min_sale_amount) || min_sale_amount > amount {
            return Err(DeskError::InvalidAmount(min_sale_amount));
        }
        if !directory.is_bound(seller, method) {
            return Err(DeskError::PaymentMethodNotBound { method });
        }
        let channel_busy = self
            .listings
            .values()
            .any(|l| l.user_id == seller && l.payment_method == method && l.status.occupies_channel());
        if channel_busy {
            return Err(DeskError::ListingChannelBusy);
        }

        accounts.freeze(seller, amount)?;

        let id = ListingId::new();
        self.listings.insert(
            id,
            OrderListing {
                id,
                user_id: seller,
                amount,
                remain_amount: amount,
                min_sale_amount,
                payment_method: method,
                status: ListingStatus::Online,
                created_at: now,
                updated_at: now,
            },
        );
        tracing::info!(listing = %id, seller = %seller, %amount, %method, "listing created");
        Ok(id)
    }

    /// Seller-initiated cancel: only `Online` listings with no open child
    /// order. Unfreezes the unsold remainder.
    ///
    /// # Errors
    /// - `ListingNotFound` if the id is unknown or owned by someone else
    /// - `ListingCancelForbidden` if a child order is still open
    /// - `ListingNotOnline` if the listing left the sellable state
    pub fn cancel(
        &mut self,
        accounts: &mut AccountLedger,
        orders: &impl ChildOrderIndex,
        seller: UserId,
        listing_id: ListingId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let listing = self
            .listings
            .get(&listing_id)
            .filter(|l| l.user_id == seller)
            .ok_or(DeskError::ListingNotFound(listing_id))?;

        if orders.open_child_count(listing_id) > 0 {
            return Err(DeskError::ListingCancelForbidden);
        }
        if listing.status != ListingStatus::Online {
            return Err(DeskError::ListingNotOnline {
                actual: listing.status,
            });
        }

        let remainder = listing.remain_amount;
        accounts.unfreeze(seller, remainder)?;

        let listing = self
            .listings
            .get_mut(&listing_id)
            .ok_or(DeskError::ListingNotFound(listing_id))?;
        listing.status = ListingStatus::Cancel;
        listing.updated_at = now;
        tracing::info!(listing = %listing_id, seller = %seller, %remainder, "listing cancelled");
        Ok(())
    }

    /// Consume `amount` of unsold stock for a new order. Status is left
    /// untouched even when the stock reaches zero.
    ///
    /// # Errors
    /// - `ListingNotFound` if the id is unknown
    /// - `ListingNotOnline` if the listing is not sellable
    /// - `InsufficientListingStock` if `amount > remain_amount`
    pub fn reserve_stock(&mut self, listing_id: ListingId, amount: Decimal) -> Result<()> {
        let listing = self
            .listings
            .get_mut(&listing_id)
            .ok_or(DeskError::ListingNotFound(listing_id))?;

        if listing.status != ListingStatus::Online {
            return Err(DeskError::ListingNotOnline {
                actual: listing.status,
            });
        }
        if amount > listing.remain_amount {
            return Err(DeskError::InsufficientListingStock {
                needed: amount,
                remaining: listing.remain_amount,
            });
        }

        listing.remain_amount -= amount;
        Ok(())
    }

    /// Return `amount` of stock to the listing (order rollback, dispute
    /// rejected).
    ///
    /// # Errors
    /// `Internal` if the restore would push `remain_amount` past
    /// `amount` — the stock invariant broke somewhere upstream.
    pub fn restore_stock(&mut self, listing_id: ListingId, amount: Decimal) -> Result<()> {
        let listing = self
            .listings
            .get_mut(&listing_id)
            .ok_or(DeskError::ListingNotFound(listing_id))?;

        if listing.remain_amount + amount > listing.amount {
            return Err(DeskError::Internal(format!(
                "stock restore overflow on {listing_id}: {} + {amount} > {}",
                listing.remain_amount, listing.amount
            )));
        }

        listing.remain_amount += amount;
        Ok(())
    }

    /// Admin-forced status change between the shelf states
    /// (`Offsell`, `Online`, `Forbidden`, `StockLock`).
    ///
    /// # Errors
    /// `ListingStatusForbidden` when the listing is terminal or the
    /// target is a settlement outcome (`SellOut`, `Cancel`).
    pub fn update_status(
        &mut self,
        listing_id: ListingId,
        status: ListingStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let listing = self
            .listings
            .get_mut(&listing_id)
            .ok_or(DeskError::ListingNotFound(listing_id))?;

        if listing.status.is_terminal() || status.is_terminal() {
            return Err(DeskError::ListingStatusForbidden {
                actual: listing.status,
                requested: status,
            });
        }

        tracing::info!(listing = %listing_id, from = %listing.status, to = %status, "listing status forced");
        listing.status = status;
        listing.updated_at = now;
        Ok(())
    }

    /// Settlement-side mutation hook used by arbitration: lets the caller
    /// rewrite stock and status together under its own invariant checks.
    pub(crate) fn get_mut(&mut self, listing_id: ListingId) -> Option<&mut OrderListing> {
        self.listings.get_mut(&listing_id)
    }

    /// Apply an arbitration outcome to the listing row. Exposed for the
    /// settlement crate; not part of the public market API.
    ///
    /// # Errors
    /// `Internal` if the listing vanished mid-operation.
    pub fn settle_dispute_stock(
        &mut self,
        listing_id: ListingId,
        outcome: DisputeStockOutcome,
        now: DateTime<Utc>,
    ) -> Result<Decimal> {
        let listing = self
            .get_mut(listing_id)
            .ok_or_else(|| DeskError::Internal(format!("listing {listing_id} vanished")))?;

        let released = match outcome {
            DisputeStockOutcome::Restore { amount } => {
                if listing.remain_amount + amount > listing.amount {
                    return Err(DeskError::Internal(format!(
                        "stock restore overflow on {listing_id}"
                    )));
                }
                listing.remain_amount += amount;
                if listing.status == ListingStatus::StockLock {
                    listing.status = ListingStatus::Online;
                }
                Decimal::ZERO
            }
            DisputeStockOutcome::SellOutIfLocked => {
                if listing.status == ListingStatus::StockLock {
                    let released = listing.remain_amount;
                    listing.remain_amount = Decimal::ZERO;
                    listing.status = ListingStatus::SellOut;
                    released
                } else {
                    Decimal::ZERO
                }
            }
        };
        listing.updated_at = now;
        Ok(released)
    }

    /// Look up a listing by id.
    #[must_use]
    pub fn get(&self, listing_id: ListingId) -> Option<&OrderListing> {
        self.listings.get(&listing_id)
    }

    /// One page of listings filtered by status, newest id last.
    #[must_use]
    pub fn page(
        &self,
        status: Option<ListingStatus>,
        offset: usize,
        limit: usize,
    ) -> Vec<&OrderListing> {
        let mut rows: Vec<&OrderListing> = self
            .listings
            .values()
            .filter(|l| status.is_none_or(|s| l.status == s))
            .collect();
        rows.sort_by_key(|l| l.id);
        rows.into_iter().skip(offset).take(limit).collect()
    }

    /// Number of listings tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    /// Whether no listings exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}

impl Default for ListingEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// How arbitration wants the listing's stock resolved.
#[derive(Debug, Clone, Copy)]
pub enum DisputeStockOutcome {
    /// Dispute voided: give the disputed stock back; a stock-locked
    /// listing goes back on sale.
    Restore { amount: Decimal },
    /// Dispute upheld: a stock-locked listing is closed out, releasing
    /// its remaining (frozen) stock back to the seller's available
    /// balance. Returns the released amount.
    SellOutIfLocked,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoChildren;
    impl ChildOrderIndex for NoChildren {
        fn open_child_count(&self, _listing_id: ListingId) -> usize {
            0
        }
    }

    struct OneChild;
    impl ChildOrderIndex for OneChild {
        fn open_child_count(&self, _listing_id: ListingId) -> usize {
            1
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn setup() -> (ListingEngine, AccountLedger, PaymentDirectory, UserId) {
        let engine = ListingEngine::new();
        let mut accounts = AccountLedger::new();
        let mut directory = PaymentDirectory::new();
        let seller = UserId::new();
        accounts.credit(seller, dec("100.00"));
        directory.bind(seller, PaymentMethod::Alipay);
        (engine, accounts, directory, seller)
    }

    fn create(
        engine: &mut ListingEngine,
        accounts: &mut AccountLedger,
        directory: &PaymentDirectory,
        seller: UserId,
        amount: &str,
    ) -> ListingId {
        engine
            .create(
                accounts,
                directory,
                seller,
                dec(amount),
                dec("10.00"),
                PaymentMethod::Alipay,
                Utc::now(),
            )
            .unwrap()
    }

    #[test]
    fn create_freezes_and_goes_online() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let id = create(&mut engine, &mut accounts, &directory, seller, "100.00");

        let listing = engine.get(id).unwrap();
        assert_eq!(listing.status, ListingStatus::Online);
        assert_eq!(listing.remain_amount, dec("100.00"));

        let acct = accounts.account(seller);
        assert_eq!(acct.available, dec("0.00"));
        assert_eq!(acct.total, dec("100.00"));
    }

    #[test]
    fn create_fails_without_bound_channel() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let err = engine
            .create(
                &mut accounts,
                &directory,
                seller,
                dec("50.00"),
                dec("10.00"),
                PaymentMethod::Wechat,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DeskError::PaymentMethodNotBound { .. }));
        assert_eq!(accounts.account(seller).available, dec("100.00"));
    }

    #[test]
    fn create_fails_when_channel_busy() {
        let (mut engine, mut accounts, directory, seller) = setup();
        create(&mut engine, &mut accounts, &directory, seller, "50.00");
        let err = engine
            .create(
                &mut accounts,
                &directory,
                seller,
                dec("20.00"),
                dec("10.00"),
                PaymentMethod::Alipay,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DeskError::ListingChannelBusy));
    }

    #[test]
    fn create_fails_when_balance_short() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let err = engine
            .create(
                &mut accounts,
                &directory,
                seller,
                dec("150.00"),
                dec("10.00"),
                PaymentMethod::Alipay,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DeskError::InsufficientBalance { .. }));
        assert!(engine.is_empty());
    }

    #[test]
    fn min_above_amount_rejected() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let err = engine
            .create(
                &mut accounts,
                &directory,
                seller,
                dec("50.00"),
                dec("60.00"),
                PaymentMethod::Alipay,
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DeskError::InvalidAmount(_)));
    }

    #[test]
    fn cancel_unfreezes_remainder() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let id = create(&mut engine, &mut accounts, &directory, seller, "100.00");
        engine.reserve_stock(id, dec("40.00")).unwrap();

        engine
            .cancel(&mut accounts, &NoChildren, seller, id, Utc::now())
            .unwrap();

        assert_eq!(engine.get(id).unwrap().status, ListingStatus::Cancel);
        // Only the unsold 60.00 comes back.
        assert_eq!(accounts.account(seller).available, dec("60.00"));
    }

    #[test]
    fn cancel_blocked_by_open_child() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let id = create(&mut engine, &mut accounts, &directory, seller, "100.00");
        let err = engine
            .cancel(&mut accounts, &OneChild, seller, id, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DeskError::ListingCancelForbidden));
        assert_eq!(engine.get(id).unwrap().status, ListingStatus::Online);
    }

    #[test]
    fn cancel_by_non_owner_is_not_found() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let id = create(&mut engine, &mut accounts, &directory, seller, "100.00");
        let err = engine
            .cancel(&mut accounts, &NoChildren, UserId::new(), id, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DeskError::ListingNotFound(_)));
    }

    #[test]
    fn reserve_stock_decrements_but_keeps_status() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let id = create(&mut engine, &mut accounts, &directory, seller, "100.00");

        engine.reserve_stock(id, dec("100.00")).unwrap();
        let listing = engine.get(id).unwrap();
        assert_eq!(listing.remain_amount, dec("0.00"));
        // Exhausted stock does not flip the listing to SELL_OUT.
        assert_eq!(listing.status, ListingStatus::Online);
    }

    #[test]
    fn reserve_beyond_stock_fails() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let id = create(&mut engine, &mut accounts, &directory, seller, "100.00");
        engine.reserve_stock(id, dec("80.00")).unwrap();
        let err = engine.reserve_stock(id, dec("30.00")).unwrap_err();
        assert!(matches!(err, DeskError::InsufficientListingStock { .. }));
        assert_eq!(engine.get(id).unwrap().remain_amount, dec("20.00"));
    }

    #[test]
    fn restore_overflow_is_internal() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let id = create(&mut engine, &mut accounts, &directory, seller, "100.00");
        let err = engine.restore_stock(id, dec("1.00")).unwrap_err();
        assert!(matches!(err, DeskError::Internal(_)));
    }

    #[test]
    fn admin_status_moves_between_shelf_states() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let id = create(&mut engine, &mut accounts, &directory, seller, "100.00");

        engine
            .update_status(id, ListingStatus::Forbidden, Utc::now())
            .unwrap();
        assert_eq!(engine.get(id).unwrap().status, ListingStatus::Forbidden);
        engine
            .update_status(id, ListingStatus::StockLock, Utc::now())
            .unwrap();
        assert_eq!(engine.get(id).unwrap().status, ListingStatus::StockLock);
    }

    #[test]
    fn admin_cannot_force_terminal_states() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let id = create(&mut engine, &mut accounts, &directory, seller, "100.00");

        let err = engine
            .update_status(id, ListingStatus::SellOut, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DeskError::ListingStatusForbidden { .. }));

        engine
            .cancel(&mut accounts, &NoChildren, seller, id, Utc::now())
            .unwrap();
        let err = engine
            .update_status(id, ListingStatus::Online, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DeskError::ListingStatusForbidden { .. }));
    }

    #[test]
    fn dispute_stock_restore_reopens_locked_listing() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let id = create(&mut engine, &mut accounts, &directory, seller, "100.00");
        engine.reserve_stock(id, dec("40.00")).unwrap();
        engine
            .update_status(id, ListingStatus::StockLock, Utc::now())
            .unwrap();

        engine
            .settle_dispute_stock(
                id,
                DisputeStockOutcome::Restore {
                    amount: dec("40.00"),
                },
                Utc::now(),
            )
            .unwrap();

        let listing = engine.get(id).unwrap();
        assert_eq!(listing.remain_amount, dec("100.00"));
        assert_eq!(listing.status, ListingStatus::Online);
    }

    #[test]
    fn dispute_sell_out_releases_locked_stock() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let id = create(&mut engine, &mut accounts, &directory, seller, "100.00");
        engine.reserve_stock(id, dec("40.00")).unwrap();
        engine
            .update_status(id, ListingStatus::StockLock, Utc::now())
            .unwrap();

        let released = engine
            .settle_dispute_stock(id, DisputeStockOutcome::SellOutIfLocked, Utc::now())
            .unwrap();
        assert_eq!(released, dec("60.00"));

        let listing = engine.get(id).unwrap();
        assert_eq!(listing.remain_amount, dec("0.00"));
        assert_eq!(listing.status, ListingStatus::SellOut);
    }

    #[test]
    fn dispute_sell_out_noop_when_not_locked() {
        let (mut engine, mut accounts, directory, seller) = setup();
        let id = create(&mut engine, &mut accounts, &directory, seller, "100.00");
        engine.reserve_stock(id, dec("40.00")).unwrap();

        let released = engine
            .settle_dispute_stock(id, DisputeStockOutcome::SellOutIfLocked, Utc::now())
            .unwrap();
        assert_eq!(released, Decimal::ZERO);
        assert_eq!(engine.get(id).unwrap().status, ListingStatus::Online);
        assert_eq!(engine.get(id).unwrap().remain_amount, dec("60.00"));
    }

    #[test]
    fn page_filters_by_status() {
        let (mut engine, mut accounts, mut directory, seller) = setup();
        let other = UserId::new();
        accounts.credit(other, dec("50.00"));
        directory.bind(other, PaymentMethod::Wechat);

        create(&mut engine, &mut accounts, &directory, seller, "100.00");
        engine
            .create(
                &mut accounts,
                &directory,
                other,
                dec("50.00"),
                dec("10.00"),
                PaymentMethod::Wechat,
                Utc::now(),
            )
            .unwrap();

        assert_eq!(engine.page(Some(ListingStatus::Online), 0, 10).len(), 2);
        assert_eq!(engine.page(Some(ListingStatus::Cancel), 0, 10).len(), 0);
        assert_eq!(engine.page(None, 0, 1).len(), 1);
    }
}

//! The settlement desk — one object wiring every engine together.
//!
//! A `&mut SettlementDesk` borrow is the transaction scope: each public
//! operation validates, re-checks entity status under that exclusive
//! access, and mutates fallible-first, so callers serialized by an outer
//! lock (`Arc<Mutex<SettlementDesk>>`) never observe partial state.
//! Notifications go out only after an operation succeeded.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use peerdesk_ledger::{AccountLedger, FinancialLedger, SequenceGenerator};
use peerdesk_market::{ListingEngine, PaymentDirectory};
use peerdesk_types::{
    constants::EVENT_DESK_REFRESH, money, ConfirmRole, DeskConfig, DeskError, FinancialRecord,
    LedgerAccount, ListingId, ListingStatus, Order, OrderId, OrderListing, PaymentDetails,
    PaymentMethod, RequestId, Result, UserId, Verdict,
};
use rust_decimal::Decimal;

use crate::arbitration::{self, JudgeOutcome};
use crate::funds::{FundsEngine, RequestKind, RequestOutcome};
use crate::notify::{Broadcaster, MessageKind, MessagePush, Messenger, NullBroadcaster, NullMessenger};
use crate::orders::{OrderEngine, SweepOutcome};

/// The marketplace settlement core behind the API layer.
pub struct SettlementDesk {
    config: DeskConfig,
    accounts: AccountLedger,
    directory: PaymentDirectory,
    listings: ListingEngine,
    orders: OrderEngine,
    funds: FundsEngine,
    records: FinancialLedger,
    sequence: SequenceGenerator,
    messenger: Arc<dyn Messenger>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl SettlementDesk {
    /// Create a desk with no external collaborators wired.
    #[must_use]
    pub fn new(config: DeskConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(NullMessenger),
            Arc::new(NullBroadcaster),
        )
    }

    /// Create a desk with messaging and broadcast collaborators.
    #[must_use]
    pub fn with_collaborators(
        config: DeskConfig,
        messenger: Arc<dyn Messenger>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            config,
            accounts: AccountLedger::new(),
            directory: PaymentDirectory::new(),
            listings: ListingEngine::new(),
            orders: OrderEngine::new(),
            funds: FundsEngine::new(),
            records: FinancialLedger::new(),
            sequence: SequenceGenerator::new(),
            messenger,
            broadcaster,
        }
    }

    // =====================================================================
    // Accounts & payment channels
    // =====================================================================

    /// Credit a user's account directly (bootstrap / migration path;
    /// the production top-up flow is `submit_recharge` + approval).
    ///
    /// # Errors
    /// `InvalidAmount` for non-positive or sub-cent amounts.
    pub fn deposit(&mut self, user: UserId, amount: Decimal) -> Result<()> {
        if !money::is_valid_amount(amount) {
            return Err(DeskError::InvalidAmount(amount));
        }
        self.accounts.credit(user, amount);
        Ok(())
    }

    /// Bind a default receiving account for a payment channel.
    pub fn bind_payment_method(&mut self, user: UserId, method: PaymentMethod) {
        self.directory.bind(user, method);
    }

    /// Account snapshot.
    #[must_use]
    pub fn account(&self, user: UserId) -> LedgerAccount {
        self.accounts.account(user)
    }

    // =====================================================================
    // Listings
    // =====================================================================

    /// Post a sell listing (freezes `amount` on the seller).
    pub fn create_listing(
        &mut self,
        seller: UserId,
        amount: Decimal,
        min_sale_amount: Decimal,
        method: PaymentMethod,
    ) -> Result<ListingId> {
        self.listings.create(
            &mut self.accounts,
            &self.directory,
            seller,
            amount,
            min_sale_amount,
            method,
            Utc::now(),
        )
    }

    /// Seller-initiated listing cancel (unfreezes the remainder).
    pub fn cancel_listing(&mut self, seller: UserId, listing_id: ListingId) -> Result<()> {
        self.listings.cancel(
            &mut self.accounts,
            &self.orders,
            seller,
            listing_id,
            Utc::now(),
        )
    }

    /// Admin-forced listing shelf state change.
    pub fn set_listing_status(
        &mut self,
        listing_id: ListingId,
        status: ListingStatus,
    ) -> Result<()> {
        self.listings.update_status(listing_id, status, Utc::now())
    }

    /// Listing snapshot.
    #[must_use]
    pub fn listing(&self, listing_id: ListingId) -> Option<&OrderListing> {
        self.listings.get(listing_id)
    }

    /// One page of listings filtered by status.
    #[must_use]
    pub fn listings_page(
        &self,
        status: Option<ListingStatus>,
        offset: usize,
        limit: usize,
    ) -> Vec<&OrderListing> {
        self.listings
            .page(status, offset, self.config.clamp_page_size(limit))
    }

    // =====================================================================
    // Orders
    // =====================================================================

    /// Open an order against a listing at the given exchange rate.
    pub fn create_order(
        &mut self,
        listing_id: ListingId,
        buyer: UserId,
        amount: Decimal,
        exchange_rate: Decimal,
        details: &PaymentDetails,
    ) -> Result<OrderId> {
        self.orders.create_order(
            &mut self.listings,
            &mut self.records,
            &mut self.sequence,
            listing_id,
            buyer,
            amount,
            exchange_rate,
            details,
            Utc::now(),
        )
    }

    /// Advance the confirmation handshake for one side.
    pub fn confirm_order(&mut self, order_id: OrderId, role: ConfirmRole) -> Result<()> {
        self.orders.confirm(
            &mut self.accounts,
            &mut self.records,
            order_id,
            role,
            Utc::now(),
        )
    }

    /// Run the timeout sweep as of `now` (driven by an external
    /// scheduler).
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> SweepOutcome {
        self.orders.sweep(now, self.config.order_timeout())
    }

    /// Settle a disputed order and notify both parties afterwards.
    pub fn judge_order(&mut self, order_id: OrderId, verdict: Verdict) -> Result<JudgeOutcome> {
        let outcome = arbitration::judge(
            &mut self.orders,
            &mut self.accounts,
            &mut self.records,
            &mut self.listings,
            order_id,
            verdict,
            Utc::now(),
        )?;
        self.notify_order_verdict(&outcome);
        Ok(outcome)
    }

    /// Order snapshot.
    #[must_use]
    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    /// One page of a user's orders (either side).
    #[must_use]
    pub fn orders_page(&self, user: UserId, offset: usize, limit: usize) -> Vec<&Order> {
        self.orders
            .page_for_user(user, offset, self.config.clamp_page_size(limit))
    }

    // =====================================================================
    // Transfer / Withdraw / Recharge
    // =====================================================================

    /// Submit a transfer request (freezes `amount + fee` on the sender).
    pub fn submit_transfer(
        &mut self,
        from: UserId,
        to: UserId,
        amount: Decimal,
        fee: Decimal,
    ) -> Result<RequestId> {
        self.funds.submit_transfer(
            &mut self.accounts,
            &mut self.records,
            &mut self.sequence,
            from,
            to,
            amount,
            fee,
            Utc::now(),
        )
    }

    /// Decide a pending transfer and notify the parties afterwards.
    pub fn judge_transfer(
        &mut self,
        request_id: RequestId,
        verdict: Verdict,
    ) -> Result<RequestOutcome> {
        let outcome = self.funds.judge_transfer(
            &mut self.accounts,
            &mut self.records,
            request_id,
            verdict,
            Utc::now(),
        )?;
        self.notify_request_verdict(&outcome);
        Ok(outcome)
    }

    /// Submit a withdraw request (freezes `amount + fee`).
    pub fn submit_withdraw(
        &mut self,
        user: UserId,
        amount: Decimal,
        fee: Decimal,
    ) -> Result<RequestId> {
        self.funds.submit_withdraw(
            &mut self.accounts,
            &mut self.records,
            &mut self.sequence,
            user,
            amount,
            fee,
            Utc::now(),
        )
    }

    /// Decide a pending withdraw and notify the requester afterwards.
    pub fn judge_withdraw(
        &mut self,
        request_id: RequestId,
        verdict: Verdict,
    ) -> Result<RequestOutcome> {
        let outcome = self.funds.judge_withdraw(
            &mut self.accounts,
            &mut self.records,
            request_id,
            verdict,
            Utc::now(),
        )?;
        self.notify_request_verdict(&outcome);
        Ok(outcome)
    }

    /// Submit a recharge request (nothing frozen).
    pub fn submit_recharge(&mut self, user: UserId, amount: Decimal) -> Result<RequestId> {
        self.funds.submit_recharge(
            &mut self.records,
            &mut self.sequence,
            user,
            amount,
            Utc::now(),
        )
    }

    /// Decide a pending recharge and notify the requester afterwards.
    pub fn judge_recharge(
        &mut self,
        request_id: RequestId,
        verdict: Verdict,
    ) -> Result<RequestOutcome> {
        let outcome = self.funds.judge_recharge(
            &mut self.accounts,
            &mut self.records,
            request_id,
            verdict,
            Utc::now(),
        )?;
        self.notify_request_verdict(&outcome);
        Ok(outcome)
    }

    // =====================================================================
    // Statements
    // =====================================================================

    /// Look up a financial record.
    #[must_use]
    pub fn financial_record(
        &self,
        transaction_id: &peerdesk_types::TransactionId,
    ) -> Option<&FinancialRecord> {
        self.records.get(transaction_id)
    }

    /// One page of a user's statement.
    #[must_use]
    pub fn records_page(
        &self,
        user: UserId,
        offset: usize,
        limit: usize,
    ) -> Vec<&FinancialRecord> {
        self.records
            .page_for_user(user, offset, self.config.clamp_page_size(limit))
    }

    // =====================================================================
    // Notifications (post-commit only)
    // =====================================================================

    fn notify_order_verdict(&self, outcome: &JudgeOutcome) {
        let content = format!(
            "Order {} settled: {}",
            outcome.order_id,
            outcome.verdict.order_status()
        );
        for target in [outcome.buy_user_id, outcome.sell_user_id] {
            self.messenger.push_message(
                target,
                MessagePush {
                    reference_key: outcome.order_id.to_string(),
                    kind: MessageKind::OrderVerdict,
                    content: content.clone(),
                },
            );
        }
        self.broadcaster.emit(
            EVENT_DESK_REFRESH,
            serde_json::json!({
                "order_id": outcome.order_id.to_string(),
                "status": outcome.verdict.order_status().to_string(),
            }),
        );
    }

    fn notify_request_verdict(&self, outcome: &RequestOutcome) {
        let kind = match outcome.kind {
            RequestKind::Transfer => MessageKind::TransferVerdict,
            RequestKind::Withdraw => MessageKind::WithdrawVerdict,
            RequestKind::Recharge => MessageKind::RechargeVerdict,
        };
        let content = format!("Request {} decided: {:?}", outcome.request_id, outcome.verdict);
        for target in &outcome.parties {
            self.messenger.push_message(
                *target,
                MessagePush {
                    reference_key: outcome.request_id.to_string(),
                    kind,
                    content: content.clone(),
                },
            );
        }
        self.broadcaster.emit(
            EVENT_DESK_REFRESH,
            serde_json::json!({
                "request_id": outcome.request_id.to_string(),
            }),
        );
    }
}

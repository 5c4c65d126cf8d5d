//! Arbitration — admin resolution of disputed orders.
//!
//! `judge` settles an `Argue` order one way or the other:
//!
//! - **Reject**: the dispute is void. Both financial records finalize at
//!   `0.00`, the disputed stock goes back to the listing, and a
//!   stock-locked listing returns to sale.
//! - **Approve**: the buyer paid. The seller's frozen stake is consumed
//!   and both records finalize at `±total_price`; a stock-locked listing
//!   is closed out as `SellOut`, its remaining stock released back to
//!   the seller's available balance.
//!
//! Every fallible lookup and invariant check runs before the first
//! mutation, so a failed judge leaves no partial state. Entities that
//! go missing between the status check and settlement indicate a
//! correctness bug and surface as `Internal`, not as a business
//! conflict.

use chrono::{DateTime, Utc};
use peerdesk_ledger::{AccountLedger, FinancialLedger};
use peerdesk_market::{DisputeStockOutcome, ListingEngine};
use peerdesk_types::{
    DeskError, ListingStatus, OrderId, OrderStatus, Result, UserId, Verdict,
};
use rust_decimal::Decimal;

use crate::orders::OrderEngine;

/// What a settled dispute looked like; feeds the post-commit
/// notifications.
#[derive(Debug, Clone)]
pub struct JudgeOutcome {
    pub order_id: OrderId,
    pub verdict: Verdict,
    pub buy_user_id: UserId,
    pub sell_user_id: UserId,
    pub total_price: Decimal,
}

/// Settle a disputed order.
///
/// # Errors
/// - `OrderNotFound` if the order is unknown
/// - `WrongOrderStatus` if the order is not `Argue` (this is what makes
///   a second judge call on the same order a clean conflict)
/// - `Internal` if a record or the listing vanished mid-operation, or a
///   stock/balance invariant would break
pub fn judge(
    orders: &mut OrderEngine,
    accounts: &mut AccountLedger,
    records: &mut FinancialLedger,
    listings: &mut ListingEngine,
    order_id: OrderId,
    verdict: Verdict,
    now: DateTime<Utc>,
) -> Result<JudgeOutcome> {
    let order = orders
        .get(order_id)
        .ok_or(DeskError::OrderNotFound(order_id))?;
    if order.status != OrderStatus::Argue {
        return Err(DeskError::WrongOrderStatus {
            expected: OrderStatus::Argue,
            actual: order.status,
        });
    }

    let listing_id = order.listing_id;
    let amount = order.amount;
    let total_price = order.total_price;
    let buyer = order.buy_user_id;
    let seller = order.sell_user_id;
    let buy_txid = order.buy_transaction_id.clone();
    let sell_txid = order.sell_transaction_id.clone();

    // Re-verify everything the settlement will touch. Past this block
    // no step can fail. The buy-side record is usually already settled
    // by the buyer's confirm; the verdict supersedes it either way.
    let mid = |what: &str, err: DeskError| {
        DeskError::Internal(format!("{what} unavailable while judging {order_id}: {err}"))
    };
    if records.get(&buy_txid).is_none() {
        return Err(mid("buy-side record", DeskError::RecordNotFound(buy_txid)));
    }
    records
        .ensure_ongoing(&sell_txid)
        .map_err(|e| mid("sell-side record", e))?;
    let listing = listings
        .get(listing_id)
        .ok_or_else(|| DeskError::Internal(format!("listing {listing_id} vanished while judging {order_id}")))?;
    let listing_status = listing.status;
    let listing_remaining = listing.remain_amount;

    match verdict {
        Verdict::Reject => {
            if listing_remaining + amount > listing.amount {
                return Err(DeskError::Internal(format!(
                    "stock restore would overflow listing {listing_id}"
                )));
            }

            // No money moved; both legs settle at zero.
            let buyer_total = accounts.total(buyer);
            let seller_total = accounts.total(seller);
            records.finalize_verdict(&buy_txid, Decimal::ZERO, buyer_total, buyer_total, now)?;
            records.finalize_verdict(&sell_txid, Decimal::ZERO, seller_total, seller_total, now)?;
            listings.settle_dispute_stock(
                listing_id,
                DisputeStockOutcome::Restore { amount },
                now,
            )?;
        }
        Verdict::Approve => {
            let seller_acct = accounts.account(seller);
            if seller_acct.frozen() < total_price {
                return Err(DeskError::Internal(format!(
                    "seller stake no longer covers {total_price} while judging {order_id}"
                )));
            }
            // A stock-locked listing releases its remainder afterwards;
            // the frozen stake must cover both.
            if listing_status == ListingStatus::StockLock
                && seller_acct.frozen() < total_price + listing_remaining
            {
                return Err(DeskError::Internal(format!(
                    "seller stake no longer covers the locked stock of {listing_id}"
                )));
            }

            accounts.consume_frozen(seller, total_price)?;
            // The buy-side record carries the credit, but the buyer's
            // ledger account is left untouched.
            // TODO: credit the buyer account here once product confirms
            // dispute payouts settle on-ledger.
            let buyer_total = accounts.total(buyer);
            records.finalize_verdict(&buy_txid, total_price, buyer_total, buyer_total, now)?;
            records.finalize_verdict(
                &sell_txid,
                -total_price,
                seller_acct.total,
                seller_acct.total - total_price,
                now,
            )?;

            let released =
                listings.settle_dispute_stock(listing_id, DisputeStockOutcome::SellOutIfLocked, now)?;
            if released > Decimal::ZERO {
                accounts.unfreeze(seller, released)?;
            }
        }
    }

    let order = orders
        .get_mut(order_id)
        .ok_or_else(|| DeskError::Internal(format!("order {order_id} vanished mid-judge")))?;
    order.status = verdict.order_status();
    order.updated_at = now;
    tracing::info!(order = %order_id, verdict = ?verdict, "dispute settled");

    Ok(JudgeOutcome {
        order_id,
        verdict,
        buy_user_id: buyer,
        sell_user_id: seller,
        total_price,
    })
}

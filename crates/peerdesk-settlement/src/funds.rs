//! Funds engine — transfer, withdraw and recharge approval.
//!
//! All three follow one settlement pattern. Submission freezes the
//! charged amount (except recharge, whose funds originate off-platform)
//! and opens the financial record(s) `Ongoing`. The admin verdict then
//! either consumes the frozen stake and finalizes the records with
//! signed amounts, or unfreezes and finalizes them at `0.00`. Every
//! fallible check runs before the first balance mutation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use peerdesk_ledger::{AccountLedger, FinancialLedger, SequenceGenerator};
use peerdesk_types::{
    constants::{SEQ_NS_RECHARGE, SEQ_NS_TRANSFER, SEQ_NS_WITHDRAW},
    money, DeskError, FinancialRecord, RechargeRequest, RequestId, RequestStatus, Result,
    TransactionType, TransferRequest, UserId, Verdict, WithdrawRequest,
};
use rust_decimal::Decimal;

/// Which request family a settled verdict belonged to; feeds the
/// post-commit notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Transfer,
    Withdraw,
    Recharge,
}

/// What a settled request verdict looked like.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub request_id: RequestId,
    pub kind: RequestKind,
    pub verdict: Verdict,
    /// Everyone whose balance or statement the verdict touched.
    pub parties: Vec<UserId>,
}

/// Manages the three peer money-movement request families.
pub struct FundsEngine {
    transfers: HashMap<RequestId, TransferRequest>,
    withdraws: HashMap<RequestId, WithdrawRequest>,
    recharges: HashMap<RequestId, RechargeRequest>,
}

impl FundsEngine {
    /// Create a new empty funds engine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transfers: HashMap::new(),
            withdraws: HashMap::new(),
            recharges: HashMap::new(),
        }
    }

    // =====================================================================
    // Transfer
    // =====================================================================

    /// Submit a transfer: freeze `amount + fee` on the sender and open
    /// both record legs.
    ///
    /// # Errors
    /// - `InvalidAmount` / `SelfTradeBlocked` for bad input
    /// - `InsufficientBalance` if the freeze fails
    #[allow(clippy::too_many_arguments)]
    pub fn submit_transfer(
        &mut self,
        accounts: &mut AccountLedger,
        records: &mut FinancialLedger,
        sequence: &mut SequenceGenerator,
        from: UserId,
        to: UserId,
        amount: Decimal,
        fee: Decimal,
        now: DateTime<Utc>,
    ) -> Result<RequestId> {
        if !money::is_valid_amount(amount) {
            return Err(DeskError::InvalidAmount(amount));
        }
        if !money::is_valid_fee(fee) {
            return Err(DeskError::InvalidAmount(fee));
        }
        if from == to {
            return Err(DeskError::SelfTradeBlocked);
        }

        accounts.freeze(from, amount + fee)?;

        let request_id = RequestId::new();
        let date = now.date_naive();
        let send_transaction_id = sequence.mint(SEQ_NS_TRANSFER, date);
        let receive_transaction_id = sequence.mint(SEQ_NS_TRANSFER, date);

        let opened = records
            .open(FinancialRecord::open(
                send_transaction_id.clone(),
                from,
                amount,
                TransactionType::TransferSend,
                request_id.0,
                now,
            ))
            .and_then(|()| {
                records.open(FinancialRecord::open(
                    receive_transaction_id.clone(),
                    to,
                    amount,
                    TransactionType::TransferReceive,
                    request_id.0,
                    now,
                ))
            });
        if let Err(err) = opened {
            let _ = records.discard_ongoing(&send_transaction_id);
            let _ = accounts.unfreeze(from, amount + fee);
            return Err(DeskError::Internal(format!(
                "transfer record persistence failed: {err}"
            )));
        }

        self.transfers.insert(
            request_id,
            TransferRequest {
                id: request_id,
                from_user_id: from,
                to_user_id: to,
                amount,
                fee,
                status: RequestStatus::Wait,
                send_transaction_id,
                receive_transaction_id,
                balance_before: None,
                balance_after: None,
                created_at: now,
                decided_at: None,
            },
        );
        tracing::info!(request = %request_id, %from, %to, %amount, %fee, "transfer submitted");
        Ok(request_id)
    }

    /// Decide a pending transfer.
    ///
    /// # Errors
    /// - `RequestNotFound` / `WrongRequestStatus`
    /// - `Internal` if a record vanished mid-operation
    pub fn judge_transfer(
        &mut self,
        accounts: &mut AccountLedger,
        records: &mut FinancialLedger,
        request_id: RequestId,
        verdict: Verdict,
        now: DateTime<Utc>,
    ) -> Result<RequestOutcome> {
        let req = self
            .transfers
            .get(&request_id)
            .ok_or(DeskError::RequestNotFound(request_id))?;
        if req.status != RequestStatus::Wait {
            return Err(DeskError::WrongRequestStatus {
                expected: RequestStatus::Wait,
                actual: req.status,
            });
        }

        let from = req.from_user_id;
        let to = req.to_user_id;
        let amount = req.amount;
        let charged = req.charged();
        let send_txid = req.send_transaction_id.clone();
        let receive_txid = req.receive_transaction_id.clone();

        ensure_ongoing_or_internal(records, &send_txid, request_id)?;
        ensure_ongoing_or_internal(records, &receive_txid, request_id)?;

        let sender_before = accounts.total(from);
        let (sender_after, status) = match verdict {
            Verdict::Approve => {
                accounts.consume_frozen(from, charged)?;
                accounts.credit(to, amount);
                let receiver_after = accounts.total(to);
                records.finalize(&send_txid, -charged, sender_before, sender_before - charged, now)?;
                records.finalize(
                    &receive_txid,
                    amount,
                    receiver_after - amount,
                    receiver_after,
                    now,
                )?;
                (sender_before - charged, RequestStatus::Approve)
            }
            Verdict::Reject => {
                accounts.unfreeze(from, charged)?;
                let receiver_total = accounts.total(to);
                records.finalize(&send_txid, Decimal::ZERO, sender_before, sender_before, now)?;
                records.finalize(
                    &receive_txid,
                    Decimal::ZERO,
                    receiver_total,
                    receiver_total,
                    now,
                )?;
                (sender_before, RequestStatus::Reject)
            }
        };

        let req = self
            .transfers
            .get_mut(&request_id)
            .ok_or(DeskError::RequestNotFound(request_id))?;
        req.status = status;
        req.balance_before = Some(sender_before);
        req.balance_after = Some(sender_after);
        req.decided_at = Some(now);
        tracing::info!(request = %request_id, verdict = ?verdict, "transfer decided");

        Ok(RequestOutcome {
            request_id,
            kind: RequestKind::Transfer,
            verdict,
            parties: vec![from, to],
        })
    }

    // =====================================================================
    // Withdraw
    // =====================================================================

    /// Submit a withdrawal: freeze `amount + fee` and open the record.
    ///
    /// # Errors
    /// - `InvalidAmount` for bad input
    /// - `InsufficientBalance` if the freeze fails
    #[allow(clippy::too_many_arguments)]
    pub fn submit_withdraw(
        &mut self,
        accounts: &mut AccountLedger,
        records: &mut FinancialLedger,
        sequence: &mut SequenceGenerator,
        user: UserId,
        amount: Decimal,
        fee: Decimal,
        now: DateTime<Utc>,
    ) -> Result<RequestId> {
        if !money::is_valid_amount(amount) {
            return Err(DeskError::InvalidAmount(amount));
        }
        if !money::is_valid_fee(fee) {
            return Err(DeskError::InvalidAmount(fee));
        }

        accounts.freeze(user, amount + fee)?;

        let request_id = RequestId::new();
        let transaction_id = sequence.mint(SEQ_NS_WITHDRAW, now.date_naive());
        if let Err(err) = records.open(FinancialRecord::open(
            transaction_id.clone(),
            user,
            amount,
            TransactionType::Withdraw,
            request_id.0,
            now,
        )) {
            let _ = accounts.unfreeze(user, amount + fee);
            return Err(DeskError::Internal(format!(
                "withdraw record persistence failed: {err}"
            )));
        }

        self.withdraws.insert(
            request_id,
            WithdrawRequest {
                id: request_id,
                user_id: user,
                amount,
                fee,
                status: RequestStatus::Wait,
                transaction_id,
                balance_before: None,
                balance_after: None,
                created_at: now,
                decided_at: None,
            },
        );
        tracing::info!(request = %request_id, %user, %amount, %fee, "withdraw submitted");
        Ok(request_id)
    }

    /// Decide a pending withdrawal.
    ///
    /// # Errors
    /// - `RequestNotFound` / `WrongRequestStatus`
    /// - `Internal` if the record vanished mid-operation
    pub fn judge_withdraw(
        &mut self,
        accounts: &mut AccountLedger,
        records: &mut FinancialLedger,
        request_id: RequestId,
        verdict: Verdict,
        now: DateTime<Utc>,
    ) -> Result<RequestOutcome> {
        let req = self
            .withdraws
            .get(&request_id)
            .ok_or(DeskError::RequestNotFound(request_id))?;
        if req.status != RequestStatus::Wait {
            return Err(DeskError::WrongRequestStatus {
                expected: RequestStatus::Wait,
                actual: req.status,
            });
        }

        let user = req.user_id;
        let charged = req.charged();
        let txid = req.transaction_id.clone();
        ensure_ongoing_or_internal(records, &txid, request_id)?;

        let before = accounts.total(user);
        let (after, status) = match verdict {
            Verdict::Approve => {
                accounts.consume_frozen(user, charged)?;
                records.finalize(&txid, -charged, before, before - charged, now)?;
                (before - charged, RequestStatus::Approve)
            }
            Verdict::Reject => {
                accounts.unfreeze(user, charged)?;
                records.finalize(&txid, Decimal::ZERO, before, before, now)?;
                (before, RequestStatus::Reject)
            }
        };

        let req = self
            .withdraws
            .get_mut(&request_id)
            .ok_or(DeskError::RequestNotFound(request_id))?;
        req.status = status;
        req.balance_before = Some(before);
        req.balance_after = Some(after);
        req.decided_at = Some(now);
        tracing::info!(request = %request_id, verdict = ?verdict, "withdraw decided");

        Ok(RequestOutcome {
            request_id,
            kind: RequestKind::Withdraw,
            verdict,
            parties: vec![user],
        })
    }

    // =====================================================================
    // Recharge
    // =====================================================================

    /// Submit a recharge. Nothing is frozen; the funds are off-platform
    /// until an admin approves.
    ///
    /// # Errors
    /// `InvalidAmount` for bad input.
    pub fn submit_recharge(
        &mut self,
        records: &mut FinancialLedger,
        sequence: &mut SequenceGenerator,
        user: UserId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<RequestId> {
        if !money::is_valid_amount(amount) {
            return Err(DeskError::InvalidAmount(amount));
        }

        let request_id = RequestId::new();
        let transaction_id = sequence.mint(SEQ_NS_RECHARGE, now.date_naive());
        records.open(FinancialRecord::open(
            transaction_id.clone(),
            user,
            amount,
            TransactionType::Recharge,
            request_id.0,
            now,
        ))?;

        self.recharges.insert(
            request_id,
            RechargeRequest {
                id: request_id,
                user_id: user,
                amount,
                status: RequestStatus::Wait,
                transaction_id,
                balance_before: None,
                balance_after: None,
                created_at: now,
                decided_at: None,
            },
        );
        tracing::info!(request = %request_id, %user, %amount, "recharge submitted");
        Ok(request_id)
    }

    /// Decide a pending recharge.
    ///
    /// # Errors
    /// - `RequestNotFound` / `WrongRequestStatus`
    /// - `Internal` if the record vanished mid-operation
    pub fn judge_recharge(
        &mut self,
        accounts: &mut AccountLedger,
        records: &mut FinancialLedger,
        request_id: RequestId,
        verdict: Verdict,
        now: DateTime<Utc>,
    ) -> Result<RequestOutcome> {
        let req = self
            .recharges
            .get(&request_id)
            .ok_or(DeskError::RequestNotFound(request_id))?;
        if req.status != RequestStatus::Wait {
            return Err(DeskError::WrongRequestStatus {
                expected: RequestStatus::Wait,
                actual: req.status,
            });
        }

        let user = req.user_id;
        let amount = req.amount;
        let txid = req.transaction_id.clone();
        ensure_ongoing_or_internal(records, &txid, request_id)?;

        let before = accounts.total(user);
        let (after, status) = match verdict {
            Verdict::Approve => {
                accounts.credit(user, amount);
                records.finalize(&txid, amount, before, before + amount, now)?;
                (before + amount, RequestStatus::Approve)
            }
            Verdict::Reject => {
                records.finalize(&txid, Decimal::ZERO, before, before, now)?;
                (before, RequestStatus::Reject)
            }
        };

        let req = self
            .recharges
            .get_mut(&request_id)
            .ok_or(DeskError::RequestNotFound(request_id))?;
        req.status = status;
        req.balance_before = Some(before);
        req.balance_after = Some(after);
        req.decided_at = Some(now);
        tracing::info!(request = %request_id, verdict = ?verdict, "recharge decided");

        Ok(RequestOutcome {
            request_id,
            kind: RequestKind::Recharge,
            verdict,
            parties: vec![user],
        })
    }

    // =====================================================================
    // Queries
    // =====================================================================

    /// Look up a transfer request.
    #[must_use]
    pub fn transfer(&self, request_id: RequestId) -> Option<&TransferRequest> {
        self.transfers.get(&request_id)
    }

    /// Look up a withdraw request.
    #[must_use]
    pub fn withdraw(&self, request_id: RequestId) -> Option<&WithdrawRequest> {
        self.withdraws.get(&request_id)
    }

    /// Look up a recharge request.
    #[must_use]
    pub fn recharge(&self, request_id: RequestId) -> Option<&RechargeRequest> {
        self.recharges.get(&request_id)
    }
}

impl Default for FundsEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// A request's record going missing between the status check and
/// settlement is a correctness bug, not a business conflict.
fn ensure_ongoing_or_internal(
    records: &FinancialLedger,
    txid: &peerdesk_types::TransactionId,
    request_id: RequestId,
) -> Result<()> {
    records.ensure_ongoing(txid).map_err(|e| {
        DeskError::Internal(format!(
            "record unavailable while deciding {request_id}: {e}"
        ))
    })
}

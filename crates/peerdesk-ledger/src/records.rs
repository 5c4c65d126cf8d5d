//! Financial record ledger — append-only once settled.
//!
//! Records are opened `Ongoing` when a business event begins and
//! finalized exactly once by the component that owns the event (order
//! confirmation, arbitration, request approval). A settled row can never
//! be touched again; attempting to finalize it twice is an error, which
//! is what makes double-settlement structurally impossible.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use peerdesk_types::{
    DeskError, FinancialRecord, RecordStatus, Result, TransactionId, UserId,
};
use rust_decimal::Decimal;
use uuid::Uuid;

/// The transaction log: one row per money movement.
///
/// Keyed by `TransactionId`, which sorts chronologically (date bucket
/// first, then per-day sequence), so range scans come out in statement
/// order for free.
pub struct FinancialLedger {
    records: BTreeMap<TransactionId, FinancialRecord>,
}

impl FinancialLedger {
    /// Create a new empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    /// Insert a freshly opened `Ongoing` record.
    ///
    /// # Errors
    /// A duplicate transaction id means the sequence generator broke
    /// monotonicity — surfaced as `Internal`, not a business conflict.
    pub fn open(&mut self, record: FinancialRecord) -> Result<()> {
        if self.records.contains_key(&record.transaction_id) {
            return Err(DeskError::Internal(format!(
                "duplicate transaction id {}",
                record.transaction_id
            )));
        }
        self.records.insert(record.transaction_id.clone(), record);
        Ok(())
    }

    /// Finalize a record exactly once: set the signed `actual_amount`,
    /// the balance snapshot, and flip it to `Completed`.
    ///
    /// # Errors
    /// - `RecordNotFound` if the id is unknown
    /// - `RecordAlreadyFinalized` if the record is already settled
    pub fn finalize(
        &mut self,
        transaction_id: &TransactionId,
        actual_amount: Decimal,
        balance_before: Decimal,
        balance_after: Decimal,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let record = self
            .records
            .get_mut(transaction_id)
            .ok_or_else(|| DeskError::RecordNotFound(transaction_id.clone()))?;

        if record.status == RecordStatus::Completed {
            return Err(DeskError::RecordAlreadyFinalized(transaction_id.clone()));
        }

        record.actual_amount = actual_amount;
        record.balance_before = balance_before;
        record.balance_after = balance_after;
        record.status = RecordStatus::Completed;
        record.settled_at = Some(at);
        tracing::debug!(txid = %transaction_id, %actual_amount, "financial record settled");
        Ok(())
    }

    /// Verdict-path settlement: like [`finalize`](Self::finalize), but an
    /// arbitration verdict may supersede a record the confirmation flow
    /// already settled. The row still ends `Completed`; only the final
    /// amounts differ. Nothing else in the system may rewrite a settled
    /// row.
    ///
    /// # Errors
    /// `RecordNotFound` if the id is unknown.
    pub fn finalize_verdict(
        &mut self,
        transaction_id: &TransactionId,
        actual_amount: Decimal,
        balance_before: Decimal,
        balance_after: Decimal,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let record = self
            .records
            .get_mut(transaction_id)
            .ok_or_else(|| DeskError::RecordNotFound(transaction_id.clone()))?;

        record.actual_amount = actual_amount;
        record.balance_before = balance_before;
        record.balance_after = balance_after;
        record.status = RecordStatus::Completed;
        record.settled_at = Some(at);
        tracing::debug!(txid = %transaction_id, %actual_amount, "financial record settled by verdict");
        Ok(())
    }

    /// Verify a record exists and is still `Ongoing`. Settlement code
    /// runs this before touching any balance, so a later finalize cannot
    /// fail halfway through a multi-step operation.
    ///
    /// # Errors
    /// - `RecordNotFound` if the id is unknown
    /// - `RecordAlreadyFinalized` if the record is already settled
    pub fn ensure_ongoing(&self, transaction_id: &TransactionId) -> Result<()> {
        let record = self
            .records
            .get(transaction_id)
            .ok_or_else(|| DeskError::RecordNotFound(transaction_id.clone()))?;
        if record.status == RecordStatus::Completed {
            return Err(DeskError::RecordAlreadyFinalized(transaction_id.clone()));
        }
        Ok(())
    }

    /// Remove an `Ongoing` record during a creation rollback. Settled
    /// rows are immutable and can never be discarded.
    ///
    /// # Errors
    /// - `RecordNotFound` if the id is unknown
    /// - `RecordAlreadyFinalized` if the record is already settled
    pub fn discard_ongoing(&mut self, transaction_id: &TransactionId) -> Result<()> {
        self.ensure_ongoing(transaction_id)?;
        self.records.remove(transaction_id);
        Ok(())
    }

    /// Look up a record by transaction id.
    #[must_use]
    pub fn get(&self, transaction_id: &TransactionId) -> Option<&FinancialRecord> {
        self.records.get(transaction_id)
    }

    /// All records referencing a business row (order, request).
    #[must_use]
    pub fn by_reference(&self, reference_id: Uuid) -> Vec<&FinancialRecord> {
        self.records
            .values()
            .filter(|r| r.reference_id == reference_id)
            .collect()
    }

    /// One page of a user's statement, oldest first.
    #[must_use]
    pub fn page_for_user(
        &self,
        user_id: UserId,
        offset: usize,
        limit: usize,
    ) -> Vec<&FinancialRecord> {
        self.records
            .values()
            .filter(|r| r.user_id == user_id)
            .skip(offset)
            .take(limit)
            .collect()
    }

    /// Number of records tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the ledger holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for FinancialLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use peerdesk_types::TransactionType;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn txid(seq: u64) -> TransactionId {
        TransactionId::mint(NaiveDate::from_ymd_opt(2026, 8, 6).unwrap(), seq)
    }

    fn open_record(ledger: &mut FinancialLedger, seq: u64, user: UserId) -> TransactionId {
        let id = txid(seq);
        ledger
            .open(FinancialRecord::open(
                id.clone(),
                user,
                dec("40.00"),
                TransactionType::OrderBuy,
                Uuid::now_v7(),
                Utc::now(),
            ))
            .unwrap();
        id
    }

    #[test]
    fn open_then_finalize() {
        let mut ledger = FinancialLedger::new();
        let user = UserId::new();
        let id = open_record(&mut ledger, 1, user);

        ledger
            .finalize(&id, dec("40.00"), dec("0.00"), dec("40.00"), Utc::now())
            .unwrap();

        let rec = ledger.get(&id).unwrap();
        assert_eq!(rec.status, RecordStatus::Completed);
        assert_eq!(rec.actual_amount, dec("40.00"));
        assert_eq!(rec.balance_after, dec("40.00"));
        assert!(rec.settled_at.is_some());
    }

    #[test]
    fn double_finalize_blocked() {
        let mut ledger = FinancialLedger::new();
        let id = open_record(&mut ledger, 1, UserId::new());

        ledger
            .finalize(&id, dec("40.00"), dec("0.00"), dec("40.00"), Utc::now())
            .unwrap();
        let err = ledger
            .finalize(&id, dec("0.00"), dec("0.00"), dec("0.00"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DeskError::RecordAlreadyFinalized(_)));

        // First settlement untouched.
        assert_eq!(ledger.get(&id).unwrap().actual_amount, dec("40.00"));
    }

    #[test]
    fn finalize_unknown_record_fails() {
        let mut ledger = FinancialLedger::new();
        let err = ledger
            .finalize(&txid(9), dec("1.00"), dec("0.00"), dec("1.00"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DeskError::RecordNotFound(_)));
    }

    #[test]
    fn duplicate_open_is_internal() {
        let mut ledger = FinancialLedger::new();
        let user = UserId::new();
        open_record(&mut ledger, 1, user);
        let err = ledger
            .open(FinancialRecord::open(
                txid(1),
                user,
                dec("1.00"),
                TransactionType::Recharge,
                Uuid::now_v7(),
                Utc::now(),
            ))
            .unwrap_err();
        assert!(matches!(err, DeskError::Internal(_)));
    }

    #[test]
    fn verdict_supersedes_confirmation_settlement() {
        let mut ledger = FinancialLedger::new();
        let id = open_record(&mut ledger, 1, UserId::new());

        // The handshake settled the leg at +40.00 …
        ledger
            .finalize(&id, dec("40.00"), dec("0.00"), dec("40.00"), Utc::now())
            .unwrap();
        // … and the verdict voids it.
        ledger
            .finalize_verdict(&id, dec("0.00"), dec("10.00"), dec("10.00"), Utc::now())
            .unwrap();

        let rec = ledger.get(&id).unwrap();
        assert_eq!(rec.status, RecordStatus::Completed);
        assert_eq!(rec.actual_amount, dec("0.00"));
        assert_eq!(rec.balance_before, dec("10.00"));
    }

    #[test]
    fn ensure_ongoing_states() {
        let mut ledger = FinancialLedger::new();
        let id = open_record(&mut ledger, 1, UserId::new());
        ledger.ensure_ongoing(&id).unwrap();

        ledger
            .finalize(&id, dec("1.00"), dec("0.00"), dec("1.00"), Utc::now())
            .unwrap();
        assert!(matches!(
            ledger.ensure_ongoing(&id).unwrap_err(),
            DeskError::RecordAlreadyFinalized(_)
        ));
        assert!(matches!(
            ledger.ensure_ongoing(&txid(99)).unwrap_err(),
            DeskError::RecordNotFound(_)
        ));
    }

    #[test]
    fn discard_only_removes_ongoing_rows() {
        let mut ledger = FinancialLedger::new();
        let id = open_record(&mut ledger, 1, UserId::new());
        ledger.discard_ongoing(&id).unwrap();
        assert!(ledger.get(&id).is_none());

        let id = open_record(&mut ledger, 2, UserId::new());
        ledger
            .finalize(&id, dec("1.00"), dec("0.00"), dec("1.00"), Utc::now())
            .unwrap();
        let err = ledger.discard_ongoing(&id).unwrap_err();
        assert!(matches!(err, DeskError::RecordAlreadyFinalized(_)));
        assert!(ledger.get(&id).is_some());
    }

    #[test]
    fn by_reference_finds_both_legs() {
        let mut ledger = FinancialLedger::new();
        let reference = Uuid::now_v7();
        for seq in 1..=2 {
            ledger
                .open(FinancialRecord::open(
                    txid(seq),
                    UserId::new(),
                    dec("40.00"),
                    TransactionType::OrderBuy,
                    reference,
                    Utc::now(),
                ))
                .unwrap();
        }
        assert_eq!(ledger.by_reference(reference).len(), 2);
        assert_eq!(ledger.by_reference(Uuid::now_v7()).len(), 0);
    }

    #[test]
    fn user_pages_come_out_in_statement_order() {
        let mut ledger = FinancialLedger::new();
        let user = UserId::new();
        for seq in 1..=5 {
            open_record(&mut ledger, seq, user);
        }
        open_record(&mut ledger, 6, UserId::new());

        let page = ledger.page_for_user(user, 1, 2);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].transaction_id, txid(2));
        assert_eq!(page[1].transaction_id, txid(3));
    }
}

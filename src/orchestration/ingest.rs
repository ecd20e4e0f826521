use crate::db::{Repository, UpsertOutcome};
use crate::domain::{
    CustomerId, CustomerInput, DerivedLoanState, LoanId, LoanInput, OfficerId, OfficerInput,
    RepaymentId, RepaymentInput, ValidationError,
};
use crate::engine::ScheduleGenerator;
use crate::orchestration::recompute::{LoanRecomputer, RecomputeError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("loan not found: {0}")]
    LoanNotFound(LoanId),
    #[error("customer not found: {0}")]
    CustomerNotFound(CustomerId),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl From<RecomputeError> for IngestError {
    fn from(err: RecomputeError) -> Self {
        match err {
            RecomputeError::LoanNotFound(id) => IngestError::LoanNotFound(id),
            RecomputeError::Db(e) => IngestError::Db(e),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoanIngested {
    pub loan_id: LoanId,
    pub schedule_generated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepaymentIngested {
    pub repayment_id: RepaymentId,
    pub loan_id: LoanId,
    #[serde(skip)]
    pub outcome: UpsertOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    PartialSuccess,
    Error,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchCounts {
    pub loans_inserted: usize,
    pub loans_failed: usize,
    pub repayments_inserted: usize,
    pub repayments_unchanged: usize,
    pub repayments_failed: usize,
}

impl BatchCounts {
    pub fn inserted(&self) -> usize {
        self.loans_inserted + self.repayments_inserted + self.repayments_unchanged
    }

    pub fn failed(&self) -> usize {
        self.loans_failed + self.repayments_failed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchRecordError {
    pub record_type: &'static str,
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSyncResult {
    pub status: BatchStatus,
    pub sync_id: String,
    pub results: BatchCounts,
    pub errors: Vec<BatchRecordError>,
}

/// Write path for customers, officers, loans and repayments.
///
/// Every change that affects a loan's facts is followed by a synchronous
/// recompute of that loan under its lock.
#[derive(Debug, Clone)]
pub struct EventIngestor {
    recomputer: LoanRecomputer,
}

impl EventIngestor {
    pub fn new(recomputer: LoanRecomputer) -> Self {
        Self { recomputer }
    }

    pub fn recomputer(&self) -> &LoanRecomputer {
        &self.recomputer
    }

    fn repo(&self) -> &Arc<Repository> {
        self.recomputer.repo()
    }

    pub async fn upsert_officer(&self, input: OfficerInput) -> Result<OfficerId, IngestError> {
        let officer = input.into_officer()?;
        self.repo().upsert_officer(&officer).await?;
        Ok(officer.officer_id)
    }

    pub async fn upsert_customer(&self, input: CustomerInput) -> Result<CustomerId, IngestError> {
        let customer = input.into_customer()?;
        self.repo().upsert_customer(&customer).await?;
        Ok(customer.customer_id)
    }

    /// Upsert a loan, regenerating its schedule only when the terms changed
    /// or no schedule is stored.
    ///
    /// A `customer_id` that names no stored customer is rejected.
    pub async fn create_loan(&self, input: LoanInput) -> Result<LoanIngested, IngestError> {
        let status_given = input
            .status
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty());
        let mut loan = input.into_loan()?;
        if let Some(customer_id) = &loan.customer_id {
            if !self.repo().customer_exists(customer_id).await? {
                return Err(IngestError::CustomerNotFound(customer_id.clone()));
            }
        }
        let _guard = self.recomputer.lock(&loan.loan_id).await;

        let existing = self.repo().get_loan(&loan.loan_id).await?;
        let stored_schedule_empty = match &existing {
            Some(_) => self.repo().get_schedule(&loan.loan_id).await?.is_empty(),
            None => true,
        };
        let regenerate = match &existing {
            Some(prev) => prev.schedule_terms_differ(&loan) || stored_schedule_empty,
            None => true,
        };
        if let Some(prev) = &existing {
            if !status_given {
                loan.status = prev.status;
            }
        }

        if regenerate {
            let schedule = ScheduleGenerator::generate(&loan)?;
            loan.first_payment_due_date = schedule.iter().map(|e| e.due_date).min();
            self.repo().save_loan(&loan, Some(&schedule)).await?;
            info!(
                loan_id = %loan.loan_id,
                installments = schedule.len(),
                "Loan schedule generated"
            );
        } else {
            loan.first_payment_due_date = existing.and_then(|prev| prev.first_payment_due_date);
            self.repo().save_loan(&loan, None).await?;
        }

        self.recomputer.recompute_locked(&loan.loan_id).await?;
        Ok(LoanIngested {
            loan_id: loan.loan_id,
            schedule_generated: regenerate,
        })
    }

    /// Upsert a repayment by id and recompute the affected loan(s).
    pub async fn create_repayment(
        &self,
        input: RepaymentInput,
    ) -> Result<RepaymentIngested, IngestError> {
        let event = input.into_event()?;
        if !self.repo().loan_exists(&event.loan_id).await? {
            return Err(IngestError::LoanNotFound(event.loan_id));
        }

        let outcome = {
            let _guard = self.recomputer.lock(&event.loan_id).await;
            let outcome = self.repo().upsert_repayment(&event).await?;
            if outcome.changed() {
                self.recomputer.recompute_locked(&event.loan_id).await?;
            }
            outcome
        };

        if let UpsertOutcome::Updated {
            moved_from: Some(previous_loan),
        } = &outcome
        {
            info!(
                repayment_id = %event.repayment_id,
                from = %previous_loan,
                to = %event.loan_id,
                "Repayment moved between loans"
            );
            self.recomputer.recompute(previous_loan).await?;
        }

        Ok(RepaymentIngested {
            repayment_id: event.repayment_id,
            loan_id: event.loan_id,
            outcome,
        })
    }

    /// Loans first, then repayments; per-record failures do not stop the batch.
    pub async fn batch_sync(
        &self,
        loans: Vec<LoanInput>,
        repayments: Vec<RepaymentInput>,
    ) -> BatchSyncResult {
        let sync_id = uuid::Uuid::new_v4().to_string();
        let mut results = BatchCounts::default();
        let mut errors = Vec::new();

        for input in loans {
            let id = input.loan_id.clone();
            match self.create_loan(input).await {
                Ok(_) => results.loans_inserted += 1,
                Err(e) => {
                    results.loans_failed += 1;
                    errors.push(BatchRecordError {
                        record_type: "loan",
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }

        for input in repayments {
            let id = input.repayment_id.clone();
            match self.create_repayment(input).await {
                Ok(r) if r.outcome.changed() => results.repayments_inserted += 1,
                Ok(_) => results.repayments_unchanged += 1,
                Err(e) => {
                    results.repayments_failed += 1;
                    errors.push(BatchRecordError {
                        record_type: "repayment",
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }

        let status = match (results.inserted(), results.failed()) {
            (_, 0) => BatchStatus::Success,
            (0, _) => BatchStatus::Error,
            _ => BatchStatus::PartialSuccess,
        };
        if status != BatchStatus::Success {
            warn!(
                sync_id = %sync_id,
                failed = results.failed(),
                "Batch sync finished with errors"
            );
        } else {
            info!(sync_id = %sync_id, records = results.inserted(), "Batch sync finished");
        }

        BatchSyncResult {
            status,
            sync_id,
            results,
            errors,
        }
    }

    pub async fn recompute_loan(&self, loan_id: &LoanId) -> Result<DerivedLoanState, IngestError> {
        Ok(self.recomputer.recompute(loan_id).await?)
    }

    /// Persisted derived state, refreshed when stale.
    pub async fn get_derived_state(
        &self,
        loan_id: &LoanId,
    ) -> Result<DerivedLoanState, IngestError> {
        if !self.repo().loan_exists(loan_id).await? {
            return Err(IngestError::LoanNotFound(loan_id.clone()));
        }
        Ok(self.recomputer.current_state(loan_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FixedClock};
    use crate::db::repo::test_support::setup_test_db;
    use crate::domain::{Decimal, FimrState, LoanStatus, PaymentStatus};
    use crate::engine::ScoreWeights;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn setup(today: &str) -> (EventIngestor, Arc<FixedClock>, TempDir) {
        let (repo, dir) = setup_test_db().await;
        let clock = Arc::new(FixedClock::new(date(today)));
        let recomputer = LoanRecomputer::new(
            Arc::new(repo),
            clock.clone() as Arc<dyn Clock>,
            ScoreWeights::default(),
        );
        let ingestor = EventIngestor::new(recomputer);
        for id in ["C-1", "C-2"] {
            ingestor.upsert_customer(customer_input(id)).await.unwrap();
        }
        (ingestor, clock, dir)
    }

    fn customer_input(id: &str) -> CustomerInput {
        CustomerInput {
            customer_id: id.to_string(),
            customer_name: format!("Customer {}", id),
            customer_phone: None,
            customer_email: None,
            date_of_birth: None,
            state: None,
            lga: None,
            kyc_status: None,
        }
    }

    fn loan_input(id: &str) -> LoanInput {
        LoanInput {
            loan_id: id.to_string(),
            customer_id: Some("C-1".to_string()),
            officer_id: None,
            principal: Decimal::from_i64(1_000_000),
            interest_rate: Some(Decimal::from_str_canonical("0.3").unwrap()),
            fee_amount: Some(Decimal::from_i64(50_000)),
            disbursement_date: "2024-01-01".to_string(),
            loan_term_days: 90,
            maturity_date: None,
            status: None,
        }
    }

    fn repayment_input(id: &str, loan: &str, day: &str, principal: i64) -> RepaymentInput {
        RepaymentInput {
            repayment_id: id.to_string(),
            loan_id: loan.to_string(),
            payment_date: day.to_string(),
            payment_amount: Decimal::from_i64(principal),
            principal_paid: Decimal::from_i64(principal),
            interest_paid: Decimal::zero(),
            fees_paid: Decimal::zero(),
            penalty_paid: Decimal::zero(),
            payment_method: None,
            is_reversed: false,
            is_backdated: false,
        }
    }

    #[tokio::test]
    async fn test_create_loan_generates_schedule_and_state() {
        let (ingestor, _clock, _dir) = setup("2024-01-01").await;
        let result = ingestor.create_loan(loan_input("L-1")).await.unwrap();
        assert!(result.schedule_generated);

        let repo = ingestor.repo();
        let loan = repo.get_loan(&result.loan_id).await.unwrap().unwrap();
        assert_eq!(loan.first_payment_due_date, Some(date("2024-01-02")));
        assert_eq!(repo.get_schedule(&result.loan_id).await.unwrap().len(), 90);

        let state = repo.get_derived_state(&result.loan_id).await.unwrap().unwrap();
        assert_eq!(state.fimr_state, FimrState::Undetermined);
        assert!(!state.degraded);
    }

    #[tokio::test]
    async fn test_resubmitting_same_terms_keeps_schedule() {
        let (ingestor, _clock, _dir) = setup("2024-01-01").await;
        ingestor.create_loan(loan_input("L-1")).await.unwrap();

        let mut same = loan_input("L-1");
        same.customer_id = Some("C-2".to_string());
        let again = ingestor.create_loan(same).await.unwrap();
        assert!(!again.schedule_generated);

        let mut changed = loan_input("L-1");
        changed.loan_term_days = 30;
        let regenerated = ingestor.create_loan(changed).await.unwrap();
        assert!(regenerated.schedule_generated);
        let schedule = ingestor.repo().get_schedule(&LoanId::new("L-1")).await.unwrap();
        assert_eq!(schedule.len(), 30);
    }

    #[tokio::test]
    async fn test_repayment_for_unknown_loan_is_not_found() {
        let (ingestor, _clock, _dir) = setup("2024-01-01").await;
        let err = ingestor
            .create_repayment(repayment_input("1", "missing", "2024-01-02", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::LoanNotFound(_)));
    }

    #[tokio::test]
    async fn test_allocation_mismatch_is_validation_error() {
        let (ingestor, _clock, _dir) = setup("2024-01-01").await;
        ingestor.create_loan(loan_input("L-1")).await.unwrap();
        let mut input = repayment_input("1", "L-1", "2024-01-02", 10);
        input.payment_amount = Decimal::from_i64(11);
        let err = ingestor.create_repayment(input).await.unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
        assert_eq!(ingestor.repo().count_repayments().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repayment_recomputes_and_replay_is_noop() {
        let (ingestor, _clock, _dir) = setup("2024-01-02").await;
        ingestor.create_loan(loan_input("L-1")).await.unwrap();

        let first = ingestor
            .create_repayment(repayment_input("1", "L-1", "2024-01-02", 80_000))
            .await
            .unwrap();
        assert_eq!(first.outcome, UpsertOutcome::Inserted);

        let state = ingestor
            .repo()
            .get_derived_state(&LoanId::new("L-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.fimr_state, FimrState::Met);
        assert_eq!(
            state.principal_outstanding,
            Some(Decimal::from_i64(920_000))
        );

        let replay = ingestor
            .create_repayment(repayment_input("1", "L-1", "2024-01-02", 80_000))
            .await
            .unwrap();
        assert_eq!(replay.outcome, UpsertOutcome::Unchanged);
        assert_eq!(ingestor.repo().count_repayments().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_moved_repayment_recomputes_both_loans() {
        let (ingestor, _clock, _dir) = setup("2024-01-02").await;
        ingestor.create_loan(loan_input("L-1")).await.unwrap();
        ingestor.create_loan(loan_input("L-2")).await.unwrap();
        ingestor
            .create_repayment(repayment_input("1", "L-1", "2024-01-02", 5_000))
            .await
            .unwrap();

        let moved = ingestor
            .create_repayment(repayment_input("1", "L-2", "2024-01-02", 5_000))
            .await
            .unwrap();
        assert_eq!(
            moved.outcome,
            UpsertOutcome::Updated {
                moved_from: Some(LoanId::new("L-1"))
            }
        );

        let repo = ingestor.repo();
        let l1 = repo.get_derived_state(&LoanId::new("L-1")).await.unwrap().unwrap();
        let l2 = repo.get_derived_state(&LoanId::new("L-2")).await.unwrap().unwrap();
        assert_eq!(l1.total_principal_paid, Decimal::zero());
        assert_eq!(l2.total_principal_paid, Decimal::from_i64(5_000));
    }

    #[tokio::test]
    async fn test_get_derived_state_refreshes_when_stale() {
        let (ingestor, clock, _dir) = setup("2024-01-01").await;
        ingestor.create_loan(loan_input("L-1")).await.unwrap();
        let loan_id = LoanId::new("L-1");

        let day_one = ingestor.get_derived_state(&loan_id).await.unwrap();
        assert!(!day_one.fimr_tagged);

        clock.set(date("2024-01-03"));
        let later = ingestor.get_derived_state(&loan_id).await.unwrap();
        assert_eq!(later.as_of, date("2024-01-03"));
        assert!(later.fimr_tagged);
        assert_eq!(later.current_dpd, Some(1));

        let schedule = ingestor.repo().get_schedule(&loan_id).await.unwrap();
        assert_eq!(schedule[0].payment_status, PaymentStatus::Overdue);
    }

    #[tokio::test]
    async fn test_loan_for_unknown_customer_is_not_found() {
        let (ingestor, _clock, _dir) = setup("2024-01-01").await;
        let mut input = loan_input("L-1");
        input.customer_id = Some("C-404".to_string());

        let err = ingestor.create_loan(input).await.unwrap_err();
        assert!(matches!(err, IngestError::CustomerNotFound(id) if id.as_str() == "C-404"));
        assert!(!ingestor.repo().loan_exists(&LoanId::new("L-1")).await.unwrap());

        let mut anonymous = loan_input("L-2");
        anonymous.customer_id = None;
        assert!(ingestor.create_loan(anonymous).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_is_derived_not_stored_on_the_loan() {
        let (ingestor, _clock, _dir) = setup("2024-01-03").await;
        ingestor.create_loan(loan_input("L-1")).await.unwrap();
        let loan_id = LoanId::new("L-1");

        let mut full = repayment_input("1", "L-1", "2024-01-02", 1_350_000);
        full.principal_paid = Decimal::from_i64(1_000_000);
        full.interest_paid = Decimal::from_i64(300_000);
        full.fees_paid = Decimal::from_i64(50_000);
        ingestor.create_repayment(full.clone()).await.unwrap();

        let closed = ingestor.get_derived_state(&loan_id).await.unwrap();
        assert_eq!(closed.lifecycle_status, LoanStatus::Closed);
        let loan = ingestor.repo().get_loan(&loan_id).await.unwrap().unwrap();
        assert_eq!(loan.status, LoanStatus::Active);

        full.is_reversed = true;
        ingestor.create_repayment(full).await.unwrap();
        let reopened = ingestor.get_derived_state(&loan_id).await.unwrap();
        assert_eq!(reopened.lifecycle_status, LoanStatus::Active);
        assert_eq!(
            reopened.total_outstanding,
            Some(Decimal::from_i64(1_350_000))
        );
    }

    #[tokio::test]
    async fn test_resubmitted_loan_keeps_ingested_status() {
        let (ingestor, _clock, _dir) = setup("2024-01-01").await;
        let mut defaulted = loan_input("L-1");
        defaulted.status = Some("defaulted".to_string());
        ingestor.create_loan(defaulted).await.unwrap();

        ingestor.create_loan(loan_input("L-1")).await.unwrap();
        let loan = ingestor
            .repo()
            .get_loan(&LoanId::new("L-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loan.status, LoanStatus::Defaulted);
    }

    #[tokio::test]
    async fn test_batch_sync_reports_partial_success() {
        let (ingestor, _clock, _dir) = setup("2024-01-02").await;
        let mut bad_loan = loan_input("L-bad");
        bad_loan.loan_term_days = 0;

        let result = ingestor
            .batch_sync(
                vec![loan_input("L-1"), bad_loan],
                vec![
                    repayment_input("1", "L-1", "2024-01-02", 1_000),
                    repayment_input("2", "L-missing", "2024-01-02", 1_000),
                ],
            )
            .await;

        assert_eq!(result.status, BatchStatus::PartialSuccess);
        assert_eq!(result.results.loans_inserted, 1);
        assert_eq!(result.results.loans_failed, 1);
        assert_eq!(result.results.repayments_inserted, 1);
        assert_eq!(result.results.repayments_failed, 1);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].id, "L-bad");
        assert_eq!(result.errors[1].record_type, "repayment");
    }

    #[tokio::test]
    async fn test_batch_sync_all_failed_is_error() {
        let (ingestor, _clock, _dir) = setup("2024-01-02").await;
        let result = ingestor
            .batch_sync(
                vec![],
                vec![repayment_input("1", "L-missing", "2024-01-02", 1_000)],
            )
            .await;
        assert_eq!(result.status, BatchStatus::Error);
    }
}

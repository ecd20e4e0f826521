//! Single-loan recompute: load facts, run the calculator, persist atomically.

use crate::clock::Clock;
use crate::db::Repository;
use crate::domain::{DerivedLoanState, LoanId};
use crate::engine::{DerivedStateCalculator, ScoreWeights};
use crate::orchestration::locks::{LoanGuard, LoanLocks};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RecomputeError {
    #[error("loan not found: {0}")]
    LoanNotFound(LoanId),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Shared recompute path for ingest, reads, sync and the batch orchestrator.
#[derive(Debug, Clone)]
pub struct LoanRecomputer {
    repo: Arc<Repository>,
    clock: Arc<dyn Clock>,
    weights: ScoreWeights,
    locks: LoanLocks,
}

impl LoanRecomputer {
    pub fn new(repo: Arc<Repository>, clock: Arc<dyn Clock>, weights: ScoreWeights) -> Self {
        Self {
            repo,
            clock,
            weights,
            locks: LoanLocks::new(),
        }
    }

    pub fn repo(&self) -> &Arc<Repository> {
        &self.repo
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn lock(&self, loan_id: &LoanId) -> LoanGuard {
        self.locks.lock(loan_id).await
    }

    /// Recompute under the loan's lock.
    pub async fn recompute(&self, loan_id: &LoanId) -> Result<DerivedLoanState, RecomputeError> {
        let _guard = self.lock(loan_id).await;
        self.recompute_locked(loan_id).await
    }

    /// Recompute assuming the caller already holds the loan's lock.
    pub async fn recompute_locked(
        &self,
        loan_id: &LoanId,
    ) -> Result<DerivedLoanState, RecomputeError> {
        let loan = self
            .repo
            .get_loan(loan_id)
            .await?
            .ok_or_else(|| RecomputeError::LoanNotFound(loan_id.clone()))?;
        let schedule = self.repo.get_schedule(loan_id).await?;
        let events = self.repo.get_repayments_for_loan(loan_id).await?;
        let previous = self.repo.get_derived_state(loan_id).await?;

        let schedule = (!schedule.is_empty()).then_some(schedule.as_slice());
        let evaluation = DerivedStateCalculator::evaluate(
            &loan,
            schedule,
            &events,
            previous.as_ref(),
            self.clock.today(),
            &self.weights,
        );

        self.repo
            .write_derived_state(&evaluation.state, &evaluation.entry_statuses)
            .await?;

        let state = evaluation.state;
        if state.degraded {
            warn!(
                loan_id = %loan_id,
                reason = state.degraded_reason.as_deref().unwrap_or(""),
                "Derived state degraded"
            );
        } else {
            debug!(
                loan_id = %loan_id,
                current_dpd = ?state.current_dpd,
                fimr = %state.fimr_state,
                "Derived state recomputed"
            );
        }
        Ok(state)
    }

    /// Persisted state, refreshed first when it is missing or older than today.
    pub async fn current_state(
        &self,
        loan_id: &LoanId,
    ) -> Result<DerivedLoanState, RecomputeError> {
        if let Some(state) = self.repo.get_derived_state(loan_id).await? {
            if state.as_of >= self.clock.today() {
                return Ok(state);
            }
        }
        self.recompute(loan_id).await
    }
}

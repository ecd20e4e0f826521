use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::domain::{DerivedLoanState, LoanId, RepaymentEvent, ScheduleEntry};
use crate::error::AppError;
use crate::orchestration::LoanSyncResult;

#[derive(Debug, Serialize)]
pub struct RepaymentsResponse {
    pub loan_id: LoanId,
    pub repayments: Vec<RepaymentEvent>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub loan_id: LoanId,
    pub entries: Vec<ScheduleEntry>,
}

async fn require_loan(state: &AppState, loan_id: &LoanId) -> Result<(), AppError> {
    if state.repo.loan_exists(loan_id).await? {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("loan {}", loan_id)))
    }
}

pub async fn get_derived_state(
    Path(loan_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DerivedLoanState>, AppError> {
    let loan_id = LoanId::new(loan_id);
    let derived = state.ingestor.get_derived_state(&loan_id).await?;
    Ok(Json(derived))
}

pub async fn get_repayments(
    Path(loan_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RepaymentsResponse>, AppError> {
    let loan_id = LoanId::new(loan_id);
    require_loan(&state, &loan_id).await?;
    let repayments = state.repo.get_repayments_for_loan(&loan_id).await?;
    Ok(Json(RepaymentsResponse {
        loan_id,
        repayments,
    }))
}

pub async fn get_schedule(
    Path(loan_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ScheduleResponse>, AppError> {
    let loan_id = LoanId::new(loan_id);
    require_loan(&state, &loan_id).await?;
    let entries = state.repo.get_schedule(&loan_id).await?;
    Ok(Json(ScheduleResponse { loan_id, entries }))
}

pub async fn recompute(
    Path(loan_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DerivedLoanState>, AppError> {
    let loan_id = LoanId::new(loan_id);
    let derived = state.ingestor.recompute_loan(&loan_id).await?;
    Ok(Json(derived))
}

pub async fn sync_repayments(
    Path(loan_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<LoanSyncResult>, AppError> {
    let loan_id = LoanId::new(loan_id);
    let result = state.sync.sync_loan_repayments(&loan_id).await?;
    Ok(Json(result))
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::{
    CustomerId, CustomerInput, LoanId, LoanInput, OfficerId, OfficerInput, RepaymentId,
    RepaymentInput,
};
use crate::error::AppError;
use crate::orchestration::{BatchStatus, BatchSyncResult};

#[derive(Debug, Serialize)]
pub struct CustomerCreated {
    pub customer_id: CustomerId,
}

#[derive(Debug, Serialize)]
pub struct OfficerCreated {
    pub officer_id: OfficerId,
}

#[derive(Debug, Serialize)]
pub struct LoanCreated {
    pub loan_id: LoanId,
    pub schedule_generated: bool,
}

#[derive(Debug, Serialize)]
pub struct RepaymentCreated {
    pub repayment_id: RepaymentId,
    pub loan_id: LoanId,
    pub changed: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchSyncRequest {
    #[serde(default)]
    pub loans: Vec<LoanInput>,
    #[serde(default)]
    pub repayments: Vec<RepaymentInput>,
}

pub async fn create_customer(
    State(state): State<AppState>,
    Json(input): Json<CustomerInput>,
) -> Result<(StatusCode, Json<CustomerCreated>), AppError> {
    let customer_id = state.ingestor.upsert_customer(input).await?;
    Ok((StatusCode::CREATED, Json(CustomerCreated { customer_id })))
}

pub async fn create_officer(
    State(state): State<AppState>,
    Json(input): Json<OfficerInput>,
) -> Result<Json<OfficerCreated>, AppError> {
    let officer_id = state.ingestor.upsert_officer(input).await?;
    Ok(Json(OfficerCreated { officer_id }))
}

pub async fn create_loan(
    State(state): State<AppState>,
    Json(input): Json<LoanInput>,
) -> Result<(StatusCode, Json<LoanCreated>), AppError> {
    let ingested = state.ingestor.create_loan(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(LoanCreated {
            loan_id: ingested.loan_id,
            schedule_generated: ingested.schedule_generated,
        }),
    ))
}

pub async fn create_repayment(
    State(state): State<AppState>,
    Json(input): Json<RepaymentInput>,
) -> Result<(StatusCode, Json<RepaymentCreated>), AppError> {
    let ingested = state.ingestor.create_repayment(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(RepaymentCreated {
            changed: ingested.outcome.changed(),
            repayment_id: ingested.repayment_id,
            loan_id: ingested.loan_id,
        }),
    ))
}

/// 200 when every record landed, 207 on partial success, 400 otherwise.
pub async fn batch_sync(
    State(state): State<AppState>,
    Json(request): Json<BatchSyncRequest>,
) -> Result<(StatusCode, Json<BatchSyncResult>), AppError> {
    if request.loans.is_empty() && request.repayments.is_empty() {
        return Err(AppError::BadRequest(
            "batch must contain at least one loan or repayment".to_string(),
        ));
    }

    let result = state
        .ingestor
        .batch_sync(request.loans, request.repayments)
        .await;
    let status = match result.status {
        BatchStatus::Success => StatusCode::OK,
        BatchStatus::PartialSuccess => StatusCode::MULTI_STATUS,
        BatchStatus::Error => StatusCode::BAD_REQUEST,
    };
    Ok((status, Json(result)))
}

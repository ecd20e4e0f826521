use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::LoanId;
use crate::error::AppError;
use crate::orchestration::RecalcJobStatus;

#[derive(Debug, Deserialize)]
pub struct RecalcQuery {
    /// Checkpoint of an earlier run to continue from.
    pub resume_after: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub job_id: String,
    pub cancel_requested: bool,
}

pub async fn start_recalculation(
    Query(params): Query<RecalcQuery>,
    State(state): State<AppState>,
) -> (StatusCode, Json<JobAccepted>) {
    let resume_after = params
        .resume_after
        .filter(|s| !s.trim().is_empty())
        .map(LoanId::new);
    let job_id = state.jobs.start(resume_after);
    (
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job_id,
            status: "accepted",
        }),
    )
}

pub async fn get_job_status(
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RecalcJobStatus>, AppError> {
    state
        .jobs
        .status(&job_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))
}

pub async fn cancel_job(
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<CancelResponse>, AppError> {
    if !state.jobs.cancel(&job_id) {
        return Err(AppError::NotFound(format!("job {}", job_id)));
    }
    Ok(Json(CancelResponse {
        job_id,
        cancel_requested: true,
    }))
}

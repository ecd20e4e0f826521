use axum::extract::State;
use axum::Json;

use super::AppState;
use crate::error::AppError;
use crate::orchestration::{FullSyncResult, IncrementalSyncResult};

pub async fn sync_incremental(
    State(state): State<AppState>,
) -> Result<Json<IncrementalSyncResult>, AppError> {
    Ok(Json(state.sync.sync_incremental().await?))
}

pub async fn sync_full(State(state): State<AppState>) -> Result<Json<FullSyncResult>, AppError> {
    Ok(Json(state.sync.sync_full().await?))
}

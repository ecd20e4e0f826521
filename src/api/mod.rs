pub mod customers;
pub mod etl;
pub mod health;
pub mod loans;
pub mod recalc;
pub mod sync;

use crate::db::Repository;
use crate::orchestration::{EventIngestor, RecalcJobs, SyncReconciler};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub ingestor: EventIngestor,
    pub sync: SyncReconciler,
    pub jobs: RecalcJobs,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        ingestor: EventIngestor,
        sync: SyncReconciler,
        jobs: RecalcJobs,
    ) -> Self {
        Self {
            repo,
            ingestor,
            sync,
            jobs,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/etl/customers", post(etl::create_customer))
        .route("/v1/etl/officers", post(etl::create_officer))
        .route("/v1/etl/loans", post(etl::create_loan))
        .route("/v1/etl/repayments", post(etl::create_repayment))
        .route("/v1/etl/sync", post(etl::batch_sync))
        .route(
            "/v1/customers/:customer_id",
            get(customers::get_customer),
        )
        .route(
            "/v1/loans/recalculate-fields",
            post(recalc::start_recalculation),
        )
        .route(
            "/v1/loans/recalculate-fields/:job_id",
            get(recalc::get_job_status),
        )
        .route(
            "/v1/loans/recalculate-fields/:job_id/cancel",
            post(recalc::cancel_job),
        )
        .route(
            "/v1/loans/:loan_id/derived-state",
            get(loans::get_derived_state),
        )
        .route("/v1/loans/:loan_id/repayments", get(loans::get_repayments))
        .route("/v1/loans/:loan_id/schedule", get(loans::get_schedule))
        .route("/v1/loans/:loan_id/recompute", post(loans::recompute))
        .route(
            "/v1/loans/:loan_id/sync-repayments",
            post(loans::sync_repayments),
        )
        .route("/v1/sync/repayments", post(sync::sync_incremental))
        .route("/v1/sync/full", post(sync::sync_full))
        .layer(cors)
        .with_state(state)
}

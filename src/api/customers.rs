use axum::extract::{Path, State};
use axum::Json;

use super::AppState;
use crate::domain::{Customer, CustomerId};
use crate::error::AppError;

pub async fn get_customer(
    Path(customer_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Customer>, AppError> {
    let customer_id = CustomerId::new(customer_id);
    state
        .repo
        .get_customer(&customer_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("customer {}", customer_id)))
}

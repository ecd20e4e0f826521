//! Input validation errors shared by loan and repayment ingest.

use crate::domain::primitives::DateParseError;
use thiserror::Error;

/// Malformed input, rejected before any state change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: String },
    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error(
        "payment_amount {total} must equal principal_paid + interest_paid + fees_paid + penalty_paid ({allocated})"
    )]
    AllocationMismatch { total: String, allocated: String },
    #[error("loan_term_days must be positive (got {0})")]
    NonPositiveTerm(i64),
    #[error(transparent)]
    Date(#[from] DateParseError),
}

impl ValidationError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

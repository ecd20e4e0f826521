//! Derived loan state: a recomputable cache, never a source of truth.

use crate::domain::primitives::LoanId;
use crate::domain::{Decimal, LoanStatus, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// First-installment outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FimrState {
    /// First due date not yet passed and no qualifying payment.
    Undetermined,
    /// Covered by a payment on or before the first due date. Terminal.
    Met,
    /// Due date passed with no qualifying payment.
    Missed,
}

impl FimrState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FimrState::Undetermined => "Undetermined",
            FimrState::Met => "Met",
            FimrState::Missed => "Missed",
        }
    }

    pub fn fimr_tagged(&self) -> bool {
        matches!(self, FimrState::Missed)
    }

    pub fn first_payment_missed(&self) -> Option<bool> {
        match self {
            FimrState::Undetermined => None,
            FimrState::Met => Some(false),
            FimrState::Missed => Some(true),
        }
    }
}

impl fmt::Display for FimrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FimrState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Undetermined" => Ok(FimrState::Undetermined),
            "Met" => Ok(FimrState::Met),
            "Missed" => Ok(FimrState::Missed),
            other => Err(ValidationError::invalid(
                "fimr_state",
                format!("unknown FIMR state '{}'", other),
            )),
        }
    }
}

/// Everything derived for one loan as of one date.
///
/// Fields that depend on the schedule are `None` when `degraded` is set, so
/// "no debt" and "could not compute" stay distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedLoanState {
    pub loan_id: LoanId,
    pub as_of: NaiveDate,
    pub lifecycle_status: LoanStatus,

    pub principal_outstanding: Option<Decimal>,
    pub interest_outstanding: Option<Decimal>,
    pub fees_outstanding: Option<Decimal>,
    pub total_outstanding: Option<Decimal>,

    pub total_principal_paid: Decimal,
    pub total_interest_paid: Decimal,
    pub total_fees_paid: Decimal,
    pub total_penalty_paid: Decimal,
    pub total_repayments: Decimal,

    pub current_dpd: Option<i64>,
    pub max_dpd_ever: Option<i64>,

    pub fimr_state: FimrState,
    pub first_payment_missed: Option<bool>,
    pub fimr_tagged: bool,
    pub early_indicator_tagged: Option<bool>,

    pub first_payment_received_date: Option<NaiveDate>,
    pub last_payment_date: Option<NaiveDate>,
    pub days_since_last_repayment: i64,

    pub repayment_delay_rate: Option<Decimal>,
    pub timeliness_score: Option<Decimal>,
    pub repayment_health: Option<Decimal>,

    pub degraded: bool,
    pub degraded_reason: Option<String>,
}

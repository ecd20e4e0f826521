//! Loan record and lifecycle status.

use crate::domain::primitives::{parse_date, CustomerId, LoanId, OfficerId};
use crate::domain::{Decimal, ValidationError, MONEY_DP};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Loan lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanStatus {
    Active,
    Closed,
    Defaulted,
    PastMaturity,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "Active",
            LoanStatus::Closed => "Closed",
            LoanStatus::Defaulted => "Defaulted",
            LoanStatus::PastMaturity => "PastMaturity",
        }
    }

    /// Statuses that recomputation never moves a loan out of.
    pub fn is_sticky(&self) -> bool {
        matches!(self, LoanStatus::Closed | LoanStatus::Defaulted)
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "").as_str() {
            "active" => Ok(LoanStatus::Active),
            "closed" | "repaid" => Ok(LoanStatus::Closed),
            "defaulted" => Ok(LoanStatus::Defaulted),
            "pastmaturity" => Ok(LoanStatus::PastMaturity),
            other => Err(ValidationError::invalid(
                "status",
                format!("unknown loan status '{}'", other),
            )),
        }
    }
}

/// A disbursed loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub loan_id: LoanId,
    /// Must name a stored customer when set.
    pub customer_id: Option<CustomerId>,
    pub officer_id: Option<OfficerId>,
    pub principal: Decimal,
    /// Flat rate charged on principal over the whole term (0.30 = 30%).
    pub interest_rate: Decimal,
    pub fee_amount: Decimal,
    pub disbursement_date: NaiveDate,
    pub term_days: i64,
    /// Set once the schedule has been generated.
    pub first_payment_due_date: Option<NaiveDate>,
    pub maturity_date: NaiveDate,
    pub status: LoanStatus,
}

impl Loan {
    pub fn interest_amount(&self) -> Decimal {
        (self.principal * self.interest_rate).round_dp(MONEY_DP)
    }

    /// True when the terms that drive the schedule differ.
    pub fn schedule_terms_differ(&self, other: &Loan) -> bool {
        self.principal != other.principal
            || self.interest_rate != other.interest_rate
            || self.fee_amount != other.fee_amount
            || self.disbursement_date != other.disbursement_date
            || self.term_days != other.term_days
    }
}

/// Inbound loan payload (ETL and sync).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanInput {
    pub loan_id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub officer_id: Option<String>,
    pub principal: Decimal,
    #[serde(default)]
    pub interest_rate: Option<Decimal>,
    #[serde(default)]
    pub fee_amount: Option<Decimal>,
    pub disbursement_date: String,
    pub loan_term_days: i64,
    #[serde(default)]
    pub maturity_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl LoanInput {
    /// Validate and convert into a [`Loan`] without a first due date.
    ///
    /// # Errors
    /// Returns a validation error for missing ids, negative amounts,
    /// non-positive terms or unparseable dates.
    pub fn into_loan(self) -> Result<Loan, ValidationError> {
        let loan_id = self.loan_id.trim().to_string();
        if loan_id.is_empty() {
            return Err(ValidationError::MissingField("loan_id"));
        }
        if self.loan_term_days <= 0 {
            return Err(ValidationError::NonPositiveTerm(self.loan_term_days));
        }

        let interest_rate = self.interest_rate.unwrap_or_default();
        let fee_amount = self.fee_amount.unwrap_or_default();
        for (field, value) in [
            ("principal", self.principal),
            ("interest_rate", interest_rate),
            ("fee_amount", fee_amount),
        ] {
            if value.is_negative() {
                return Err(ValidationError::Negative {
                    field,
                    value: value.to_canonical_string(),
                });
            }
        }

        let disbursement_date = parse_date("disbursement_date", &self.disbursement_date)?;
        let maturity_date = match self.maturity_date.as_deref() {
            Some(s) if !s.trim().is_empty() => parse_date("maturity_date", s)?,
            _ => disbursement_date
                .checked_add_days(Days::new(self.loan_term_days as u64))
                .ok_or_else(|| ValidationError::invalid("loan_term_days", "term out of range"))?,
        };
        let status = match self.status.as_deref() {
            Some(s) if !s.trim().is_empty() => s.parse()?,
            _ => LoanStatus::Active,
        };

        Ok(Loan {
            loan_id: LoanId::new(loan_id),
            customer_id: self
                .customer_id
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(CustomerId::new),
            officer_id: self
                .officer_id
                .filter(|s| !s.trim().is_empty())
                .map(OfficerId::new),
            principal: self.principal,
            interest_rate,
            fee_amount,
            disbursement_date,
            term_days: self.loan_term_days,
            first_payment_due_date: None,
            maturity_date,
            status,
        })
    }
}

//! Upstream record shapes.
//!
//! Pages are decoded element by element, and every field is optional, so one
//! malformed record becomes a per-record error instead of failing the page.

use crate::domain::{Decimal, LoanInput, RepaymentInput, ValidationError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One element of an upstream page.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRecord<T> {
    Parsed(T),
    /// Did not decode. `id` is taken from the raw element when present.
    Malformed { id: Option<String>, error: String },
}

impl<T: DeserializeOwned> SourceRecord<T> {
    /// Decode one raw element, reading `id_field` for error reports.
    pub fn decode(value: Value, id_field: &str) -> Self {
        let id = match value.get(id_field) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        match serde_json::from_value(value) {
            Ok(record) => SourceRecord::Parsed(record),
            Err(e) => SourceRecord::Malformed {
                id,
                error: e.to_string(),
            },
        }
    }
}

impl SourceRecord<SourceRepayment> {
    /// Numeric upstream id, whether or not the rest of the record decoded.
    pub fn repayment_id(&self) -> Option<i64> {
        match self {
            SourceRecord::Parsed(record) => record.id,
            SourceRecord::Malformed { id, .. } => {
                id.as_deref().and_then(|s| s.trim().parse().ok())
            }
        }
    }
}

/// Accept `"123"` or `123` for identifier fields.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        S(String),
        I(i64),
    }
    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::S(s)) => Some(s),
        Some(Raw::I(i)) => Some(i.to_string()),
        None => None,
    })
}

fn number_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        I(i64),
        S(String),
    }
    match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::I(i)) => Ok(Some(i)),
        Some(Raw::S(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Accept `true`/`false`, `0`/`1` and their string forms.
fn bool_or_int<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        B(bool),
        I(i64),
        S(String),
    }
    match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::B(b)) => Ok(Some(b)),
        Some(Raw::I(0)) => Ok(Some(false)),
        Some(Raw::I(1)) => Ok(Some(true)),
        Some(Raw::I(other)) => Err(serde::de::Error::custom(format!(
            "expected a boolean or 0/1, got {}",
            other
        ))),
        Some(Raw::S(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(Some(true)),
            "false" | "f" | "0" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, got '{}'",
                other
            ))),
        },
        None => Ok(None),
    }
}

/// Loan as served by the source of record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceLoan {
    #[serde(default, deserialize_with = "string_or_number")]
    pub loan_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub customer_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub officer_id: Option<String>,
    #[serde(default)]
    pub principal: Option<Decimal>,
    #[serde(default)]
    pub interest_rate: Option<Decimal>,
    #[serde(default)]
    pub fee_amount: Option<Decimal>,
    #[serde(default)]
    pub disbursement_date: Option<String>,
    #[serde(default)]
    pub loan_term_days: Option<i64>,
    #[serde(default)]
    pub maturity_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl SourceLoan {
    /// # Errors
    /// Names the first essential field that is missing.
    pub fn into_input(self) -> Result<LoanInput, ValidationError> {
        Ok(LoanInput {
            loan_id: self.loan_id.ok_or(ValidationError::MissingField("loan_id"))?,
            customer_id: self.customer_id,
            officer_id: self.officer_id,
            principal: self
                .principal
                .ok_or(ValidationError::MissingField("principal"))?,
            interest_rate: self.interest_rate,
            fee_amount: self.fee_amount,
            disbursement_date: self
                .disbursement_date
                .ok_or(ValidationError::MissingField("disbursement_date"))?,
            loan_term_days: self
                .loan_term_days
                .ok_or(ValidationError::MissingField("loan_term_days"))?,
            maturity_date: self.maturity_date,
            status: self.status,
        })
    }
}

/// Repayment as served by the source of record. Ids are numeric upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRepayment {
    #[serde(default, deserialize_with = "number_or_string")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub loan_id: Option<String>,
    #[serde(default)]
    pub payment_date: Option<String>,
    #[serde(default)]
    pub payment_amount: Option<Decimal>,
    #[serde(default)]
    pub principal_paid: Option<Decimal>,
    #[serde(default)]
    pub interest_paid: Option<Decimal>,
    #[serde(default)]
    pub fees_paid: Option<Decimal>,
    #[serde(default)]
    pub penalty_paid: Option<Decimal>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub is_reversed: Option<bool>,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub is_backdated: Option<bool>,
}

impl SourceRepayment {
    fn has_breakdown(&self) -> bool {
        self.principal_paid.is_some()
            || self.interest_paid.is_some()
            || self.fees_paid.is_some()
            || self.penalty_paid.is_some()
    }

    /// Convert to an ingest payload.
    ///
    /// Without an allocation breakdown the whole amount goes to principal.
    ///
    /// # Errors
    /// Names the first essential field that is missing.
    pub fn into_input(self) -> Result<RepaymentInput, ValidationError> {
        let id = self.id.ok_or(ValidationError::MissingField("id"))?;
        let amount = self
            .payment_amount
            .ok_or(ValidationError::MissingField("payment_amount"))?;
        let has_breakdown = self.has_breakdown();

        Ok(RepaymentInput {
            repayment_id: id.to_string(),
            loan_id: self.loan_id.ok_or(ValidationError::MissingField("loan_id"))?,
            payment_date: self
                .payment_date
                .ok_or(ValidationError::MissingField("payment_date"))?,
            payment_amount: amount,
            principal_paid: if has_breakdown {
                self.principal_paid.unwrap_or_default()
            } else {
                amount
            },
            interest_paid: self.interest_paid.unwrap_or_default(),
            fees_paid: self.fees_paid.unwrap_or_default(),
            penalty_paid: self.penalty_paid.unwrap_or_default(),
            payment_method: self.payment_method,
            is_reversed: self.is_reversed.unwrap_or(false),
            is_backdated: self.is_backdated.unwrap_or(false),
        })
    }
}

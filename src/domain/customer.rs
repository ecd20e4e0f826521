//! Borrower reference record.

use crate::domain::primitives::{parse_date, CustomerId};
use crate::domain::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: CustomerId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub state: Option<String>,
    pub lga: Option<String>,
    pub kyc_status: Option<String>,
}

/// Inbound customer payload (ETL and sync).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInput {
    pub customer_id: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub lga: Option<String>,
    #[serde(default)]
    pub kyc_status: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl CustomerInput {
    /// # Errors
    /// Returns a validation error when the id or name is blank, or the date
    /// of birth does not parse.
    pub fn into_customer(self) -> Result<Customer, ValidationError> {
        let customer_id = self.customer_id.trim().to_string();
        if customer_id.is_empty() {
            return Err(ValidationError::MissingField("customer_id"));
        }
        let name = self.customer_name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::MissingField("customer_name"));
        }
        let date_of_birth = non_blank(self.date_of_birth)
            .map(|s| parse_date("date_of_birth", &s))
            .transpose()?;

        Ok(Customer {
            customer_id: CustomerId::new(customer_id),
            name,
            phone: non_blank(self.customer_phone),
            email: non_blank(self.customer_email),
            date_of_birth,
            state: non_blank(self.state),
            lga: non_blank(self.lga),
            kyc_status: non_blank(self.kyc_status),
        })
    }
}

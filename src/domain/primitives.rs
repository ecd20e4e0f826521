//! Domain primitives: identifiers and calendar-date helpers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Date format used on the wire and in storage.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Loan identifier as assigned by the system of record.
    LoanId
);
string_id!(
    /// Repayment identifier; the natural idempotency key for ingest.
    RepaymentId
);
string_id!(
    /// Loan officer identifier.
    OfficerId
);
string_id!(
    /// Borrower identifier.
    CustomerId
);

impl RepaymentId {
    /// Numeric form of the id, when the id is purely digits.
    ///
    /// Upstream ids are numeric; locally-created ids may not be.
    pub fn numeric(&self) -> Option<i64> {
        if self.0.is_empty() || !self.0.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.0.parse().ok()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid date '{value}' for {field}: expected YYYY-MM-DD")]
pub struct DateParseError {
    pub field: &'static str,
    pub value: String,
}

/// Parse a `YYYY-MM-DD` date, naming the field in the error.
pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, DateParseError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| DateParseError {
        field,
        value: value.to_string(),
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Whole days from `from` to `to` (negative when `to` is earlier).
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repayment_id_numeric() {
        assert_eq!(RepaymentId::new("12345").numeric(), Some(12345));
        assert_eq!(RepaymentId::new("rp-1").numeric(), None);
        assert_eq!(RepaymentId::new("").numeric(), None);
        assert_eq!(RepaymentId::new("-4").numeric(), None);
    }

    #[test]
    fn test_parse_date_names_field() {
        let err = parse_date("payment_date", "2024/01/01").unwrap_err();
        assert_eq!(err.field, "payment_date");
        assert!(err.to_string().contains("payment_date"));

        let ok = parse_date("payment_date", " 2024-01-31 ").unwrap();
        assert_eq!(format_date(ok), "2024-01-31");
    }

    #[test]
    fn test_days_between() {
        let a = parse_date("a", "2024-02-28").unwrap();
        let b = parse_date("b", "2024-03-01").unwrap();
        assert_eq!(days_between(a, b), 2);
        assert_eq!(days_between(b, a), -2);
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = LoanId::new("8205");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"8205\"");
        assert_eq!(id.to_string(), "8205");
    }
}

//! Repayment events and their allocation.

use crate::domain::primitives::{parse_date, LoanId, RepaymentId};
use crate::domain::{Decimal, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Split of one payment across the loan's components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub principal: Decimal,
    pub interest: Decimal,
    pub fees: Decimal,
    pub penalty: Decimal,
}

impl Allocation {
    pub fn total(&self) -> Decimal {
        self.principal + self.interest + self.fees + self.penalty
    }
}

/// A repayment against a loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentEvent {
    pub repayment_id: RepaymentId,
    pub loan_id: LoanId,
    pub payment_date: NaiveDate,
    pub amount: Decimal,
    pub allocation: Allocation,
    pub payment_method: Option<String>,
    pub is_reversed: bool,
    pub is_backdated: bool,
}

impl RepaymentEvent {
    /// Allocation must sum exactly to the amount and no part may be negative.
    ///
    /// # Errors
    /// Returns [`ValidationError::AllocationMismatch`] or
    /// [`ValidationError::Negative`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        let parts = [
            ("payment_amount", self.amount),
            ("principal_paid", self.allocation.principal),
            ("interest_paid", self.allocation.interest),
            ("fees_paid", self.allocation.fees),
            ("penalty_paid", self.allocation.penalty),
        ];
        for (field, value) in parts {
            if value.is_negative() {
                return Err(ValidationError::Negative {
                    field,
                    value: value.to_canonical_string(),
                });
            }
        }

        let allocated = self.allocation.total();
        if allocated != self.amount {
            return Err(ValidationError::AllocationMismatch {
                total: self.amount.to_canonical_string(),
                allocated: allocated.to_canonical_string(),
            });
        }
        Ok(())
    }

    /// Whether the event counts toward the ledger.
    pub fn counts(&self) -> bool {
        !self.is_reversed
    }

    /// Stable hash of everything an upsert could change.
    ///
    /// Two submissions with the same hash are the same event; re-submitting
    /// one is a no-op.
    pub fn content_hash(&self) -> String {
        fn hash_var(hasher: &mut Sha256, data: &str) {
            hasher.update((data.len() as u32).to_le_bytes());
            hasher.update(data.as_bytes());
        }

        let mut hasher = Sha256::new();
        hash_var(&mut hasher, self.repayment_id.as_str());
        hash_var(&mut hasher, self.loan_id.as_str());
        hash_var(&mut hasher, &self.payment_date.to_string());
        for amount in [
            self.amount,
            self.allocation.principal,
            self.allocation.interest,
            self.allocation.fees,
            self.allocation.penalty,
        ] {
            hash_var(&mut hasher, &amount.to_canonical_string());
        }
        hash_var(&mut hasher, self.payment_method.as_deref().unwrap_or(""));
        hasher.update([self.is_reversed as u8, self.is_backdated as u8]);

        hex::encode(hasher.finalize())
    }
}

/// Deterministic ledger order: payment date, then repayment id.
pub fn sort_events_deterministic(events: &mut [RepaymentEvent]) {
    events.sort_by(|a, b| {
        a.payment_date
            .cmp(&b.payment_date)
            .then_with(|| a.repayment_id.cmp(&b.repayment_id))
    });
}

/// Inbound repayment payload (ETL and sync).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentInput {
    pub repayment_id: String,
    pub loan_id: String,
    pub payment_date: String,
    pub payment_amount: Decimal,
    #[serde(default)]
    pub principal_paid: Decimal,
    #[serde(default)]
    pub interest_paid: Decimal,
    #[serde(default)]
    pub fees_paid: Decimal,
    #[serde(default)]
    pub penalty_paid: Decimal,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub is_reversed: bool,
    #[serde(default)]
    pub is_backdated: bool,
}

impl RepaymentInput {
    /// Validate and convert into a [`RepaymentEvent`].
    ///
    /// # Errors
    /// Returns a validation error for missing ids, bad dates, negative parts
    /// or an allocation that does not sum to the amount.
    pub fn into_event(self) -> Result<RepaymentEvent, ValidationError> {
        let repayment_id = self.repayment_id.trim().to_string();
        if repayment_id.is_empty() {
            return Err(ValidationError::MissingField("repayment_id"));
        }
        let loan_id = self.loan_id.trim().to_string();
        if loan_id.is_empty() {
            return Err(ValidationError::MissingField("loan_id"));
        }

        let event = RepaymentEvent {
            repayment_id: RepaymentId::new(repayment_id),
            loan_id: LoanId::new(loan_id),
            payment_date: parse_date("payment_date", &self.payment_date)?,
            amount: self.payment_amount,
            allocation: Allocation {
                principal: self.principal_paid,
                interest: self.interest_paid,
                fees: self.fees_paid,
                penalty: self.penalty_paid,
            },
            payment_method: self.payment_method.filter(|s| !s.trim().is_empty()),
            is_reversed: self.is_reversed,
            is_backdated: self.is_backdated,
        };
        event.validate()?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn input(total: &str, p: &str, i: &str, f: &str) -> RepaymentInput {
        RepaymentInput {
            repayment_id: "100".to_string(),
            loan_id: "L-1".to_string(),
            payment_date: "2024-01-02".to_string(),
            payment_amount: Decimal::from_str(total).unwrap(),
            principal_paid: Decimal::from_str(p).unwrap(),
            interest_paid: Decimal::from_str(i).unwrap(),
            fees_paid: Decimal::from_str(f).unwrap(),
            penalty_paid: Decimal::zero(),
            payment_method: Some("transfer".to_string()),
            is_reversed: false,
            is_backdated: false,
        }
    }

    #[test]
    fn test_allocation_must_sum_to_total() {
        let ok = input("100000", "80000", "15000", "5000").into_event();
        assert!(ok.is_ok());

        let err = input("100000", "80000", "15000", "4999.99")
            .into_event()
            .unwrap_err();
        assert!(matches!(err, ValidationError::AllocationMismatch { .. }));
    }

    #[test]
    fn test_negative_component_rejected() {
        let err = input("100", "150", "-50", "0").into_event().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Negative {
                field: "interest_paid",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_repayment_id_rejected() {
        let mut bad = input("1", "1", "0", "0");
        bad.repayment_id = "  ".to_string();
        assert_eq!(
            bad.into_event().unwrap_err(),
            ValidationError::MissingField("repayment_id")
        );
    }

    #[test]
    fn test_content_hash_tracks_content() {
        let a = input("100000", "80000", "15000", "5000").into_event().unwrap();
        let b = input("100000", "80000", "15000", "5000").into_event().unwrap();
        assert_eq!(a.content_hash(), b.content_hash());

        let mut reversed = a.clone();
        reversed.is_reversed = true;
        assert_ne!(a.content_hash(), reversed.content_hash());

        // Trailing zeros are not a content change.
        let c = input("100000.00", "80000.0", "15000", "5000")
            .into_event()
            .unwrap();
        assert_eq!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn test_sort_events_deterministic() {
        let mut a = input("1", "1", "0", "0").into_event().unwrap();
        a.repayment_id = RepaymentId::new("b");
        let mut b = a.clone();
        b.repayment_id = RepaymentId::new("a");
        let mut c = a.clone();
        c.payment_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let mut events = vec![a, b, c];
        sort_events_deterministic(&mut events);
        let ids: Vec<&str> = events.iter().map(|e| e.repayment_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "b"]);
    }
}

//! Daily amortisation schedule generation.

use crate::domain::{
    ComponentAmounts, Decimal, Loan, PaymentStatus, ScheduleEntry, ValidationError, MONEY_DP,
};
use chrono::Days;

/// Longest term accepted, in days.
pub const MAX_TERM_DAYS: i64 = 3660;

/// Builds a loan's installment schedule from its terms.
pub struct ScheduleGenerator;

impl ScheduleGenerator {
    /// One installment per day of the term, entry `i` due `disbursement + i`.
    ///
    /// Each component is divided by the term and truncated to 2 dp; the last
    /// installment takes the remainder so every component reconciles exactly.
    ///
    /// # Errors
    /// Rejects non-positive or oversized terms and negative amounts.
    pub fn generate(loan: &Loan) -> Result<Vec<ScheduleEntry>, ValidationError> {
        let n = loan.term_days;
        if n <= 0 {
            return Err(ValidationError::NonPositiveTerm(n));
        }
        if n > MAX_TERM_DAYS {
            return Err(ValidationError::invalid(
                "loan_term_days",
                format!("term of {} days exceeds {}", n, MAX_TERM_DAYS),
            ));
        }

        let totals = ComponentAmounts::new(loan.principal, loan.interest_amount(), loan.fee_amount);
        for (field, value) in [
            ("principal", totals.principal),
            ("interest", totals.interest),
            ("fee_amount", totals.fees),
        ] {
            if value.is_negative() {
                return Err(ValidationError::Negative {
                    field,
                    value: value.to_canonical_string(),
                });
            }
        }

        let days = Decimal::from_i64(n);
        let base = ComponentAmounts::new(
            (totals.principal / days).trunc_dp(MONEY_DP),
            (totals.interest / days).trunc_dp(MONEY_DP),
            (totals.fees / days).trunc_dp(MONEY_DP),
        );
        let head = Decimal::from_i64(n - 1);
        let last = ComponentAmounts::new(
            totals.principal - base.principal * head,
            totals.interest - base.interest * head,
            totals.fees - base.fees * head,
        );

        let mut entries = Vec::with_capacity(n as usize);
        for i in 1..=n {
            let due_date = loan
                .disbursement_date
                .checked_add_days(Days::new(i as u64))
                .ok_or_else(|| ValidationError::invalid("disbursement_date", "date out of range"))?;
            entries.push(ScheduleEntry {
                loan_id: loan.loan_id.clone(),
                installment_number: i as u32,
                due_date,
                due: if i == n { last } else { base },
                payment_status: PaymentStatus::Pending,
            });
        }

        Ok(entries)
    }
}

/// Check that a stored schedule still reconciles to the loan's terms.
pub fn schedule_reconciles(loan: &Loan, entries: &[ScheduleEntry]) -> bool {
    let mut sum = ComponentAmounts::default();
    for entry in entries {
        sum = sum + entry.due;
    }
    sum.principal == loan.principal
        && sum.interest == loan.interest_amount()
        && sum.fees == loan.fee_amount
}

//! Derived loan state operations for the repository.

use crate::domain::primitives::format_date;
use crate::domain::{DerivedLoanState, LoanId, PaymentStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{date_col, decimal_col, opt_date_col, opt_decimal_col, parsed_col, Repository};

impl Repository {
    pub async fn get_derived_state(
        &self,
        loan_id: &LoanId,
    ) -> Result<Option<DerivedLoanState>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT loan_id, as_of, lifecycle_status,
                   principal_outstanding, interest_outstanding, fees_outstanding,
                   total_outstanding, total_principal_paid, total_interest_paid,
                   total_fees_paid, total_penalty_paid, total_repayments,
                   current_dpd, max_dpd_ever, fimr_state, first_payment_missed,
                   fimr_tagged, early_indicator_tagged, first_payment_received_date,
                   last_payment_date, days_since_last_repayment, repayment_delay_rate,
                   timeliness_score, repayment_health, degraded, degraded_reason
            FROM derived_loan_state
            WHERE loan_id = ?
            "#,
        )
        .bind(loan_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(state_from_row).transpose()
    }

    /// Persist derived state and schedule payment statuses in a single
    /// transaction. The loan's ingested status is left untouched.
    ///
    /// # Errors
    /// Returns an error if any statement fails; nothing is committed then.
    pub async fn write_derived_state(
        &self,
        state: &DerivedLoanState,
        entry_statuses: &[(u32, PaymentStatus)],
    ) -> Result<(), sqlx::Error> {
        let decimal = |d: Option<crate::domain::Decimal>| d.map(|d| d.to_canonical_string());
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO derived_loan_state (
                loan_id, as_of, lifecycle_status,
                principal_outstanding, interest_outstanding, fees_outstanding,
                total_outstanding, total_principal_paid, total_interest_paid,
                total_fees_paid, total_penalty_paid, total_repayments,
                current_dpd, max_dpd_ever, fimr_state, first_payment_missed,
                fimr_tagged, early_indicator_tagged, first_payment_received_date,
                last_payment_date, days_since_last_repayment, repayment_delay_rate,
                timeliness_score, repayment_health, degraded, degraded_reason, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(loan_id) DO UPDATE SET
                as_of = excluded.as_of,
                lifecycle_status = excluded.lifecycle_status,
                principal_outstanding = excluded.principal_outstanding,
                interest_outstanding = excluded.interest_outstanding,
                fees_outstanding = excluded.fees_outstanding,
                total_outstanding = excluded.total_outstanding,
                total_principal_paid = excluded.total_principal_paid,
                total_interest_paid = excluded.total_interest_paid,
                total_fees_paid = excluded.total_fees_paid,
                total_penalty_paid = excluded.total_penalty_paid,
                total_repayments = excluded.total_repayments,
                current_dpd = excluded.current_dpd,
                max_dpd_ever = excluded.max_dpd_ever,
                fimr_state = excluded.fimr_state,
                first_payment_missed = excluded.first_payment_missed,
                fimr_tagged = excluded.fimr_tagged,
                early_indicator_tagged = excluded.early_indicator_tagged,
                first_payment_received_date = excluded.first_payment_received_date,
                last_payment_date = excluded.last_payment_date,
                days_since_last_repayment = excluded.days_since_last_repayment,
                repayment_delay_rate = excluded.repayment_delay_rate,
                timeliness_score = excluded.timeliness_score,
                repayment_health = excluded.repayment_health,
                degraded = excluded.degraded,
                degraded_reason = excluded.degraded_reason,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(state.loan_id.as_str())
        .bind(format_date(state.as_of))
        .bind(state.lifecycle_status.as_str())
        .bind(decimal(state.principal_outstanding))
        .bind(decimal(state.interest_outstanding))
        .bind(decimal(state.fees_outstanding))
        .bind(decimal(state.total_outstanding))
        .bind(state.total_principal_paid.to_canonical_string())
        .bind(state.total_interest_paid.to_canonical_string())
        .bind(state.total_fees_paid.to_canonical_string())
        .bind(state.total_penalty_paid.to_canonical_string())
        .bind(state.total_repayments.to_canonical_string())
        .bind(state.current_dpd)
        .bind(state.max_dpd_ever)
        .bind(state.fimr_state.as_str())
        .bind(state.first_payment_missed)
        .bind(state.fimr_tagged)
        .bind(state.early_indicator_tagged)
        .bind(state.first_payment_received_date.map(format_date))
        .bind(state.last_payment_date.map(format_date))
        .bind(state.days_since_last_repayment)
        .bind(decimal(state.repayment_delay_rate))
        .bind(decimal(state.timeliness_score))
        .bind(decimal(state.repayment_health))
        .bind(state.degraded)
        .bind(state.degraded_reason.as_deref())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await?;

        for (installment_number, status) in entry_statuses {
            sqlx::query(
                r#"
                UPDATE schedule_entries SET payment_status = ?
                WHERE loan_id = ? AND installment_number = ? AND payment_status <> ?
                "#,
            )
            .bind(status.as_str())
            .bind(state.loan_id.as_str())
            .bind(*installment_number as i64)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn state_from_row(row: &SqliteRow) -> Result<DerivedLoanState, sqlx::Error> {
    Ok(DerivedLoanState {
        loan_id: LoanId::new(row.try_get::<String, _>("loan_id")?),
        as_of: date_col(row, "as_of")?,
        lifecycle_status: parsed_col(row, "lifecycle_status")?,
        principal_outstanding: opt_decimal_col(row, "principal_outstanding")?,
        interest_outstanding: opt_decimal_col(row, "interest_outstanding")?,
        fees_outstanding: opt_decimal_col(row, "fees_outstanding")?,
        total_outstanding: opt_decimal_col(row, "total_outstanding")?,
        total_principal_paid: decimal_col(row, "total_principal_paid")?,
        total_interest_paid: decimal_col(row, "total_interest_paid")?,
        total_fees_paid: decimal_col(row, "total_fees_paid")?,
        total_penalty_paid: decimal_col(row, "total_penalty_paid")?,
        total_repayments: decimal_col(row, "total_repayments")?,
        current_dpd: row.try_get("current_dpd")?,
        max_dpd_ever: row.try_get("max_dpd_ever")?,
        fimr_state: parsed_col(row, "fimr_state")?,
        first_payment_missed: row.try_get("first_payment_missed")?,
        fimr_tagged: row.try_get("fimr_tagged")?,
        early_indicator_tagged: row.try_get("early_indicator_tagged")?,
        first_payment_received_date: opt_date_col(row, "first_payment_received_date")?,
        last_payment_date: opt_date_col(row, "last_payment_date")?,
        days_since_last_repayment: row.try_get("days_since_last_repayment")?,
        repayment_delay_rate: opt_decimal_col(row, "repayment_delay_rate")?,
        timeliness_score: opt_decimal_col(row, "timeliness_score")?,
        repayment_health: opt_decimal_col(row, "repayment_health")?,
        degraded: row.try_get("degraded")?,
        degraded_reason: row.try_get("degraded_reason")?,
    })
}

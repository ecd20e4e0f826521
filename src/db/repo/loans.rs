//! Loan and schedule operations for the repository.

use crate::domain::primitives::format_date;
use crate::domain::{ComponentAmounts, CustomerId, Loan, LoanId, OfficerId, ScheduleEntry};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use super::{date_col, decimal_col, opt_date_col, parsed_col, Repository};

impl Repository {
    /// Upsert a loan and, when given, replace its schedule, in one transaction.
    ///
    /// # Errors
    /// Returns an error if any statement fails; nothing is committed then.
    pub async fn save_loan(
        &self,
        loan: &Loan,
        schedule: Option<&[ScheduleEntry]>,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let now = chrono::Utc::now().timestamp_millis();

        sqlx::query(
            r#"
            INSERT INTO loans (
                loan_id, customer_id, officer_id, principal, interest_rate, fee_amount,
                disbursement_date, loan_term_days, first_payment_due_date, maturity_date,
                status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(loan_id) DO UPDATE SET
                customer_id = excluded.customer_id,
                officer_id = excluded.officer_id,
                principal = excluded.principal,
                interest_rate = excluded.interest_rate,
                fee_amount = excluded.fee_amount,
                disbursement_date = excluded.disbursement_date,
                loan_term_days = excluded.loan_term_days,
                first_payment_due_date = excluded.first_payment_due_date,
                maturity_date = excluded.maturity_date,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(loan.loan_id.as_str())
        .bind(loan.customer_id.as_ref().map(|c| c.as_str()))
        .bind(loan.officer_id.as_ref().map(|o| o.as_str()))
        .bind(loan.principal.to_canonical_string())
        .bind(loan.interest_rate.to_canonical_string())
        .bind(loan.fee_amount.to_canonical_string())
        .bind(format_date(loan.disbursement_date))
        .bind(loan.term_days)
        .bind(loan.first_payment_due_date.map(format_date))
        .bind(format_date(loan.maturity_date))
        .bind(loan.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if let Some(entries) = schedule {
            replace_schedule_tx(&mut tx, &loan.loan_id, entries).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails or a stored column does not decode.
    pub async fn get_loan(&self, loan_id: &LoanId) -> Result<Option<Loan>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT loan_id, customer_id, officer_id, principal, interest_rate, fee_amount,
                   disbursement_date, loan_term_days, first_payment_due_date, maturity_date,
                   status
            FROM loans
            WHERE loan_id = ?
            "#,
        )
        .bind(loan_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(loan_from_row).transpose()
    }

    pub async fn loan_exists(&self, loan_id: &LoanId) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM loans WHERE loan_id = ?")
            .bind(loan_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Loan ids in ascending order, strictly after `after`, at most `limit`.
    pub async fn list_loan_ids_after(
        &self,
        after: Option<&LoanId>,
        limit: i64,
    ) -> Result<Vec<LoanId>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT loan_id
            FROM loans
            WHERE ? IS NULL OR loan_id > ?
            ORDER BY loan_id ASC
            LIMIT ?
            "#,
        )
        .bind(after.map(|id| id.as_str()))
        .bind(after.map(|id| id.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| LoanId::new(r.get::<String, _>("loan_id")))
            .collect())
    }

    /// Schedule entries in installment order; empty when none are stored.
    pub async fn get_schedule(&self, loan_id: &LoanId) -> Result<Vec<ScheduleEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT loan_id, installment_number, due_date, principal_due, interest_due,
                   fee_due, payment_status
            FROM schedule_entries
            WHERE loan_id = ?
            ORDER BY installment_number ASC
            "#,
        )
        .bind(loan_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ScheduleEntry, sqlx::Error> {
                Ok(ScheduleEntry {
                    loan_id: LoanId::new(row.try_get::<String, _>("loan_id")?),
                    installment_number: row.try_get::<i64, _>("installment_number")? as u32,
                    due_date: date_col(row, "due_date")?,
                    due: ComponentAmounts::new(
                        decimal_col(row, "principal_due")?,
                        decimal_col(row, "interest_due")?,
                        decimal_col(row, "fee_due")?,
                    ),
                    payment_status: parsed_col(row, "payment_status")?,
                })
            })
            .collect()
    }
}

async fn replace_schedule_tx(
    tx: &mut Transaction<'_, Sqlite>,
    loan_id: &LoanId,
    entries: &[ScheduleEntry],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM schedule_entries WHERE loan_id = ?")
        .bind(loan_id.as_str())
        .execute(&mut **tx)
        .await?;

    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO schedule_entries (
                loan_id, installment_number, due_date, principal_due, interest_due,
                fee_due, total_due, payment_status
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(loan_id.as_str())
        .bind(entry.installment_number as i64)
        .bind(format_date(entry.due_date))
        .bind(entry.due.principal.to_canonical_string())
        .bind(entry.due.interest.to_canonical_string())
        .bind(entry.due.fees.to_canonical_string())
        .bind(entry.total_due().to_canonical_string())
        .bind(entry.payment_status.as_str())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn loan_from_row(row: &SqliteRow) -> Result<Loan, sqlx::Error> {
    Ok(Loan {
        loan_id: LoanId::new(row.try_get::<String, _>("loan_id")?),
        customer_id: row
            .try_get::<Option<String>, _>("customer_id")?
            .map(CustomerId::new),
        officer_id: row
            .try_get::<Option<String>, _>("officer_id")?
            .map(OfficerId::new),
        principal: decimal_col(row, "principal")?,
        interest_rate: decimal_col(row, "interest_rate")?,
        fee_amount: decimal_col(row, "fee_amount")?,
        disbursement_date: date_col(row, "disbursement_date")?,
        term_days: row.try_get("loan_term_days")?,
        first_payment_due_date: opt_date_col(row, "first_payment_due_date")?,
        maturity_date: date_col(row, "maturity_date")?,
        status: parsed_col(row, "status")?,
    })
}

//! Repayment operations for the repository.

use crate::domain::primitives::format_date;
use crate::domain::{Allocation, LoanId, RepaymentEvent, RepaymentId};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{date_col, decimal_col, Repository};

/// What an upsert did to the stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Content changed. `moved_from` is set when the event now belongs to a
    /// different loan than before.
    Updated { moved_from: Option<LoanId> },
    /// Same content hash as the stored row; nothing written.
    Unchanged,
}

impl UpsertOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, UpsertOutcome::Unchanged)
    }
}

impl Repository {
    /// Insert or update a repayment keyed by `repayment_id`.
    ///
    /// The transaction opens with the insert so the write lock is held before
    /// the stored row is read. Under WAL a deferred read cannot be upgraded
    /// once another connection has committed.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_repayment(
        &self,
        event: &RepaymentEvent,
    ) -> Result<UpsertOutcome, sqlx::Error> {
        let hash = event.content_hash();
        let now = chrono::Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO repayments (
                repayment_id, loan_id, payment_date, payment_amount,
                principal_paid, interest_paid, fees_paid, penalty_paid,
                payment_method, is_reversed, is_backdated, content_hash,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(repayment_id) DO NOTHING
            "#,
        )
        .bind(event.repayment_id.as_str())
        .bind(event.loan_id.as_str())
        .bind(format_date(event.payment_date))
        .bind(event.amount.to_canonical_string())
        .bind(event.allocation.principal.to_canonical_string())
        .bind(event.allocation.interest.to_canonical_string())
        .bind(event.allocation.fees.to_canonical_string())
        .bind(event.allocation.penalty.to_canonical_string())
        .bind(event.payment_method.as_deref())
        .bind(event.is_reversed)
        .bind(event.is_backdated)
        .bind(&hash)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted > 0 {
            tx.commit().await?;
            return Ok(UpsertOutcome::Inserted);
        }

        let row = sqlx::query(
            "SELECT loan_id, content_hash FROM repayments WHERE repayment_id = ?",
        )
        .bind(event.repayment_id.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let stored_hash: String = row.try_get("content_hash")?;
        if stored_hash == hash {
            return Ok(UpsertOutcome::Unchanged);
        }
        let previous_loan = LoanId::new(row.try_get::<String, _>("loan_id")?);

        sqlx::query(
            r#"
            UPDATE repayments SET
                loan_id = ?, payment_date = ?, payment_amount = ?,
                principal_paid = ?, interest_paid = ?, fees_paid = ?, penalty_paid = ?,
                payment_method = ?, is_reversed = ?, is_backdated = ?,
                content_hash = ?, updated_at = ?
            WHERE repayment_id = ?
            "#,
        )
        .bind(event.loan_id.as_str())
        .bind(format_date(event.payment_date))
        .bind(event.amount.to_canonical_string())
        .bind(event.allocation.principal.to_canonical_string())
        .bind(event.allocation.interest.to_canonical_string())
        .bind(event.allocation.fees.to_canonical_string())
        .bind(event.allocation.penalty.to_canonical_string())
        .bind(event.payment_method.as_deref())
        .bind(event.is_reversed)
        .bind(event.is_backdated)
        .bind(&hash)
        .bind(now)
        .bind(event.repayment_id.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(UpsertOutcome::Updated {
            moved_from: (previous_loan != event.loan_id).then_some(previous_loan),
        })
    }

    /// Every stored event for a loan, reversed ones included, in ledger order.
    pub async fn get_repayments_for_loan(
        &self,
        loan_id: &LoanId,
    ) -> Result<Vec<RepaymentEvent>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT repayment_id, loan_id, payment_date, payment_amount,
                   principal_paid, interest_paid, fees_paid, penalty_paid,
                   payment_method, is_reversed, is_backdated
            FROM repayments
            WHERE loan_id = ?
            ORDER BY payment_date ASC, repayment_id ASC
            "#,
        )
        .bind(loan_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    pub async fn get_repayment(
        &self,
        repayment_id: &RepaymentId,
    ) -> Result<Option<RepaymentEvent>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT repayment_id, loan_id, payment_date, payment_amount,
                   principal_paid, interest_paid, fees_paid, penalty_paid,
                   payment_method, is_reversed, is_backdated
            FROM repayments
            WHERE repayment_id = ?
            "#,
        )
        .bind(repayment_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(event_from_row).transpose()
    }

    /// Largest purely-numeric repayment id stored, if any.
    pub async fn max_numeric_repayment_id(&self) -> Result<Option<i64>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT MAX(CAST(repayment_id AS INTEGER)) AS max_id
            FROM repayments
            WHERE repayment_id <> '' AND repayment_id NOT GLOB '*[^0-9]*'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<Option<i64>, _>("max_id"))
    }

    pub async fn count_repayments(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM repayments")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

fn event_from_row(row: &SqliteRow) -> Result<RepaymentEvent, sqlx::Error> {
    Ok(RepaymentEvent {
        repayment_id: RepaymentId::new(row.try_get::<String, _>("repayment_id")?),
        loan_id: LoanId::new(row.try_get::<String, _>("loan_id")?),
        payment_date: date_col(row, "payment_date")?,
        amount: decimal_col(row, "payment_amount")?,
        allocation: Allocation {
            principal: decimal_col(row, "principal_paid")?,
            interest: decimal_col(row, "interest_paid")?,
            fees: decimal_col(row, "fees_paid")?,
            penalty: decimal_col(row, "penalty_paid")?,
        },
        payment_method: row.try_get("payment_method")?,
        is_reversed: row.try_get("is_reversed")?,
        is_backdated: row.try_get("is_backdated")?,
    })
}

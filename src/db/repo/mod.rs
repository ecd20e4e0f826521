//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `customers.rs` - Customer upserts and lookups
//! - `loans.rs` - Loan and schedule operations
//! - `repayments.rs` - Repayment upserts and queries
//! - `derived.rs` - Derived loan state reads and atomic writes
//! - `sync_state.rs` - Incremental sync high-water marks

mod customers;
mod derived;
mod loans;
mod repayments;
mod sync_state;

pub use repayments::UpsertOutcome;

use crate::domain::primitives::parse_date;
use crate::domain::{Decimal, Officer, OfficerId};
use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::fmt::Display;

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cheap round trip used by readiness checks.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Officer operations
    // =========================================================================

    /// Insert or update an officer.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_officer(&self, officer: &Officer) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO officers (officer_id, name, branch, region, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(officer_id) DO UPDATE SET
                name = excluded.name,
                branch = excluded.branch,
                region = excluded.region,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(officer.officer_id.as_str())
        .bind(&officer.name)
        .bind(officer.branch.as_deref())
        .bind(officer.region.as_deref())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_officer(&self, officer_id: &OfficerId) -> Result<Option<Officer>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT officer_id, name, branch, region FROM officers WHERE officer_id = ?",
        )
        .bind(officer_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Officer {
            officer_id: OfficerId::new(r.get::<String, _>("officer_id")),
            name: r.get("name"),
            branch: r.get("branch"),
            region: r.get("region"),
        }))
    }
}

// =============================================================================
// Column decoding
// =============================================================================

fn decode_error(column: &str, value: &str, err: impl Display) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: format!("invalid value '{}': {}", value, err).into(),
    }
}

pub(crate) fn decimal_col(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str_canonical(&raw).map_err(|e| decode_error(column, &raw, e))
}

pub(crate) fn opt_decimal_col(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<Decimal>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| Decimal::from_str_canonical(&s).map_err(|e| decode_error(column, &s, e)))
        .transpose()
}

pub(crate) fn date_col(row: &SqliteRow, column: &'static str) -> Result<NaiveDate, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    parse_date(column, &raw).map_err(|e| decode_error(column, &raw, e))
}

pub(crate) fn opt_date_col(
    row: &SqliteRow,
    column: &'static str,
) -> Result<Option<NaiveDate>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| parse_date(column, &s).map_err(|e| decode_error(column, &s, e)))
        .transpose()
}

pub(crate) fn parsed_col<T>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr,
    T::Err: Display,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e| decode_error(column, &raw, e))
}

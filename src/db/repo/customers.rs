//! Customer operations for the repository.

use crate::domain::primitives::format_date;
use crate::domain::{Customer, CustomerId};
use sqlx::Row;

use super::{opt_date_col, Repository};

impl Repository {
    /// Insert or update a customer.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_customer(&self, customer: &Customer) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO customers (
                customer_id, name, phone, email, date_of_birth, state, lga, kyc_status,
                updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(customer_id) DO UPDATE SET
                name = excluded.name,
                phone = excluded.phone,
                email = excluded.email,
                date_of_birth = excluded.date_of_birth,
                state = excluded.state,
                lga = excluded.lga,
                kyc_status = excluded.kyc_status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(customer.customer_id.as_str())
        .bind(&customer.name)
        .bind(customer.phone.as_deref())
        .bind(customer.email.as_deref())
        .bind(customer.date_of_birth.map(format_date))
        .bind(customer.state.as_deref())
        .bind(customer.lga.as_deref())
        .bind(customer.kyc_status.as_deref())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<Customer>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT customer_id, name, phone, email, date_of_birth, state, lga, kyc_status
            FROM customers
            WHERE customer_id = ?
            "#,
        )
        .bind(customer_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<Customer, sqlx::Error> {
            Ok(Customer {
                customer_id: CustomerId::new(r.try_get::<String, _>("customer_id")?),
                name: r.try_get("name")?,
                phone: r.try_get("phone")?,
                email: r.try_get("email")?,
                date_of_birth: opt_date_col(&r, "date_of_birth")?,
                state: r.try_get("state")?,
                lga: r.try_get("lga")?,
                kyc_status: r.try_get("kyc_status")?,
            })
        })
        .transpose()
    }

    pub async fn customer_exists(&self, customer_id: &CustomerId) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM customers WHERE customer_id = ?")
            .bind(customer_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

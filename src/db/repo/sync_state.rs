//! Incremental sync high-water marks.

use sqlx::Row;

use super::Repository;

impl Repository {
    /// Stored mark for a named sync stream.
    pub async fn get_sync_mark(&self, name: &str) -> Result<Option<i64>, sqlx::Error> {
        let row = sqlx::query("SELECT last_id_synced FROM sync_state WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("last_id_synced")))
    }

    /// Set the mark. Never moves it backwards.
    pub async fn advance_sync_mark(&self, name: &str, last_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO sync_state (name, last_id_synced, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                last_id_synced = MAX(last_id_synced, excluded.last_id_synced),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(last_id)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::repo::test_support::setup_test_db;

    #[tokio::test]
    async fn test_sync_mark_only_moves_forward() {
        let (repo, _dir) = setup_test_db().await;
        assert_eq!(repo.get_sync_mark("repayments").await.unwrap(), None);

        repo.advance_sync_mark("repayments", 40).await.unwrap();
        repo.advance_sync_mark("repayments", 25).await.unwrap();
        assert_eq!(repo.get_sync_mark("repayments").await.unwrap(), Some(40));

        repo.advance_sync_mark("repayments", 41).await.unwrap();
        assert_eq!(repo.get_sync_mark("repayments").await.unwrap(), Some(41));
        assert_eq!(repo.get_sync_mark("loans").await.unwrap(), None);
    }
}

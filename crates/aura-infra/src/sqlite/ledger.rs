//! SQLite processed-interaction ledger.

use chrono::Utc;
use sqlx::Row;

use aura_core::repository::ledger::InteractionLedger;
use aura_types::error::RepositoryError;
use aura_types::ledger::{LedgerEntry, ProcessedStatus};

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of `InteractionLedger`.
#[derive(Clone)]
pub struct SqliteInteractionLedger {
    pool: DatabasePool,
}

impl SqliteInteractionLedger {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    // Reads go through the writer so a caller sees its own update.
    async fn fetch_entry(&self, uri: &str, pool: &sqlx::SqlitePool) -> Result<Option<LedgerEntry>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM processed_interactions WHERE uri = ?")
            .bind(uri)
            .fetch_optional(pool)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let entry_row = LedgerRow::from_row(&row).map_err(query_error)?;
                Ok(Some(entry_row.into_entry()?))
            }
            None => Ok(None),
        }
    }
}

struct LedgerRow {
    uri: String,
    status: Option<String>,
    attempts: i64,
    last_error: Option<String>,
    updated_at: String,
}

impl LedgerRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            uri: row.try_get("uri")?,
            status: row.try_get("status")?,
            attempts: row.try_get("attempts")?,
            last_error: row.try_get("last_error")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_entry(self) -> Result<LedgerEntry, RepositoryError> {
        let status = self
            .status
            .map(|s| s.parse::<ProcessedStatus>())
            .transpose()
            .map_err(RepositoryError::Query)?;
        Ok(LedgerEntry {
            uri: self.uri,
            status,
            attempts: u32::try_from(self.attempts).unwrap_or(u32::MAX),
            last_error: self.last_error,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

impl InteractionLedger for SqliteInteractionLedger {
    async fn get_entry(&self, uri: &str) -> Result<Option<LedgerEntry>, RepositoryError> {
        self.fetch_entry(uri, &self.pool.reader).await
    }

    async fn mark_handled(&self, uri: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO processed_interactions (uri, status, attempts, last_error, updated_at)
               VALUES (?, 'handled', 0, NULL, ?)
               ON CONFLICT(uri) DO UPDATE SET
                   status = 'handled',
                   updated_at = excluded.updated_at"#,
        )
        .bind(uri)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn record_failure(&self, uri: &str, error: &str, max_attempts: u32) -> Result<LedgerEntry, RepositoryError> {
        let max_attempts = i64::from(max_attempts.max(1));
        sqlx::query(
            r#"INSERT INTO processed_interactions (uri, status, attempts, last_error, updated_at)
               VALUES (?1, CASE WHEN 1 >= ?2 THEN 'failed' END, 1, ?3, ?4)
               ON CONFLICT(uri) DO UPDATE SET
                   attempts = processed_interactions.attempts + 1,
                   status = CASE WHEN processed_interactions.attempts + 1 >= ?2 THEN 'failed' END,
                   last_error = excluded.last_error,
                   updated_at = excluded.updated_at
               WHERE processed_interactions.status IS NULL"#,
        )
        .bind(uri)
        .bind(max_attempts)
        .bind(error)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        self.fetch_entry(uri, &self.pool.writer)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn count_by_status(&self, status: ProcessedStatus) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM processed_interactions WHERE status = ?")
            .bind(status.to_string())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_pool;

    const URI: &str = "at://did:plc:alice/app.bsky.feed.post/1";

    #[tokio::test]
    async fn test_mark_handled_is_idempotent() {
        let ledger = SqliteInteractionLedger::new(test_pool().await);
        assert!(ledger.get_entry(URI).await.unwrap().is_none());

        ledger.mark_handled(URI).await.unwrap();
        ledger.mark_handled(URI).await.unwrap();

        let entry = ledger.get_entry(URI).await.unwrap().unwrap();
        assert_eq!(entry.status, Some(ProcessedStatus::Handled));
        assert_eq!(ledger.count_by_status(ProcessedStatus::Handled).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failures_settle_after_budget() {
        let ledger = SqliteInteractionLedger::new(test_pool().await);

        let first = ledger.record_failure(URI, "timeout", 3).await.unwrap();
        assert_eq!(first.attempts, 1);
        assert!(!first.is_settled());

        let second = ledger.record_failure(URI, "timeout again", 3).await.unwrap();
        assert_eq!(second.attempts, 2);
        assert_eq!(second.last_error.as_deref(), Some("timeout again"));
        assert!(!second.is_settled());

        let third = ledger.record_failure(URI, "still down", 3).await.unwrap();
        assert_eq!(third.attempts, 3);
        assert_eq!(third.status, Some(ProcessedStatus::Failed));

        // Settled entries are not touched again.
        let after = ledger.record_failure(URI, "late", 3).await.unwrap();
        assert_eq!(after.attempts, 3);
        assert_eq!(after.last_error.as_deref(), Some("still down"));
        assert_eq!(ledger.count_by_status(ProcessedStatus::Failed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retry_success_marks_handled() {
        let ledger = SqliteInteractionLedger::new(test_pool().await);
        ledger.record_failure(URI, "timeout", 3).await.unwrap();
        ledger.mark_handled(URI).await.unwrap();

        let entry = ledger.get_entry(URI).await.unwrap().unwrap();
        assert_eq!(entry.status, Some(ProcessedStatus::Handled));
        assert_eq!(entry.attempts, 1);
    }

    #[tokio::test]
    async fn test_single_attempt_budget_fails_immediately() {
        let ledger = SqliteInteractionLedger::new(test_pool().await);
        let entry = ledger.record_failure(URI, "boom", 1).await.unwrap();
        assert_eq!(entry.status, Some(ProcessedStatus::Failed));
    }
}

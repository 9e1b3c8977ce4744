//! SQLite conversation state repository.

use sqlx::Row;

use aura_core::repository::conversation::ConversationRepository;
use aura_types::conversation::ConversationState;
use aura_types::error::RepositoryError;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of `ConversationRepository`.
#[derive(Clone)]
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct ConversationStateRow {
    thread_root_uri: String,
    streak_count: i64,
    stopped: i64,
    updated_at: String,
}

impl ConversationStateRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            thread_root_uri: row.try_get("thread_root_uri")?,
            streak_count: row.try_get("streak_count")?,
            stopped: row.try_get("stopped")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_state(self) -> Result<ConversationState, RepositoryError> {
        let streak_count = u32::try_from(self.streak_count).map_err(|_| {
            RepositoryError::Query(format!("invalid streak count: {}", self.streak_count))
        })?;
        Ok(ConversationState {
            thread_root_uri: self.thread_root_uri,
            streak_count,
            stopped: self.stopped != 0,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

impl ConversationRepository for SqliteConversationRepository {
    async fn get_state(&self, thread_root_uri: &str) -> Result<Option<ConversationState>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversation_states WHERE thread_root_uri = ?")
            .bind(thread_root_uri)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let state_row = ConversationStateRow::from_row(&row).map_err(query_error)?;
                Ok(Some(state_row.into_state()?))
            }
            None => Ok(None),
        }
    }

    async fn save_state(&self, state: &ConversationState) -> Result<(), RepositoryError> {
        // A stopped thread stays stopped even if a stale copy is written later.
        sqlx::query(
            r#"INSERT INTO conversation_states (thread_root_uri, streak_count, stopped, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(thread_root_uri) DO UPDATE SET
                   streak_count = excluded.streak_count,
                   stopped = MAX(conversation_states.stopped, excluded.stopped),
                   updated_at = excluded.updated_at"#,
        )
        .bind(&state.thread_root_uri)
        .bind(i64::from(state.streak_count))
        .bind(state.stopped as i64)
        .bind(format_datetime(&state.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn count_stopped(&self) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversation_states WHERE stopped = 1")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(query_error)?;
        Ok(count)
    }
}

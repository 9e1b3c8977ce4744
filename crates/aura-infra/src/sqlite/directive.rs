//! SQLite directive log.

use chrono::Utc;
use sqlx::Row;

use aura_core::repository::directive::DirectiveRepository;
use aura_types::error::RepositoryError;
use aura_types::memory::Directive;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of `DirectiveRepository`.
#[derive(Clone)]
pub struct SqliteDirectiveRepository {
    pool: DatabasePool,
}

impl SqliteDirectiveRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct DirectiveRow {
    id: i64,
    instruction: String,
    author_did: String,
    created_at: String,
}

impl DirectiveRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            instruction: row.try_get("instruction")?,
            author_did: row.try_get("author_did")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_directive(self) -> Result<Directive, RepositoryError> {
        Ok(Directive {
            id: self.id,
            instruction: self.instruction,
            author_did: self.author_did,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

impl DirectiveRepository for SqliteDirectiveRepository {
    async fn append_directive(&self, instruction: &str, author_did: &str) -> Result<Directive, RepositoryError> {
        let created_at = Utc::now();
        let result = sqlx::query("INSERT INTO directives (instruction, author_did, created_at) VALUES (?, ?, ?)")
            .bind(instruction)
            .bind(author_did)
            .bind(format_datetime(&created_at))
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(Directive {
            id: result.last_insert_rowid(),
            instruction: instruction.to_string(),
            author_did: author_did.to_string(),
            created_at,
        })
    }

    async fn list_directives(&self) -> Result<Vec<Directive>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM directives ORDER BY id")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut directives = Vec::with_capacity(rows.len());
        for row in &rows {
            let directive_row = DirectiveRow::from_row(row).map_err(query_error)?;
            directives.push(directive_row.into_directive()?);
        }
        Ok(directives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::test_pool;

    #[tokio::test]
    async fn test_directives_append_in_order() {
        let repo = SqliteDirectiveRepository::new(test_pool().await);
        assert!(repo.list_directives().await.unwrap().is_empty());

        let first = repo.append_directive("be more formal", "did:plc:admin").await.unwrap();
        let second = repo.append_directive("talk about kites", "did:plc:admin").await.unwrap();
        assert!(second.id > first.id);

        let log = repo.list_directives().await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].instruction, "be more formal");
        assert_eq!(log[1].instruction, "talk about kites");
        assert_eq!(log[1].author_did, "did:plc:admin");
    }
}

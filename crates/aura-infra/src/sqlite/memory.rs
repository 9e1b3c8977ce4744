//! SQLite memory repository implementation.
//!
//! Implements `MemoryRepository` from `aura-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, reads on the reader
//! pool and writes on the single writer connection.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::Row;

use aura_core::repository::memory::{MemoryRepository, MemoryStats};
use aura_types::error::RepositoryError;
use aura_types::memory::{
    GeneralKnowledge, MemoryCatalogue, MemoryWriteBack, PostHistory, SubjectKey,
    SummarizedKnowledge, UserMemory, format_tags, normalize_key, parse_tags,
};

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// Rows scanned when collecting the tag catalogue.
const TAG_SCAN_ROWS: i64 = 500;

/// SQLite-backed implementation of `MemoryRepository`.
#[derive(Clone)]
pub struct SqliteMemoryRepository {
    pool: DatabasePool,
}

impl SqliteMemoryRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct UserMemoryRow {
    user_handle: String,
    memory_key: String,
    value: String,
    updated_at: String,
}

impl UserMemoryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_handle: row.try_get("user_handle")?,
            memory_key: row.try_get("memory_key")?,
            value: row.try_get("value")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_memory(self) -> Result<UserMemory, RepositoryError> {
        Ok(UserMemory {
            user_handle: self.user_handle,
            key: self.memory_key,
            value: self.value,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct KnowledgeRow {
    id: i64,
    topic: String,
    tags: String,
    content: String,
    created_at: String,
}

impl KnowledgeRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            topic: row.try_get("topic")?,
            tags: row.try_get("tags")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_knowledge(self) -> Result<GeneralKnowledge, RepositoryError> {
        Ok(GeneralKnowledge {
            id: self.id,
            topic: self.topic,
            tags: parse_tags(&self.tags),
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

struct PostHistoryRow {
    post_uri: String,
    thread_root_uri: String,
    author_handle: String,
    text: String,
    timestamp: String,
}

impl PostHistoryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            post_uri: row.try_get("post_uri")?,
            thread_root_uri: row.try_get("thread_root_uri")?,
            author_handle: row.try_get("author_handle")?,
            text: row.try_get("text")?,
            timestamp: row.try_get("timestamp")?,
        })
    }

    fn into_post(self) -> Result<PostHistory, RepositoryError> {
        Ok(PostHistory {
            post_uri: self.post_uri,
            thread_root_uri: self.thread_root_uri,
            author_handle: self.author_handle,
            text: self.text,
            timestamp: parse_datetime(&self.timestamp)?,
        })
    }
}

fn knowledge_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<GeneralKnowledge>, RepositoryError> {
    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let knowledge_row = KnowledgeRow::from_row(row).map_err(query_error)?;
        items.push(knowledge_row.into_knowledge()?);
    }
    Ok(items)
}

/// `LIKE` pattern matching `term` anywhere, with wildcards escaped.
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

// ---------------------------------------------------------------------------
// MemoryRepository implementation
// ---------------------------------------------------------------------------

impl MemoryRepository for SqliteMemoryRepository {
    async fn get_user_memory(&self, handle: &str) -> Result<Vec<UserMemory>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM user_memories WHERE user_handle = ? ORDER BY memory_key")
            .bind(handle)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let mut memories = Vec::with_capacity(rows.len());
        for row in &rows {
            let memory_row = UserMemoryRow::from_row(row).map_err(query_error)?;
            memories.push(memory_row.into_memory()?);
        }
        Ok(memories)
    }

    async fn put_user_memory(&self, handle: &str, key: &str, value: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO user_memories (user_handle, memory_key, value, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(user_handle, memory_key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at"#,
        )
        .bind(handle)
        .bind(normalize_key(key))
        .bind(value)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn query_general_knowledge(
        &self,
        terms: &[String],
        limit: i64,
    ) -> Result<Vec<GeneralKnowledge>, RepositoryError> {
        let terms: Vec<&str> = terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let clause = "(lower(topic) LIKE ? ESCAPE '\\' OR lower(content) LIKE ? ESCAPE '\\' OR lower(tags) LIKE ? ESCAPE '\\')";
        let sql = format!(
            "SELECT * FROM general_knowledge WHERE {} ORDER BY created_at DESC, id DESC LIMIT ?",
            vec![clause; terms.len()].join(" OR ")
        );

        let mut query = sqlx::query(&sql);
        for term in &terms {
            let pattern = contains_pattern(term);
            query = query.bind(pattern.clone()).bind(pattern.clone()).bind(pattern);
        }
        let rows = query
            .bind(limit)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        knowledge_rows(&rows)
    }

    async fn recent_knowledge(&self, limit: i64) -> Result<Vec<GeneralKnowledge>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM general_knowledge ORDER BY created_at DESC, id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        knowledge_rows(&rows)
    }

    async fn knowledge_exists(&self, content: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT EXISTS(
                   SELECT 1 FROM general_knowledge
                   WHERE content = ? OR substr(content, 1, 100) = substr(?, 1, 100)
               ) AS found"#,
        )
        .bind(content)
        .bind(content)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let found: i64 = row.try_get("found").map_err(query_error)?;
        Ok(found != 0)
    }

    async fn append_post_history(&self, record: &PostHistory) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO post_history (post_uri, thread_root_uri, author_handle, text, timestamp)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(post_uri) DO NOTHING"#,
        )
        .bind(&record.post_uri)
        .bind(&record.thread_root_uri)
        .bind(&record.author_handle)
        .bind(&record.text)
        .bind(format_datetime(&record.timestamp))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn posts_by_author(&self, handle: &str, limit: i64) -> Result<Vec<PostHistory>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM post_history WHERE author_handle = ? ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(handle)
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in &rows {
            let post_row = PostHistoryRow::from_row(row).map_err(query_error)?;
            posts.push(post_row.into_post()?);
        }
        Ok(posts)
    }

    async fn active_authors(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<String>, RepositoryError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"SELECT author_handle FROM post_history
               WHERE timestamp >= ?
               GROUP BY author_handle
               ORDER BY COUNT(*) DESC, author_handle
               LIMIT ?"#,
        )
        .bind(format_datetime(&since))
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        Ok(rows.into_iter().map(|(handle,)| handle).collect())
    }

    async fn get_summary(&self, subject: &SubjectKey) -> Result<Option<SummarizedKnowledge>, RepositoryError> {
        let row = sqlx::query("SELECT summary_text, generated_at FROM summarized_knowledge WHERE subject_key = ?")
            .bind(subject.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let summary_text: String = row.try_get("summary_text").map_err(query_error)?;
        let generated_at: String = row.try_get("generated_at").map_err(query_error)?;
        Ok(Some(SummarizedKnowledge {
            subject_key: subject.clone(),
            summary_text,
            generated_at: parse_datetime(&generated_at)?,
        }))
    }

    async fn put_summary(&self, summary: &SummarizedKnowledge) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO summarized_knowledge (subject_key, summary_text, generated_at)
               VALUES (?, ?, ?)
               ON CONFLICT(subject_key) DO UPDATE SET
                   summary_text = excluded.summary_text,
                   generated_at = excluded.generated_at"#,
        )
        .bind(summary.subject_key.to_string())
        .bind(&summary.summary_text)
        .bind(format_datetime(&summary.generated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn catalogue(&self, participants_since: DateTime<Utc>, cap: i64) -> Result<MemoryCatalogue, RepositoryError> {
        let users: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT user_handle FROM user_memories ORDER BY user_handle LIMIT ?")
                .bind(cap)
                .fetch_all(&self.pool.reader)
                .await
                .map_err(query_error)?;

        let topics: Vec<(String,)> =
            sqlx::query_as("SELECT DISTINCT topic FROM general_knowledge ORDER BY topic LIMIT ?")
                .bind(cap)
                .fetch_all(&self.pool.reader)
                .await
                .map_err(query_error)?;

        let tag_rows: Vec<(String,)> =
            sqlx::query_as("SELECT tags FROM general_knowledge ORDER BY created_at DESC LIMIT ?")
                .bind(TAG_SCAN_ROWS)
                .fetch_all(&self.pool.reader)
                .await
                .map_err(query_error)?;
        let tags: BTreeSet<String> = tag_rows.iter().flat_map(|(raw,)| parse_tags(raw)).collect();

        let participants: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT author_handle FROM post_history WHERE timestamp >= ? ORDER BY author_handle LIMIT ?",
        )
        .bind(format_datetime(&participants_since))
        .bind(cap)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        Ok(MemoryCatalogue {
            user_handles: users.into_iter().map(|(h,)| h).collect(),
            knowledge_topics: topics.into_iter().map(|(t,)| t).collect(),
            tags: tags.into_iter().take(cap.max(0) as usize).collect(),
            recent_participants: participants.into_iter().map(|(h,)| h).collect(),
        })
    }

    async fn apply_write_back(&self, batch: &MemoryWriteBack) -> Result<(), RepositoryError> {
        let now = format_datetime(&Utc::now());
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        for (key, value) in &batch.user_facts {
            sqlx::query(
                r#"INSERT INTO user_memories (user_handle, memory_key, value, updated_at)
                   VALUES (?, ?, ?, ?)
                   ON CONFLICT(user_handle, memory_key) DO UPDATE SET
                       value = excluded.value,
                       updated_at = excluded.updated_at"#,
            )
            .bind(&batch.owner_handle)
            .bind(normalize_key(key))
            .bind(value)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;
        }

        for item in &batch.knowledge {
            sqlx::query("INSERT INTO general_knowledge (topic, tags, content, created_at) VALUES (?, ?, ?, ?)")
                .bind(&item.topic)
                .bind(format_tags(&item.tags))
                .bind(&item.content)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(query_error)?;
        }

        tx.commit().await.map_err(query_error)?;
        Ok(())
    }

    async fn load_blocklist(&self) -> Result<Vec<String>, RepositoryError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT term FROM blocklist ORDER BY term")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;
        Ok(rows.into_iter().map(|(term,)| term).collect())
    }

    async fn stats(&self) -> Result<MemoryStats, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT
                   (SELECT COUNT(DISTINCT user_handle) FROM user_memories) AS users_with_memories,
                   (SELECT COUNT(*) FROM user_memories) AS user_memories,
                   (SELECT COUNT(*) FROM general_knowledge) AS knowledge_entries,
                   (SELECT COUNT(*) FROM post_history) AS posts_observed,
                   (SELECT COUNT(*) FROM summarized_knowledge) AS summaries"#,
        )
        .fetch_one(&self.pool.reader)
        .await
        .map_err(query_error)?;

        Ok(MemoryStats {
            users_with_memories: row.try_get("users_with_memories").map_err(query_error)?,
            user_memories: row.try_get("user_memories").map_err(query_error)?,
            knowledge_entries: row.try_get("knowledge_entries").map_err(query_error)?,
            posts_observed: row.try_get("posts_observed").map_err(query_error)?,
            summaries: row.try_get("summaries").map_err(query_error)?,
        })
    }
}

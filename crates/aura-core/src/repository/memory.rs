//! MemoryRepository trait definition.
//!
//! Persistence for user facts, general knowledge, the post history log,
//! derived summaries, and the blocklist. Ownership checks happen in
//! [`crate::memory::service::MemoryService`]; the repository trusts its caller.

use chrono::{DateTime, Utc};

use aura_types::error::RepositoryError;
use aura_types::memory::{
    GeneralKnowledge, MemoryCatalogue, MemoryWriteBack, PostHistory, SubjectKey,
    SummarizedKnowledge, UserMemory,
};

/// Row counts shown by `aura status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub users_with_memories: i64,
    pub user_memories: i64,
    pub knowledge_entries: i64,
    pub posts_observed: i64,
    pub summaries: i64,
}

pub trait MemoryRepository: Send + Sync {
    /// All facts stored for a handle, ordered by key.
    fn get_user_memory(
        &self,
        handle: &str,
    ) -> impl std::future::Future<Output = Result<Vec<UserMemory>, RepositoryError>> + Send;

    /// Insert or replace the value for `(handle, key)`.
    fn put_user_memory(
        &self,
        handle: &str,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Knowledge whose topic, content, or tags contain any of `terms`,
    /// most recent first.
    fn query_general_knowledge(
        &self,
        terms: &[String],
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<GeneralKnowledge>, RepositoryError>> + Send;

    /// Most recent knowledge regardless of topic.
    fn recent_knowledge(
        &self,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<GeneralKnowledge>, RepositoryError>> + Send;

    /// Whether a knowledge entry with the same content, or the same first
    /// 100 characters, already exists.
    fn knowledge_exists(
        &self,
        content: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Append to the post log. Returns `false` if the URI was already present.
    fn append_post_history(
        &self,
        record: &PostHistory,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Latest posts by an author, newest first.
    fn posts_by_author(
        &self,
        handle: &str,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<PostHistory>, RepositoryError>> + Send;

    /// Authors with at least one post since `since`, most active first.
    fn active_authors(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;

    fn get_summary(
        &self,
        subject: &SubjectKey,
    ) -> impl std::future::Future<Output = Result<Option<SummarizedKnowledge>, RepositoryError>> + Send;

    /// Insert or replace the summary for its subject.
    fn put_summary(
        &self,
        summary: &SummarizedKnowledge,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Names of available memory blocks; participants are those seen since
    /// `participants_since`. Each list holds at most `cap` entries.
    fn catalogue(
        &self,
        participants_since: DateTime<Utc>,
        cap: i64,
    ) -> impl std::future::Future<Output = Result<MemoryCatalogue, RepositoryError>> + Send;

    /// Apply every fact of one interaction in a single transaction.
    fn apply_write_back(
        &self,
        batch: &MemoryWriteBack,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn load_blocklist(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;

    fn stats(&self) -> impl std::future::Future<Output = Result<MemoryStats, RepositoryError>> + Send;
}

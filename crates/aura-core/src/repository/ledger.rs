//! InteractionLedger trait definition.

use aura_types::error::RepositoryError;
use aura_types::ledger::{LedgerEntry, ProcessedStatus};

/// Persistent record of processed interactions.
pub trait InteractionLedger: Send + Sync {
    fn get_entry(
        &self,
        uri: &str,
    ) -> impl std::future::Future<Output = Result<Option<LedgerEntry>, RepositoryError>> + Send;

    /// Settle an interaction as handled. Idempotent.
    fn mark_handled(
        &self,
        uri: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Count one failed attempt. Once `max_attempts` is reached the entry is
    /// settled as failed. Returns the updated entry.
    fn record_failure(
        &self,
        uri: &str,
        error: &str,
        max_attempts: u32,
    ) -> impl std::future::Future<Output = Result<LedgerEntry, RepositoryError>> + Send;

    fn count_by_status(
        &self,
        status: ProcessedStatus,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}

//! ConversationRepository trait definition.

use aura_types::conversation::ConversationState;
use aura_types::error::RepositoryError;

pub trait ConversationRepository: Send + Sync {
    fn get_state(
        &self,
        thread_root_uri: &str,
    ) -> impl std::future::Future<Output = Result<Option<ConversationState>, RepositoryError>> + Send;

    /// Insert or replace the state for its thread.
    fn save_state(
        &self,
        state: &ConversationState,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn count_stopped(&self) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;
}

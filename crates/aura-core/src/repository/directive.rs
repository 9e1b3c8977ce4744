//! DirectiveRepository trait definition.

use aura_types::error::RepositoryError;
use aura_types::memory::Directive;

/// Append-only log of admin directives.
pub trait DirectiveRepository: Send + Sync {
    /// Append a directive. Prior entries are never modified.
    fn append_directive(
        &self,
        instruction: &str,
        author_did: &str,
    ) -> impl std::future::Future<Output = Result<Directive, RepositoryError>> + Send;

    /// The whole log, oldest first.
    fn list_directives(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Directive>, RepositoryError>> + Send;
}

//! Blocked-term screening for generated and stored text.

use aura_types::error::RepositoryError;

use crate::repository::memory::MemoryRepository;

/// Terms seeded into a fresh store.
pub const DEFAULT_TERMS: &[&str] = &[
    "kill",
    "die",
    "suicide",
    "hurt",
    "attack",
    "nazi",
    "fascist",
    "racist",
    "slur",
    "murder",
    "bomb",
    "terrorist",
    "extremist",
    "radical",
    "genocide",
    "holocaust",
    "rape",
    "sexual assault",
    "abuse",
    "torture",
    "weapon",
    "drug",
];

/// Case-insensitive substring matcher over a fixed term set.
///
/// Loaded once at startup; the set never changes while the agent runs.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    terms: Vec<String>,
}

impl Blocklist {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        terms.sort();
        terms.dedup();
        Self { terms }
    }

    pub async fn load<R: MemoryRepository>(repo: &R) -> Result<Self, RepositoryError> {
        let blocklist = Self::new(repo.load_blocklist().await?);
        tracing::info!(terms = blocklist.len(), "Loaded blocklist");
        Ok(blocklist)
    }

    /// First blocked term contained in `text`, if any.
    pub fn find(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.terms
            .iter()
            .find(|term| lowered.contains(term.as_str()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

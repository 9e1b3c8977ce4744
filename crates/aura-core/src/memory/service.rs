//! Memory service: the policy layer over [`MemoryRepository`].
//!
//! Enforces ownership of user memory, keeps blocklisted text out of the
//! store, and maintains the summary cache.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use aura_types::error::AgentError;
use aura_types::memory::{
    GeneralKnowledge, MemoryCatalogue, MemoryWriteBack, PostHistory, SubjectKey,
    SummarizedKnowledge, normalize_key,
};

use super::extractor::ExtractedFact;
use super::summarizer::SubjectSummarizer;
use crate::llm::client::ModelClient;
use crate::pipeline::blocklist::Blocklist;
use crate::repository::memory::MemoryRepository;

/// General facts shorter than this are not worth storing.
const MIN_KNOWLEDGE_CHARS: usize = 20;
/// Posts per user fed to a summary.
const SUMMARY_POSTS: i64 = 5;
/// Knowledge entries per topic fed to a summary.
const SUMMARY_KNOWLEDGE: i64 = 10;
/// Entries per catalogue list.
const CATALOGUE_CAP: i64 = 100;
/// How far back "recent participants" reaches.
const PARTICIPANT_WINDOW_DAYS: i64 = 7;

pub struct MemoryService<R: MemoryRepository> {
    repo: R,
    client: ModelClient,
    blocklist: Blocklist,
}

impl<R: MemoryRepository> MemoryService<R> {
    pub fn new(repo: R, client: ModelClient, blocklist: Blocklist) -> Self {
        Self {
            repo,
            client,
            blocklist,
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub async fn get_user_memory(&self, handle: &str) -> Result<BTreeMap<String, String>, AgentError> {
        Ok(self
            .repo
            .get_user_memory(handle)
            .await?
            .into_iter()
            .map(|m| (m.key, m.value))
            .collect())
    }

    /// Write one fact into `handle`'s memory on behalf of `writer`.
    ///
    /// Only the owner may write: any other writer gets `PermissionDenied`.
    pub async fn put_user_memory(
        &self,
        writer: &str,
        handle: &str,
        key: &str,
        value: &str,
    ) -> Result<(), AgentError> {
        check_owner(writer, handle)?;
        if let Some(term) = self.blocklist.find(value) {
            return Err(AgentError::BlocklistViolation { term: term.to_string() });
        }
        self.repo.put_user_memory(handle, &normalize_key(key), value).await?;
        Ok(())
    }

    pub async fn query_general_knowledge(
        &self,
        terms: &[String],
        limit: i64,
    ) -> Result<Vec<GeneralKnowledge>, AgentError> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.repo.query_general_knowledge(terms, limit).await?)
    }

    /// Record an observed post. Returns `false` when the post was already
    /// logged or was withheld because it contains a blocked term.
    pub async fn append_post_history(&self, record: &PostHistory) -> Result<bool, AgentError> {
        if let Some(term) = self.blocklist.find(&record.text) {
            tracing::info!(uri = %record.post_uri, term, "Post contains blocked term; not logging");
            return Ok(false);
        }
        Ok(self.repo.append_post_history(record).await?)
    }

    pub async fn catalogue(&self) -> Result<MemoryCatalogue, AgentError> {
        let since = Utc::now() - chrono::Duration::days(PARTICIPANT_WINDOW_DAYS);
        Ok(self.repo.catalogue(since, CATALOGUE_CAP).await?)
    }

    /// Whatever summary is cached, however old. Never calls the model.
    pub async fn cached_summary(&self, subject: &SubjectKey) -> Result<Option<SummarizedKnowledge>, AgentError> {
        Ok(self.repo.get_summary(subject).await?)
    }

    /// Cached summary if younger than `max_age`, otherwise a fresh one.
    ///
    /// The cache is eventually consistent: when regeneration fails the stale
    /// summary is returned rather than nothing.
    pub async fn get_or_refresh_summary(
        &self,
        subject: &SubjectKey,
        max_age: Duration,
    ) -> Result<Option<SummarizedKnowledge>, AgentError> {
        let cached = self.repo.get_summary(subject).await?;
        if let Some(summary) = &cached {
            if is_fresh(summary.generated_at, max_age) {
                return Ok(cached);
            }
        }

        match self.refresh_summary(subject).await {
            Ok(Some(fresh)) => Ok(Some(fresh)),
            Ok(None) => Ok(cached),
            Err(e) if e.is_external_call_failure() => {
                tracing::warn!(subject = %subject, error = %e, "Summary refresh failed; serving cached");
                Ok(cached)
            }
            Err(e) => Err(e),
        }
    }

    /// Regenerate and store a subject's summary unconditionally.
    pub async fn refresh_summary(&self, subject: &SubjectKey) -> Result<Option<SummarizedKnowledge>, AgentError> {
        let (posts, knowledge) = match subject {
            SubjectKey::User(handle) => (self.repo.posts_by_author(handle, SUMMARY_POSTS).await?, Vec::new()),
            SubjectKey::Topic(topic) => (
                Vec::new(),
                self.repo
                    .query_general_knowledge(std::slice::from_ref(topic), SUMMARY_KNOWLEDGE)
                    .await?,
            ),
        };

        let Some(text) = SubjectSummarizer::summarize(&self.client, subject, &posts, &knowledge).await? else {
            return Ok(None);
        };
        if let Some(term) = self.blocklist.find(&text) {
            tracing::warn!(subject = %subject, term, "Generated summary contains blocked term; discarding");
            return Ok(None);
        }

        let summary = SummarizedKnowledge {
            subject_key: subject.clone(),
            summary_text: text,
            generated_at: Utc::now(),
        };
        self.repo.put_summary(&summary).await?;
        Ok(Some(summary))
    }

    /// Regenerate summaries of users active since `since`. Failures are
    /// logged per user and do not stop the sweep. Returns how many were
    /// refreshed.
    #[tracing::instrument(name = "summarize_active_users", skip(self))]
    pub async fn refresh_active_users(&self, since: DateTime<Utc>, max_users: i64) -> Result<usize, AgentError> {
        let users = self.repo.active_authors(since, max_users).await?;
        let mut refreshed = 0;
        for handle in users {
            match self.refresh_summary(&SubjectKey::User(handle.clone())).await {
                Ok(Some(_)) => refreshed += 1,
                Ok(None) => {}
                Err(e) => tracing::warn!(user = %handle, error = %e, "Failed to refresh user summary"),
            }
        }
        tracing::info!(refreshed, "Summarization pass complete");
        Ok(refreshed)
    }

    /// Turn one interaction's extracted facts into a batch.
    ///
    /// Facts about anyone but `author` are dropped as `PermissionDenied`;
    /// short, duplicate, or blocklisted knowledge is dropped silently.
    pub async fn prepare_write_back(
        &self,
        author: &str,
        extracted: Vec<ExtractedFact>,
    ) -> Result<MemoryWriteBack, AgentError> {
        let mut batch = MemoryWriteBack::new(author);

        for fact in extracted {
            match fact {
                ExtractedFact::User { handle, key, value } => {
                    let subject = handle.as_deref().unwrap_or(author);
                    self.push_user_fact(&mut batch, author, subject, &key, &value);
                }
                ExtractedFact::General(item) => {
                    if item.content.chars().count() <= MIN_KNOWLEDGE_CHARS {
                        tracing::debug!(topic = %item.topic, "Knowledge too short; skipping");
                        continue;
                    }
                    if let Some(term) = self.blocklist.find(&item.content).or_else(|| self.blocklist.find(&item.topic)) {
                        tracing::info!(topic = %item.topic, term, "Knowledge contains blocked term; skipping");
                        continue;
                    }
                    let prefix: String = item.content.chars().take(100).collect();
                    let in_batch = batch
                        .knowledge
                        .iter()
                        .any(|k| k.content.chars().take(100).collect::<String>() == prefix);
                    if in_batch || self.repo.knowledge_exists(&item.content).await? {
                        tracing::debug!(topic = %item.topic, "Duplicate knowledge; skipping");
                        continue;
                    }
                    batch.knowledge.push(item);
                }
            }
        }
        Ok(batch)
    }

    /// Apply a batch atomically. Nothing is written if any row fails.
    pub async fn commit_write_back(&self, batch: &MemoryWriteBack) -> Result<(), AgentError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.repo.apply_write_back(batch).await?;
        tracing::info!(
            owner = %batch.owner_handle,
            user_facts = batch.user_facts.len(),
            knowledge = batch.knowledge.len(),
            "Memory write-back committed"
        );
        Ok(())
    }

    fn push_user_fact(&self, batch: &mut MemoryWriteBack, writer: &str, subject: &str, key: &str, value: &str) {
        if let Err(e) = check_owner(writer, subject) {
            tracing::warn!(error = %e, key, "Rejected user memory write");
            return;
        }
        if let Some(term) = self.blocklist.find(value) {
            tracing::info!(key, term, "User fact contains blocked term; skipping");
            return;
        }
        let key = normalize_key(key);
        batch.user_facts.retain(|(k, _)| *k != key);
        batch.user_facts.push((key, value.to_string()));
    }
}

fn check_owner(writer: &str, handle: &str) -> Result<(), AgentError> {
    if writer.eq_ignore_ascii_case(handle) {
        Ok(())
    } else {
        Err(AgentError::PermissionDenied(format!(
            "@{writer} cannot write memory owned by @{handle}"
        )))
    }
}

fn is_fresh(generated_at: DateTime<Utc>, max_age: Duration) -> bool {
    let age = Utc::now().signed_duration_since(generated_at);
    chrono::Duration::from_std(max_age).is_ok_and(|max| age < max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryStore, ScriptedProvider};
    use aura_types::memory::NewKnowledge;

    fn service(store: &InMemoryStore, provider: &ScriptedProvider) -> MemoryService<InMemoryStore> {
        MemoryService::new(store.clone(), provider.client(), Blocklist::new(["bomb"]))
    }

    fn knowledge(topic: &str, content: &str) -> ExtractedFact {
        ExtractedFact::General(NewKnowledge {
            topic: topic.into(),
            tags: Default::default(),
            content: content.into(),
        })
    }

    fn history(uri: &str, handle: &str, text: &str) -> PostHistory {
        PostHistory {
            post_uri: uri.into(),
            thread_root_uri: "at://root".into(),
            author_handle: handle.into(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_owner_writes_and_overwrites() {
        let store = InMemoryStore::new();
        let svc = service(&store, &ScriptedProvider::new(vec![]));
        svc.put_user_memory("alice.test", "alice.test", "Preference", "likes tea").await.unwrap();
        svc.put_user_memory("alice.test", "alice.test", "preference", "likes coffee").await.unwrap();
        let memory = svc.get_user_memory("alice.test").await.unwrap();
        assert_eq!(memory.len(), 1);
        assert_eq!(memory["preference"], "likes coffee");
    }

    #[tokio::test]
    async fn test_non_owner_write_rejected() {
        let store = InMemoryStore::new();
        let svc = service(&store, &ScriptedProvider::new(vec![]));
        svc.put_user_memory("alice.test", "alice.test", "preference", "likes tea").await.unwrap();
        let err = svc
            .put_user_memory("mallory.test", "alice.test", "preference", "likes nothing")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::PermissionDenied(_)));
        assert_eq!(svc.get_user_memory("alice.test").await.unwrap()["preference"], "likes tea");
    }

    #[tokio::test]
    async fn test_blocked_post_not_logged() {
        let store = InMemoryStore::new();
        let svc = service(&store, &ScriptedProvider::new(vec![]));
        assert!(!svc.append_post_history(&history("at://1", "bob.test", "a BOMB joke")).await.unwrap());
        assert!(svc.append_post_history(&history("at://2", "bob.test", "kites!")).await.unwrap());
        assert!(!svc.append_post_history(&history("at://2", "bob.test", "kites!")).await.unwrap());
        assert_eq!(store.posts().len(), 1);
    }

    #[tokio::test]
    async fn test_prepare_write_back_filters() {
        let store = InMemoryStore::new();
        store.insert_knowledge("kites", &[], "Kites were flown in China over two thousand years ago.", Utc::now());
        let svc = service(&store, &ScriptedProvider::new(vec![]));

        let extracted = vec![
            ExtractedFact::User {
                handle: Some("mallory.test".into()),
                key: "name".into(),
                value: "Mallory".into(),
            },
            ExtractedFact::User {
                handle: None,
                key: "Location".into(),
                value: "Oslo".into(),
            },
            knowledge("short", "too short"),
            knowledge("kites", "Kites were flown in China over two thousand years ago."),
            knowledge("bombs", "A bomb is not something we store facts about."),
            knowledge("wind", "Sea breezes reverse direction between day and night."),
        ];

        let batch = svc.prepare_write_back("alice.test", extracted).await.unwrap();
        assert_eq!(batch.owner_handle, "alice.test");
        assert_eq!(
            batch.user_facts,
            vec![("location".to_string(), "Oslo".to_string())]
        );
        assert_eq!(batch.knowledge.len(), 1);
        assert_eq!(batch.knowledge[0].topic, "wind");

        svc.commit_write_back(&batch).await.unwrap();
        assert_eq!(svc.get_user_memory("alice.test").await.unwrap().len(), 1);
        assert!(svc.get_user_memory("mallory.test").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_back_leaves_nothing() {
        let store = InMemoryStore::new();
        store.fail_write_back();
        let svc = service(&store, &ScriptedProvider::new(vec![]));
        let mut batch = MemoryWriteBack::new("alice.test");
        batch.user_facts.push(("preference".into(), "likes tea".into()));
        assert!(matches!(
            svc.commit_write_back(&batch).await,
            Err(AgentError::Storage(_))
        ));
        assert!(svc.get_user_memory("alice.test").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_cached_then_refreshed() {
        let store = InMemoryStore::new();
        store.append_post_history(&history("at://1", "bob.test", "I love box kites")).await.unwrap();
        let provider = ScriptedProvider::new(vec![Ok("Bob likes kites.".into()), Ok("Bob really likes kites.".into())]);
        let svc = service(&store, &provider);
        let subject = SubjectKey::User("bob.test".into());

        let first = svc.get_or_refresh_summary(&subject, Duration::from_secs(3600)).await.unwrap().unwrap();
        assert_eq!(first.summary_text, "Bob likes kites.");
        let cached = svc.get_or_refresh_summary(&subject, Duration::from_secs(3600)).await.unwrap().unwrap();
        assert_eq!(cached.summary_text, "Bob likes kites.");
        assert_eq!(provider.calls(), 1);

        let stale = svc.get_or_refresh_summary(&subject, Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(stale.summary_text, "Bob really likes kites.");
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_summary_failure_serves_stale() {
        let store = InMemoryStore::new();
        store.append_post_history(&history("at://1", "bob.test", "hello")).await.unwrap();
        let provider = ScriptedProvider::new(vec![Ok("Bob says hello.".into())]);
        let svc = service(&store, &provider);
        let subject = SubjectKey::User("bob.test".into());
        svc.refresh_summary(&subject).await.unwrap();

        // Script exhausted: the next model call fails permanently.
        let served = svc.get_or_refresh_summary(&subject, Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(served.summary_text, "Bob says hello.");
    }

    #[tokio::test]
    async fn test_refresh_active_users() {
        let store = InMemoryStore::new();
        store.append_post_history(&history("at://1", "bob.test", "kites")).await.unwrap();
        store.append_post_history(&history("at://2", "carol.test", "tea")).await.unwrap();
        let provider = ScriptedProvider::routed(&[("keep short notes", "A summary.")]);
        let svc = service(&store, &provider);
        let refreshed = svc
            .refresh_active_users(Utc::now() - chrono::Duration::hours(24), 10)
            .await
            .unwrap();
        assert_eq!(refreshed, 2);
    }
}

//! In-memory fakes shared by the unit tests of this crate.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use aura_types::conversation::ConversationState;
use aura_types::error::{RepositoryError, SocialError};
use aura_types::ledger::{LedgerEntry, ProcessedStatus};
use aura_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason, Usage,
};
use aura_types::memory::{
    Directive, GeneralKnowledge, MemoryCatalogue, MemoryWriteBack, PostHistory, SubjectKey,
    SummarizedKnowledge, UserMemory, normalize_key,
};
use aura_types::social::{Facet, Interaction, InteractionSource, NotificationReason, Post, PostRef, ReplyTarget};

use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::client::ModelClient;
use crate::llm::provider::LlmProvider;
use crate::repository::conversation::ConversationRepository;
use crate::repository::directive::DirectiveRepository;
use crate::repository::ledger::InteractionLedger;
use crate::repository::memory::{MemoryRepository, MemoryStats};
use crate::retry::RetryPolicy;
use crate::social::{BotIdentity, SocialClient};

// --- Model ---

struct ScriptState {
    queue: VecDeque<Result<String, LlmError>>,
    /// `(system prompt needle, response)` used once the queue is drained.
    rules: Vec<(String, String)>,
    requests: Vec<CompletionRequest>,
}

/// Mock provider that replays scripted responses in order.
#[derive(Clone)]
pub struct ScriptedProvider {
    state: Arc<Mutex<ScriptState>>,
    capabilities: ProviderCapabilities,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                queue: script.into(),
                rules: Vec::new(),
                requests: Vec::new(),
            })),
            capabilities: ProviderCapabilities {
                max_context_tokens: 128_000,
                max_output_tokens: 4_096,
            },
        }
    }

    /// Answer by matching a needle in the system prompt.
    pub fn routed(rules: &[(&str, &str)]) -> Self {
        let provider = Self::new(Vec::new());
        provider.state.lock().unwrap().rules = rules
            .iter()
            .map(|(needle, response)| (needle.to_string(), response.to_string()))
            .collect();
        provider
    }

    pub fn client(&self) -> ModelClient {
        ModelClient::new(
            Arc::new(BoxLlmProvider::new(self.clone())),
            "test-model",
            RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2)),
        )
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests whose system prompt contains `needle`.
    pub fn requests_matching(&self, needle: &str) -> Vec<CompletionRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.system.as_deref().is_some_and(|s| s.contains(needle)))
            .collect()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
        let result = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(request.clone());
            match state.queue.pop_front() {
                Some(result) => result,
                None => {
                    let system = request.system.clone().unwrap_or_default();
                    state
                        .rules
                        .iter()
                        .find(|(needle, _)| system.contains(needle.as_str()))
                        .map(|(_, response)| Ok(response.clone()))
                        .unwrap_or_else(|| {
                            Err(LlmError::InvalidRequest("script exhausted".to_string()))
                        })
                }
            }
        };
        async move {
            result.map(|content| CompletionResponse {
                id: "resp-test".to_string(),
                content,
                model: "test-model".to_string(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            })
        }
    }
}

// --- Store ---

#[derive(Default)]
struct StoreState {
    user_memories: Vec<UserMemory>,
    knowledge: Vec<GeneralKnowledge>,
    posts: Vec<PostHistory>,
    summaries: HashMap<SubjectKey, SummarizedKnowledge>,
    directives: Vec<Directive>,
    blocklist: Vec<String>,
    conversations: HashMap<String, ConversationState>,
    ledger: HashMap<String, LedgerEntry>,
    fail_write_back: bool,
}

/// One fake backing every repository trait.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocklist(terms: &[&str]) -> Self {
        let store = Self::new();
        store.state.lock().unwrap().blocklist = terms.iter().map(|t| t.to_string()).collect();
        store
    }

    pub fn fail_write_back(&self) {
        self.state.lock().unwrap().fail_write_back = true;
    }

    pub fn knowledge(&self) -> Vec<GeneralKnowledge> {
        self.state.lock().unwrap().knowledge.clone()
    }

    pub fn posts(&self) -> Vec<PostHistory> {
        self.state.lock().unwrap().posts.clone()
    }

    pub fn insert_knowledge(&self, topic: &str, tags: &[&str], content: &str, created_at: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        let id = state.knowledge.len() as i64 + 1;
        state.knowledge.push(GeneralKnowledge {
            id,
            topic: topic.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            content: content.to_string(),
            created_at,
        });
    }

    fn upsert_user_memory(state: &mut StoreState, handle: &str, key: &str, value: &str) {
        let key = normalize_key(key);
        let now = Utc::now();
        match state
            .user_memories
            .iter_mut()
            .find(|m| m.user_handle == handle && m.key == key)
        {
            Some(existing) => {
                existing.value = value.to_string();
                existing.updated_at = now;
            }
            None => state.user_memories.push(UserMemory {
                user_handle: handle.to_string(),
                key,
                value: value.to_string(),
                updated_at: now,
            }),
        }
    }
}

fn matches_term(k: &GeneralKnowledge, term: &str) -> bool {
    let term = term.to_lowercase();
    k.topic.to_lowercase().contains(&term)
        || k.content.to_lowercase().contains(&term)
        || k.tags.iter().any(|t| t.to_lowercase().contains(&term))
}

fn newest_first(mut items: Vec<GeneralKnowledge>) -> Vec<GeneralKnowledge> {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    items
}

impl MemoryRepository for InMemoryStore {
    async fn get_user_memory(&self, handle: &str) -> Result<Vec<UserMemory>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<UserMemory> = state
            .user_memories
            .iter()
            .filter(|m| m.user_handle == handle)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(rows)
    }

    async fn put_user_memory(&self, handle: &str, key: &str, value: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        Self::upsert_user_memory(&mut state, handle, key, value);
        Ok(())
    }

    async fn query_general_knowledge(
        &self,
        terms: &[String],
        limit: i64,
    ) -> Result<Vec<GeneralKnowledge>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let hits = state
            .knowledge
            .iter()
            .filter(|k| terms.iter().any(|t| matches_term(k, t)))
            .cloned()
            .collect();
        Ok(newest_first(hits).into_iter().take(limit as usize).collect())
    }

    async fn recent_knowledge(&self, limit: i64) -> Result<Vec<GeneralKnowledge>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(newest_first(state.knowledge.clone())
            .into_iter()
            .take(limit as usize)
            .collect())
    }

    async fn knowledge_exists(&self, content: &str) -> Result<bool, RepositoryError> {
        let prefix: String = content.chars().take(100).collect();
        let state = self.state.lock().unwrap();
        Ok(state.knowledge.iter().any(|k| {
            k.content == content || k.content.chars().take(100).collect::<String>() == prefix
        }))
    }

    async fn append_post_history(&self, record: &PostHistory) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.posts.iter().any(|p| p.post_uri == record.post_uri) {
            return Ok(false);
        }
        state.posts.push(record.clone());
        Ok(true)
    }

    async fn posts_by_author(&self, handle: &str, limit: i64) -> Result<Vec<PostHistory>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<PostHistory> = state
            .posts
            .iter()
            .filter(|p| p.author_handle == handle)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn active_authors(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<String>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for post in state.posts.iter().filter(|p| p.timestamp >= since) {
            *counts.entry(post.author_handle.clone()).or_default() += 1;
        }
        let mut authors: Vec<(String, usize)> = counts.into_iter().collect();
        authors.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(authors.into_iter().take(limit as usize).map(|(a, _)| a).collect())
    }

    async fn get_summary(&self, subject: &SubjectKey) -> Result<Option<SummarizedKnowledge>, RepositoryError> {
        Ok(self.state.lock().unwrap().summaries.get(subject).cloned())
    }

    async fn put_summary(&self, summary: &SummarizedKnowledge) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .summaries
            .insert(summary.subject_key.clone(), summary.clone());
        Ok(())
    }

    async fn catalogue(&self, participants_since: DateTime<Utc>, cap: i64) -> Result<MemoryCatalogue, RepositoryError> {
        let state = self.state.lock().unwrap();
        let cap = cap as usize;
        let users: BTreeSet<String> = state.user_memories.iter().map(|m| m.user_handle.clone()).collect();
        let topics: BTreeSet<String> = state.knowledge.iter().map(|k| k.topic.clone()).collect();
        let tags: BTreeSet<String> = state.knowledge.iter().flat_map(|k| k.tags.iter().cloned()).collect();
        let participants: BTreeSet<String> = state
            .posts
            .iter()
            .filter(|p| p.timestamp >= participants_since)
            .map(|p| p.author_handle.clone())
            .collect();
        Ok(MemoryCatalogue {
            user_handles: users.into_iter().take(cap).collect(),
            knowledge_topics: topics.into_iter().take(cap).collect(),
            tags: tags.into_iter().take(cap).collect(),
            recent_participants: participants.into_iter().take(cap).collect(),
        })
    }

    async fn apply_write_back(&self, batch: &MemoryWriteBack) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_write_back {
            return Err(RepositoryError::Query("disk I/O error".to_string()));
        }
        for (key, value) in &batch.user_facts {
            Self::upsert_user_memory(&mut state, &batch.owner_handle, key, value);
        }
        for item in &batch.knowledge {
            let id = state.knowledge.len() as i64 + 1;
            state.knowledge.push(GeneralKnowledge {
                id,
                topic: item.topic.clone(),
                tags: item.tags.clone(),
                content: item.content.clone(),
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn load_blocklist(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(self.state.lock().unwrap().blocklist.clone())
    }

    async fn stats(&self) -> Result<MemoryStats, RepositoryError> {
        let state = self.state.lock().unwrap();
        let users: BTreeSet<&str> = state.user_memories.iter().map(|m| m.user_handle.as_str()).collect();
        Ok(MemoryStats {
            users_with_memories: users.len() as i64,
            user_memories: state.user_memories.len() as i64,
            knowledge_entries: state.knowledge.len() as i64,
            posts_observed: state.posts.len() as i64,
            summaries: state.summaries.len() as i64,
        })
    }
}

impl DirectiveRepository for InMemoryStore {
    async fn append_directive(&self, instruction: &str, author_did: &str) -> Result<Directive, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let directive = Directive {
            id: state.directives.len() as i64 + 1,
            instruction: instruction.to_string(),
            author_did: author_did.to_string(),
            created_at: Utc::now(),
        };
        state.directives.push(directive.clone());
        Ok(directive)
    }

    async fn list_directives(&self) -> Result<Vec<Directive>, RepositoryError> {
        Ok(self.state.lock().unwrap().directives.clone())
    }
}

impl ConversationRepository for InMemoryStore {
    async fn get_state(&self, thread_root_uri: &str) -> Result<Option<ConversationState>, RepositoryError> {
        Ok(self.state.lock().unwrap().conversations.get(thread_root_uri).cloned())
    }

    async fn save_state(&self, state: &ConversationState) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .conversations
            .insert(state.thread_root_uri.clone(), state.clone());
        Ok(())
    }

    async fn count_stopped(&self) -> Result<i64, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .conversations
            .values()
            .filter(|s| s.stopped)
            .count() as i64)
    }
}

impl InteractionLedger for InMemoryStore {
    async fn get_entry(&self, uri: &str) -> Result<Option<LedgerEntry>, RepositoryError> {
        Ok(self.state.lock().unwrap().ledger.get(uri).cloned())
    }

    async fn mark_handled(&self, uri: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let entry = state.ledger.entry(uri.to_string()).or_insert_with(|| LedgerEntry {
            uri: uri.to_string(),
            status: None,
            attempts: 0,
            last_error: None,
            updated_at: Utc::now(),
        });
        entry.status = Some(ProcessedStatus::Handled);
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn record_failure(&self, uri: &str, error: &str, max_attempts: u32) -> Result<LedgerEntry, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let entry = state.ledger.entry(uri.to_string()).or_insert_with(|| LedgerEntry {
            uri: uri.to_string(),
            status: None,
            attempts: 0,
            last_error: None,
            updated_at: Utc::now(),
        });
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        entry.updated_at = Utc::now();
        if entry.attempts >= max_attempts {
            entry.status = Some(ProcessedStatus::Failed);
        }
        Ok(entry.clone())
    }

    async fn count_by_status(&self, status: ProcessedStatus) -> Result<i64, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .ledger
            .values()
            .filter(|e| e.status == Some(status))
            .count() as i64)
    }
}

// --- Social ---

#[derive(Debug, Clone)]
pub struct Published {
    pub reply_to: Option<ReplyTarget>,
    pub text: String,
    pub facets: Vec<Facet>,
}

#[derive(Default)]
struct SocialState {
    notifications: Vec<Interaction>,
    threads: HashMap<String, Vec<Post>>,
    search_results: Vec<Post>,
    searches: Vec<String>,
    published: Vec<Published>,
    /// Zero-based publish call that fails permanently.
    fail_publish_at: Option<usize>,
    publish_calls: usize,
    fail_notifications: bool,
}

#[derive(Clone, Default)]
pub struct FakeSocial {
    state: Arc<Mutex<SocialState>>,
}

impl FakeSocial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_notification(&self, interaction: Interaction) {
        self.state.lock().unwrap().notifications.push(interaction);
    }

    pub fn set_thread(&self, uri: &str, posts: Vec<Post>) {
        self.state.lock().unwrap().threads.insert(uri.to_string(), posts);
    }

    pub fn set_search_results(&self, posts: Vec<Post>) {
        self.state.lock().unwrap().search_results = posts;
    }

    pub fn fail_publish_at(&self, call: usize) {
        self.state.lock().unwrap().fail_publish_at = Some(call);
    }

    pub fn fail_notifications(&self) {
        self.state.lock().unwrap().fail_notifications = true;
    }

    pub fn published(&self) -> Vec<Published> {
        self.state.lock().unwrap().published.clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.state.lock().unwrap().searches.clone()
    }
}

impl SocialClient for FakeSocial {
    async fn fetch_notifications(&self, limit: u32) -> Result<Vec<Interaction>, SocialError> {
        let state = self.state.lock().unwrap();
        if state.fail_notifications {
            return Err(SocialError::Auth("session expired".to_string()));
        }
        Ok(state.notifications.iter().take(limit as usize).cloned().collect())
    }

    async fn fetch_thread(&self, uri: &str) -> Result<Vec<Post>, SocialError> {
        Ok(self.state.lock().unwrap().threads.get(uri).cloned().unwrap_or_default())
    }

    async fn search(&self, term: &str, limit: u32) -> Result<Vec<Post>, SocialError> {
        let mut state = self.state.lock().unwrap();
        state.searches.push(term.to_string());
        Ok(state.search_results.iter().take(limit as usize).cloned().collect())
    }

    async fn publish(
        &self,
        reply_to: Option<&ReplyTarget>,
        text: &str,
        facets: &[Facet],
    ) -> Result<PostRef, SocialError> {
        let mut state = self.state.lock().unwrap();
        let call = state.publish_calls;
        state.publish_calls += 1;
        if state.fail_publish_at == Some(call) {
            return Err(SocialError::Http {
                status: 400,
                message: "record rejected".to_string(),
            });
        }
        state.published.push(Published {
            reply_to: reply_to.cloned(),
            text: text.to_string(),
            facets: facets.to_vec(),
        });
        let n = state.published.len();
        Ok(PostRef {
            uri: format!("at://did:plc:aura/app.bsky.feed.post/out{n}"),
            cid: format!("cid-out{n}"),
        })
    }
}

// --- Fixtures ---

pub fn bot() -> BotIdentity {
    BotIdentity {
        handle: "aura.test".to_string(),
        did: "did:plc:aura".to_string(),
    }
}

pub fn post(rkey: &str, handle: &str, text: &str, root: Option<&Post>) -> Post {
    let did = format!("did:plc:{}", handle.split('.').next().unwrap_or(handle));
    Post {
        uri: format!("at://{did}/app.bsky.feed.post/{rkey}"),
        cid: format!("cid-{rkey}"),
        author_handle: handle.to_string(),
        author_did: did,
        text: text.to_string(),
        created_at: Some(Utc::now()),
        reply_root: root.map(|r| r.root_ref()),
    }
}

pub fn mention(post: Post) -> Interaction {
    Interaction {
        post,
        source: InteractionSource::Notification {
            reason: NotificationReason::Mention,
        },
    }
}

pub fn reply(post: Post) -> Interaction {
    Interaction {
        post,
        source: InteractionSource::Notification {
            reason: NotificationReason::Reply,
        },
    }
}

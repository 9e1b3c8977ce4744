//! Context assembly for the content model call.

use chrono::{DateTime, Utc};

use aura_types::action::{Action, RouterDecision};
use aura_types::error::AgentError;
use aura_types::memory::{Directive, MemoryRef, SubjectKey};
use aura_types::social::Post;

use super::block::{ContextBlock, Section};
use super::directives::render_personality;
use super::realtime::real_world_context;
use crate::memory::service::MemoryService;
use crate::repository::memory::MemoryRepository;
use crate::retry::RetryPolicy;
use crate::social::SocialClient;

const MAX_USERS: usize = 3;
const MAX_FACTS_PER_USER: usize = 5;
const MAX_KNOWLEDGE: i64 = 3;
const MAX_SUMMARIES: usize = 3;

/// Everything known about the interaction when context is built.
pub struct ContextRequest<'a> {
    pub decision: &'a RouterDecision,
    /// Thread posts in reading order, including the latest one.
    pub thread: &'a [Post],
    pub latest: &'a Post,
    pub directives: &'a [Directive],
    pub now: DateTime<Utc>,
}

pub struct ContextBuilder {
    persona: String,
    max_chars: usize,
    search_result_limit: u32,
    retry: RetryPolicy,
}

impl ContextBuilder {
    pub fn new(persona: impl Into<String>, max_chars: usize, search_result_limit: u32, retry: RetryPolicy) -> Self {
        Self {
            persona: persona.into(),
            max_chars,
            search_result_limit,
            retry,
        }
    }

    /// The pinned personality text with the directive log applied.
    pub fn personality(&self, directives: &[Directive]) -> String {
        render_personality(&self.persona, directives)
    }

    #[tracing::instrument(
        name = "build_context",
        skip_all,
        fields(action = %request.decision.action, uri = %request.latest.uri)
    )]
    pub async fn build<R, S>(
        &self,
        request: ContextRequest<'_>,
        memory: &MemoryService<R>,
        social: &S,
    ) -> Result<ContextBlock, AgentError>
    where
        R: MemoryRepository,
        S: SocialClient,
    {
        let mut block = ContextBlock::new();
        let decision = request.decision;

        // (a) personality, directives, date
        block.push(Section::Core, self.personality(request.directives));
        block.push(Section::Core, real_world_context(request.now));

        // (b) resolved memory
        let mut users: Vec<String> = vec![request.latest.author_handle.to_lowercase()];
        for handle in decision.users() {
            if !users.iter().any(|u| u == handle) {
                users.push(handle.to_string());
            }
        }
        users.truncate(MAX_USERS);

        for handle in &users {
            let facts = memory.get_user_memory(handle).await?;
            if facts.is_empty() {
                continue;
            }
            let lines: Vec<String> = facts
                .iter()
                .take(MAX_FACTS_PER_USER)
                .map(|(k, v)| format!("- {k}: {v}"))
                .collect();
            block.push(Section::Memory, format!("Key info about @{handle}:\n{}", lines.join("\n")));
        }

        let terms = decision.knowledge_terms();
        for k in memory.query_general_knowledge(&terms, MAX_KNOWLEDGE).await? {
            block.push(Section::Memory, format!("- {}: {}", k.topic, k.content));
        }

        // (c) cached summaries
        let mut subjects: Vec<SubjectKey> = users.iter().cloned().map(SubjectKey::User).collect();
        subjects.extend(decision.memory_refs.iter().filter_map(|r| match r {
            MemoryRef::Topic(t) => Some(SubjectKey::Topic(t.clone())),
            _ => None,
        }));
        let mut summaries = 0;
        for subject in &subjects {
            if summaries >= MAX_SUMMARIES {
                break;
            }
            if let Some(summary) = memory.cached_summary(subject).await? {
                let label = match subject {
                    SubjectKey::User(h) => format!("@{h}"),
                    SubjectKey::Topic(t) => t.clone(),
                };
                block.push(Section::Summary, format!("About {label}: {}", summary.summary_text));
                summaries += 1;
            }
        }

        // (d) thread history, latest pinned separately
        for post in request.thread.iter().filter(|p| p.uri != request.latest.uri) {
            block.push(Section::Thread, post.transcript_line());
        }
        block.push(Section::Latest, request.latest.transcript_line());

        // (e) live search
        if let (Action::BlueskySearch | Action::WritePost, Some(query)) = (decision.action, decision.query.as_deref()) {
            let posts = self
                .retry
                .run("social:search", || social.search(query, self.search_result_limit))
                .await?;
            if posts.is_empty() {
                block.push(Section::Search, format!("No recent Bluesky posts found for '{query}'."));
            }
            for post in &posts {
                block.push(Section::Search, search_excerpt(post));
            }
            tracing::info!(query, results = posts.len(), "Search context fetched");
        }

        block.fit_to_budget(self.max_chars);
        Ok(block)
    }
}

/// `Author / Post / Link` excerpt for one search hit.
pub fn search_excerpt(post: &Post) -> String {
    let text = post.text.replace('\n', " ");
    let link = post.web_url().unwrap_or_else(|| "N/A".to_string());
    format!("Author: @{}\nPost: {}\nLink: {}", post.author_handle, text, link)
}

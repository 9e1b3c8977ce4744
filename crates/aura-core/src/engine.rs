//! The interaction engine: one serialized worker chaining every stage.
//!
//! Each interaction runs to completion before the next one starts:
//! ledger check, post history, conversation tracker, admin commands,
//! router, context builder, content pipeline, memory write-back. The
//! ledger records the result so a restart never answers the same post
//! twice.

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use aura_types::action::{Action, RouterDecision};
use aura_types::config::AgentConfig;
use aura_types::conversation::{DisengageReason, Verdict};
use aura_types::error::{AgentError, RepositoryError, SocialError};
use aura_types::memory::PostHistory;
use aura_types::social::{Interaction, InteractionSource, Post, web_url_for};

use crate::context::block::ContextBlock;
use crate::context::builder::{ContextBuilder, ContextRequest};
use crate::conversation::intent::is_stop_request;
use crate::conversation::tracker::ConversationTracker;
use crate::llm::client::ModelClient;
use crate::memory::extractor::FactExtractor;
use crate::memory::learning::parse_learning_request;
use crate::memory::service::MemoryService;
use crate::pipeline::ContentPipeline;
use crate::pipeline::blocklist::Blocklist;
use crate::repository::conversation::ConversationRepository;
use crate::repository::directive::DirectiveRepository;
use crate::repository::ledger::InteractionLedger;
use crate::repository::memory::MemoryRepository;
use crate::retry::RetryPolicy;
use crate::router::ActionRouter;
use crate::router::commands::{AdminCommand, parse_admin_command};
use crate::social::{BotIdentity, SocialClient};

/// Knowledge rows shown to the extractor as already known.
const EXISTING_KNOWLEDGE: i64 = 3;
/// Activity window and cap of the periodic summarization pass.
const SUMMARY_WINDOW_HOURS: i64 = 24;
const SUMMARY_MAX_USERS: i64 = 10;

const SAFETY_REFUSAL: &str = "I'm sorry, but I can't write about that topic.";

/// The repositories the engine persists through.
pub struct Stores<M, C, L, D> {
    pub memory: M,
    pub conversations: C,
    pub ledger: L,
    pub directives: D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    OwnPost,
    NotActionable,
    AlreadyProcessed,
}

/// What happened to one interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    Disengaged(DisengageReason),
    Replied { action: Action, segments: usize },
    Posted { topic: String, segments: usize },
    DirectiveRecorded,
    /// Refused or rejected. No generated text was published.
    Refused(String),
    /// Some segments of a thread are live; the rest failed.
    PartiallyPublished { published: usize, total: usize },
    /// An external call failed. `settled` once the attempt budget is spent.
    Failed { attempts: u32, settled: bool },
}

/// Tally of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub fetched: usize,
    pub handled: usize,
    pub ignored: usize,
    pub failed: usize,
}

impl PollReport {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Ignored(_) => self.ignored += 1,
            Outcome::Failed { .. } => self.failed += 1,
            _ => self.handled += 1,
        }
    }
}

pub struct InteractionEngine<M, C, L, D, S>
where
    M: MemoryRepository,
    C: ConversationRepository,
    L: InteractionLedger,
    D: DirectiveRepository,
    S: SocialClient,
{
    config: AgentConfig,
    bot: BotIdentity,
    social: S,
    memory: MemoryService<M>,
    tracker: ConversationTracker<C>,
    ledger: L,
    directives: D,
    router: ActionRouter,
    context: ContextBuilder,
    pipeline: ContentPipeline,
    client: ModelClient,
    retry: RetryPolicy,
}

impl<M, C, L, D, S> InteractionEngine<M, C, L, D, S>
where
    M: MemoryRepository,
    C: ConversationRepository,
    L: InteractionLedger,
    D: DirectiveRepository,
    S: SocialClient,
{
    pub fn new(
        config: AgentConfig,
        bot: BotIdentity,
        client: ModelClient,
        social: S,
        stores: Stores<M, C, L, D>,
        blocklist: Blocklist,
    ) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        Self {
            memory: MemoryService::new(stores.memory, client.clone(), blocklist.clone()),
            tracker: ConversationTracker::new(stores.conversations, config.streak_limit),
            ledger: stores.ledger,
            directives: stores.directives,
            router: ActionRouter::new(client.clone()),
            context: ContextBuilder::new(
                config.persona.clone(),
                config.max_context_chars,
                config.search_result_limit,
                retry.clone(),
            ),
            pipeline: ContentPipeline::new(
                client.clone(),
                blocklist,
                config.bot_name.clone(),
                config.post_max_length,
                Duration::from_millis(config.segment_delay_ms),
                retry.clone(),
            ),
            client,
            retry,
            social,
            bot,
            config,
        }
    }

    pub fn bot(&self) -> &BotIdentity {
        &self.bot
    }

    pub fn memory(&self) -> &MemoryService<M> {
        &self.memory
    }

    /// Poll on `poll_interval_secs` and summarize on `summary_interval_secs`
    /// until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut poll = tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs.max(1)));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut summarize = tokio::time::interval(Duration::from_secs(self.config.summary_interval_secs.max(60)));
        summarize.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            handle = %self.bot.handle,
            poll_secs = self.config.poll_interval_secs,
            "Monitoring started"
        );
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = poll.tick() => match self.poll_once(&cancel).await {
                    Ok(report) if report.fetched > 0 => tracing::debug!(?report, "Poll cycle complete"),
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "Poll cycle failed"),
                },
                _ = summarize.tick() => {
                    if let Err(e) = self.summarize_active_users().await {
                        tracing::warn!(error = %e, "Summarization pass failed");
                    }
                }
            }
        }
        tracing::info!("Monitoring stopped");
    }

    /// Fetch new interactions and process them strictly in observed order.
    ///
    /// Cancellation is honored between interactions, never inside one.
    #[tracing::instrument(name = "poll_cycle", skip_all)]
    pub async fn poll_once(&self, cancel: &CancellationToken) -> Result<PollReport, AgentError> {
        let limit = self.config.notification_fetch_limit;
        let mut queue = self
            .retry
            .run("social:notifications", || self.social.fetch_notifications(limit))
            .await?;
        if self.config.reply_to_search_mentions {
            queue.extend(self.search_mentions().await);
        }

        let mut seen = HashSet::new();
        queue.retain(|i| seen.insert(i.uri().to_string()));

        let mut report = PollReport {
            fetched: queue.len(),
            ..Default::default()
        };
        for interaction in &queue {
            if cancel.is_cancelled() {
                tracing::info!("Shutdown requested; leaving the rest of the queue for the next run");
                break;
            }
            let outcome = self.process_interaction(interaction).await?;
            report.record(&outcome);
        }
        Ok(report)
    }

    /// Posts from the configured search that mention the bot.
    async fn search_mentions(&self) -> Vec<Interaction> {
        let term = if self.config.search_term.trim().is_empty() {
            format!("@{}", self.bot.handle)
        } else {
            self.config.search_term.clone()
        };
        let limit = self.config.search_limit;
        match self.retry.run("social:search_mentions", || self.social.search(&term, limit)).await {
            Ok(posts) => posts
                .into_iter()
                .filter(|p| p.author_did != self.bot.did && self.bot.is_mentioned_in(&p.text))
                .map(|post| Interaction {
                    post,
                    source: InteractionSource::SearchHit,
                })
                .collect(),
            Err(e) => {
                tracing::warn!(term = %term, error = %e, "Mention search failed");
                Vec::new()
            }
        }
    }

    /// Process one interaction and settle it in the ledger.
    ///
    /// Only storage failures escape. External-call failures are counted
    /// against the interaction's attempt budget and reported as
    /// [`Outcome::Failed`].
    #[tracing::instrument(
        name = "process_interaction",
        skip_all,
        fields(uri = %interaction.uri(), author = %interaction.post.author_handle, source = %interaction.source)
    )]
    pub async fn process_interaction(&self, interaction: &Interaction) -> Result<Outcome, RepositoryError> {
        let uri = interaction.uri();
        if interaction.post.author_did == self.bot.did {
            return Ok(Outcome::Ignored(IgnoreReason::OwnPost));
        }
        if !interaction.is_actionable() {
            return Ok(Outcome::Ignored(IgnoreReason::NotActionable));
        }
        if self.ledger.get_entry(uri).await?.is_some_and(|e| e.is_settled()) {
            tracing::debug!("Already processed");
            return Ok(Outcome::Ignored(IgnoreReason::AlreadyProcessed));
        }

        let post = &interaction.post;
        let evaluation = self
            .tracker
            .evaluate(
                &post.root_ref().uri,
                self.bot.is_mentioned_in(&post.text),
                is_stop_request(&post.text),
            )
            .await?;

        match self.handle(interaction, evaluation.verdict).await {
            Ok(outcome) => {
                self.tracker.commit(&evaluation).await?;
                self.ledger.mark_handled(uri).await?;
                tracing::info!(?outcome, "Interaction handled");
                Ok(outcome)
            }
            Err(AgentError::PartialThreadPublish {
                published,
                total,
                source,
            }) => {
                // The published segments stay up; answering again would duplicate them.
                tracing::error!(published, total, error = %source, "Reply thread left partially published");
                self.tracker.commit(&evaluation).await?;
                self.ledger.mark_handled(uri).await?;
                Ok(Outcome::PartiallyPublished { published, total })
            }
            Err(
                e @ (AgentError::PermissionDenied(_)
                | AgentError::SafetyCheckFailed { .. }
                | AgentError::BlocklistViolation { .. }),
            ) => {
                tracing::info!(error = %e, "Interaction rejected");
                self.tracker.commit(&evaluation).await?;
                self.ledger.mark_handled(uri).await?;
                Ok(Outcome::Refused(e.to_string()))
            }
            Err(e) => {
                // The thread state is left as it was: the retry evaluates afresh.
                let entry = self
                    .ledger
                    .record_failure(uri, &e.to_string(), self.config.max_interaction_attempts)
                    .await?;
                let settled = entry.is_settled();
                if settled {
                    tracing::error!(attempts = entry.attempts, error = %e, "Interaction failed permanently");
                } else {
                    tracing::warn!(attempts = entry.attempts, error = %e, "Interaction failed; will retry next poll");
                }
                Ok(Outcome::Failed {
                    attempts: entry.attempts,
                    settled,
                })
            }
        }
    }

    async fn handle(&self, interaction: &Interaction, verdict: Verdict) -> Result<Outcome, AgentError> {
        let post = &interaction.post;
        let author = post.author_handle.to_lowercase();

        self.memory
            .append_post_history(&PostHistory {
                post_uri: post.uri.clone(),
                thread_root_uri: post.root_ref().uri,
                author_handle: author.clone(),
                text: post.text.clone(),
                timestamp: post.created_at.unwrap_or_else(Utc::now),
            })
            .await?;

        if let Verdict::Disengage(reason) = verdict {
            return Ok(Outcome::Disengaged(reason));
        }
        let thread = self.load_thread(post).await?;

        let is_admin = self.config.is_admin(&post.author_did);
        let decision = match parse_admin_command(&post.text, &self.bot.handle) {
            Some(command) if !is_admin => return self.refuse_command(post, &command).await,
            Some(AdminCommand::Directive { instruction }) => return self.record_directive(post, &instruction).await,
            Some(AdminCommand::Post { topic }) => RouterDecision {
                action: Action::WritePost,
                query: Some(topic),
                memory_refs: BTreeSet::new(),
            },
            None => {
                let catalogue = self.memory.catalogue().await?;
                self.router
                    .classify(&thread_history(&thread, post), &post.transcript_line(), is_admin, &catalogue)
                    .await?
            }
        };

        if let (Action::WritePost, Some(topic)) = (decision.action, decision.query.as_deref()) {
            match self.pipeline.check_topic(topic).await {
                Ok(()) => {}
                Err(e @ AgentError::SafetyCheckFailed { .. }) => {
                    tracing::warn!(error = %e, "Refusing to write post");
                    self.pipeline
                        .send_notice(&self.social, &post.reply_target(), SAFETY_REFUSAL)
                        .await?;
                    return Ok(Outcome::Refused(e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        let directives = self.directives.list_directives().await?;
        let request = ContextRequest {
            decision: &decision,
            thread: &thread,
            latest: post,
            directives: &directives,
            now: Utc::now(),
        };
        let context = self.context.build(request, &self.memory, &self.social).await?;

        match (decision.action, decision.query.as_deref()) {
            (Action::WritePost, Some(topic)) => self.write_post(post, &context, topic).await,
            (action, _) => self.reply(post, &author, &decision, &context, action).await,
        }
    }

    /// The thread in reading order, always ending with `post`.
    async fn load_thread(&self, post: &Post) -> Result<Vec<Post>, AgentError> {
        let mut thread = match self
            .retry
            .run("social:fetch_thread", || self.social.fetch_thread(&post.uri))
            .await
        {
            Ok(thread) => thread,
            Err(SocialError::NotFound(reason)) => {
                tracing::warn!(reason = %reason, "Thread not found; using the post alone");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        if !thread.iter().any(|p| p.uri == post.uri) {
            thread.push(post.clone());
        }
        Ok(thread)
    }

    async fn reply(
        &self,
        post: &Post,
        author: &str,
        decision: &RouterDecision,
        context: &ContextBlock,
        action: Action,
    ) -> Result<Outcome, AgentError> {
        let content = self
            .pipeline
            .generate_and_publish(&self.social, context, action, &post.reply_target())
            .await?;
        self.write_back(post, author, decision, &content.text).await;
        Ok(Outcome::Replied {
            action,
            segments: content.posts.len(),
        })
    }

    async fn write_post(&self, post: &Post, context: &ContextBlock, topic: &str) -> Result<Outcome, AgentError> {
        let content = self.pipeline.write_post(&self.social, context, topic).await?;
        let notice = match content.posts.first().and_then(|p| web_url_for(&p.uri)) {
            Some(link) => format!("Done! I wrote a thread about '{topic}': {link}"),
            None => format!("Done! I wrote a thread about '{topic}'."),
        };
        if let Err(e) = self.pipeline.send_notice(&self.social, &post.reply_target(), &notice).await {
            tracing::warn!(error = %e, "Thread posted but the confirmation reply failed");
        }
        Ok(Outcome::Posted {
            topic: topic.to_string(),
            segments: content.posts.len(),
        })
    }

    async fn refuse_command(&self, post: &Post, command: &AdminCommand) -> Result<Outcome, AgentError> {
        let denied = AgentError::PermissionDenied(format!(
            "'{}' command from non-admin {}",
            command.name(),
            post.author_did
        ));
        tracing::warn!(error = %denied, "Admin command refused");
        let notice = format!("Sorry, only my admins can use the '{}' command.", command.name());
        self.pipeline.send_notice(&self.social, &post.reply_target(), &notice).await?;
        Ok(Outcome::Refused(denied.to_string()))
    }

    async fn record_directive(&self, post: &Post, instruction: &str) -> Result<Outcome, AgentError> {
        self.pipeline.screen(instruction)?;
        let directive = self.directives.append_directive(instruction, &post.author_did).await?;
        tracing::info!(id = directive.id, author = %post.author_did, "Directive appended");
        let notice = format!("Directive updated: \"{}\"", directive.instruction);
        if let Err(e) = self.pipeline.send_notice(&self.social, &post.reply_target(), &notice).await {
            tracing::warn!(error = %e, "Directive stored but the confirmation reply failed");
        }
        Ok(Outcome::DirectiveRecorded)
    }

    /// Learn from a published exchange. Failures are logged: the reply is
    /// already out and must not be retried because memory could not be
    /// written.
    ///
    /// An explicit learning request is the author writing their own memory
    /// and is stored as one record. Model-extracted facts are committed as
    /// one batch.
    async fn write_back(&self, post: &Post, author: &str, decision: &RouterDecision, reply_text: &str) {
        if let Some(fact) = parse_learning_request(&post.text) {
            match self.memory.put_user_memory(author, author, &fact.key, &fact.value).await {
                Ok(()) => tracing::info!(key = %fact.key, "Stored learning request"),
                Err(e) => tracing::warn!(key = %fact.key, error = %e, "Learning request not stored"),
            }
        }

        let existing = match self
            .memory
            .query_general_knowledge(&decision.knowledge_terms(), EXISTING_KNOWLEDGE)
            .await
        {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load existing knowledge for extraction");
                Vec::new()
            }
        };
        let exchange = format!("{}\n{}: {}", post.transcript_line(), self.config.bot_name, reply_text);
        let extracted = match FactExtractor::extract(&self.client, &exchange, &existing).await {
            Ok(facts) => facts,
            Err(e) => {
                tracing::warn!(error = %e, "Fact extraction failed");
                Vec::new()
            }
        };

        let result = async {
            let batch = self.memory.prepare_write_back(author, extracted).await?;
            self.memory.commit_write_back(&batch).await
        }
        .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "Memory write-back failed; nothing was stored");
        }
    }

    /// Regenerate summaries of recently active users.
    pub async fn summarize_active_users(&self) -> Result<usize, AgentError> {
        let since = Utc::now() - chrono::Duration::hours(SUMMARY_WINDOW_HOURS);
        self.memory.refresh_active_users(since, SUMMARY_MAX_USERS).await
    }
}

/// Transcript of the thread before `latest`.
fn thread_history(thread: &[Post], latest: &Post) -> String {
    let lines: Vec<String> = thread
        .iter()
        .filter(|p| p.uri != latest.uri)
        .map(Post::transcript_line)
        .collect();
    if lines.is_empty() {
        "(no earlier posts)".to_string()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aura_types::config::RetryConfig;
    use aura_types::conversation::ConversationState;
    use aura_types::ledger::ProcessedStatus;
    use aura_types::llm::LlmError;
    use aura_types::social::{FacetFeature, NotificationReason};

    use crate::testing::{FakeSocial, InMemoryStore, ScriptedProvider, bot, mention, post, reply};

    type TestEngine = InteractionEngine<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore, FakeSocial>;

    fn config() -> AgentConfig {
        AgentConfig {
            admin_dids: ["did:plc:admin".to_string()].into(),
            segment_delay_ms: 0,
            retry: RetryConfig {
                max_attempts: 1,
                base_delay_ms: 0,
                max_delay_ms: 0,
            },
            ..AgentConfig::default()
        }
    }

    fn engine_with(
        config: AgentConfig,
        provider: &ScriptedProvider,
        store: &InMemoryStore,
        social: &FakeSocial,
    ) -> TestEngine {
        InteractionEngine::new(
            config,
            bot(),
            provider.client(),
            social.clone(),
            Stores {
                memory: store.clone(),
                conversations: store.clone(),
                ledger: store.clone(),
                directives: store.clone(),
            },
            Blocklist::new(["bomb"]),
        )
    }

    fn engine(provider: &ScriptedProvider, store: &InMemoryStore, social: &FakeSocial) -> TestEngine {
        engine_with(config(), provider, store, social)
    }

    fn script(responses: &[&str]) -> ScriptedProvider {
        ScriptedProvider::new(responses.iter().map(|r| Ok(r.to_string())).collect())
    }

    async fn user_facts(store: &InMemoryStore, handle: &str) -> Vec<(String, String)> {
        store
            .get_user_memory(handle)
            .await
            .unwrap()
            .into_iter()
            .map(|m| (m.key, m.value))
            .collect()
    }

    use crate::repository::conversation::ConversationRepository;
    use crate::repository::directive::DirectiveRepository;
    use crate::repository::ledger::InteractionLedger;
    use crate::repository::memory::MemoryRepository;

    #[tokio::test]
    async fn test_learning_request_stored_for_author_only() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let provider = script(&[
            r#"{"action": "reply"}"#,
            "Noted, tea it is! 🍵",
            "[]",
            r#"{"action": "reply"}"#,
            "Got it.",
            r#"[{"scope": "user", "handle": "alice.test", "key": "preference", "value": "likes coffee"}]"#,
        ]);
        let engine = engine(&provider, &store, &social);

        let tea = mention(post("p1", "alice.test", "@aura.test remember: I like tea", None));
        let outcome = engine.process_interaction(&tea).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Replied {
                action: Action::Reply,
                segments: 1
            }
        );
        assert_eq!(
            user_facts(&store, "alice.test").await,
            vec![("preference".to_string(), "likes tea".to_string())]
        );

        let other = mention(post("p2", "bob.test", "@aura.test alice actually likes coffee", None));
        engine.process_interaction(&other).await.unwrap();
        assert_eq!(
            user_facts(&store, "alice.test").await,
            vec![("preference".to_string(), "likes tea".to_string())]
        );
        assert!(user_facts(&store, "bob.test").await.is_empty());
    }

    #[tokio::test]
    async fn test_thread_history_reaches_router() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let root = post("t1", "erin.test", "Kites need steady wind", None);
        let latest = post("t2", "frank.test", "@aura.test is that true?", Some(&root));
        social.set_thread(&latest.uri, vec![root.clone(), latest.clone()]);
        let provider = script(&[r#"{"action": "reply"}"#, "Yes, steady wind helps.", "[]"]);
        let engine = engine(&provider, &store, &social);

        engine.process_interaction(&mention(latest)).await.unwrap();

        let routed = provider.requests_matching("decision-making router");
        assert_eq!(routed.len(), 1);
        let prompt = &routed[0].messages[0].content;
        assert!(prompt.contains("CONVERSATION HISTORY:\n@erin.test: Kites need steady wind"));
        assert!(prompt.contains("MOST RECENT MESSAGE:\n@frank.test: @aura.test is that true?"));
    }

    #[tokio::test]
    async fn test_search_results_reach_reply() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        social.set_search_results(vec![post("k1", "carol.test", "Kites are everywhere today", None)]);
        let provider = script(&[
            r#"{"action": "bluesky_search", "query": "kites"}"#,
            "People are loving kites right now: https://bsky.app/profile/did:plc:carol/post/k1",
            "[]",
        ]);
        let engine = engine(&provider, &store, &social);

        let question = mention(post("q1", "dave.test", "@aura.test what are people saying about kites?", None));
        let outcome = engine.process_interaction(&question).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Replied {
                action: Action::BlueskySearch,
                segments: 1
            }
        );
        assert_eq!(social.searches(), vec!["kites"]);

        let content_prompt = &provider.requests()[1].messages[0].content;
        assert!(content_prompt.contains("Link: https://bsky.app/profile/did:plc:carol/post/k1"));

        let published = social.published();
        assert_eq!(published.len(), 1);
        assert!(
            published[0]
                .facets
                .iter()
                .any(|f| matches!(f.feature, FacetFeature::Link { .. }))
        );
    }

    #[tokio::test]
    async fn test_admin_post_command_publishes_thread() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let long_text = vec!["abcd"; 130].join(" ");
        let provider = script(&["true", long_text.as_str()]);
        let engine = engine(&provider, &store, &social);

        let command = mention(post("a1", "admin.test", "@aura.test post about kites", None));
        let outcome = engine.process_interaction(&command).await.unwrap();
        assert_eq!(
            outcome,
            Outcome::Posted {
                topic: "kites".to_string(),
                segments: 3
            }
        );

        let published = social.published();
        assert_eq!(published.len(), 4);
        assert!(published[0].reply_to.is_none());
        assert!(published[0].text.ends_with("(1/3)"));
        assert!(published[2].text.ends_with("(3/3)"));
        assert_eq!(published[3].reply_to.as_ref(), Some(&command.post.reply_target()));
        assert!(published[3].text.contains("kites"));
        // Safety check and generation only: no router, no extraction.
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_notification_answered_once() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let provider = script(&[r#"{"action": "reply"}"#, "Hello!", "[]"]);
        let interaction = mention(post("p1", "alice.test", "@aura.test hi", None));

        engine(&provider, &store, &social)
            .process_interaction(&interaction)
            .await
            .unwrap();

        // Simulated restart: a fresh engine over the same store.
        let restarted = engine(&provider, &store, &social);
        let outcome = restarted.process_interaction(&interaction).await.unwrap();
        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::AlreadyProcessed));
        assert_eq!(social.published().len(), 1);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_stopped_thread_gets_no_output() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let provider = script(&[]);
        let root = post("r1", "alice.test", "@aura.test hi", None);
        let mut state = ConversationState::new(root.uri.clone());
        state.stopped = true;
        store.save_state(&state).await.unwrap();

        let engine = engine(&provider, &store, &social);
        let later = mention(post("r2", "alice.test", "@aura.test are you there?", Some(&root)));
        let outcome = engine.process_interaction(&later).await.unwrap();

        assert_eq!(outcome, Outcome::Disengaged(DisengageReason::AlreadyStopped));
        assert_eq!(provider.calls(), 0);
        assert!(social.published().is_empty());
        let entry = store.get_entry(&later.post.uri).await.unwrap().unwrap();
        assert_eq!(entry.status, Some(ProcessedStatus::Handled));
    }

    #[tokio::test]
    async fn test_stop_request_disengages_without_model_call() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let provider = script(&[]);
        let engine = engine(&provider, &store, &social);

        let root = post("r1", "alice.test", "@aura.test hi", None);
        let stop = reply(post("r2", "alice.test", "ok please stop", Some(&root)));
        let outcome = engine.process_interaction(&stop).await.unwrap();

        assert_eq!(outcome, Outcome::Disengaged(DisengageReason::StopRequested));
        assert_eq!(provider.calls(), 0);
        assert!(store.get_state(&root.uri).await.unwrap().unwrap().stopped);
    }

    #[tokio::test]
    async fn test_directive_from_non_admin_refused() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let provider = script(&[]);
        let engine = engine(&provider, &store, &social);

        let command = mention(post("d1", "mallory.test", "@aura.test directive be rude", None));
        let outcome = engine.process_interaction(&command).await.unwrap();

        assert!(matches!(outcome, Outcome::Refused(_)));
        assert!(store.list_directives().await.unwrap().is_empty());
        let published = social.published();
        assert_eq!(published.len(), 1);
        assert!(published[0].text.contains("only my admins"));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_admin_directive_appended_and_confirmed() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let provider = script(&[]);
        let engine = engine(&provider, &store, &social);

        let command = mention(post("d1", "admin.test", "@aura.test directive Always mention kites", None));
        let outcome = engine.process_interaction(&command).await.unwrap();

        assert_eq!(outcome, Outcome::DirectiveRecorded);
        let directives = store.list_directives().await.unwrap();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].instruction, "Always mention kites");
        assert_eq!(directives[0].author_did, "did:plc:admin");
        assert!(social.published()[0].text.contains("Always mention kites"));
    }

    #[tokio::test]
    async fn test_unsafe_write_request_refused_politely() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let provider = script(&[r#"{"action": "write_post", "query": "something awful"}"#, "false"]);
        let engine = engine(&provider, &store, &social);

        let request = mention(post("w1", "alice.test", "@aura.test write a post about something awful", None));
        let outcome = engine.process_interaction(&request).await.unwrap();

        assert!(matches!(outcome, Outcome::Refused(_)));
        let published = social.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].text, SAFETY_REFUSAL);
        assert_eq!(published[0].reply_to.as_ref(), Some(&request.post.reply_target()));
        assert!(social.searches().is_empty());
    }

    #[tokio::test]
    async fn test_blocked_post_topic_skips_model_and_search() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let provider = script(&[]);
        let engine = engine(&provider, &store, &social);

        let command = mention(post("a2", "admin.test", "@aura.test post about the bomb", None));
        let outcome = engine.process_interaction(&command).await.unwrap();

        assert!(matches!(outcome, Outcome::Refused(_)));
        assert_eq!(provider.calls(), 0);
        assert!(social.searches().is_empty());
        assert!(social.published().is_empty());
    }

    #[tokio::test]
    async fn test_blocked_directive_not_stored_or_echoed() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let provider = script(&[]);
        let engine = engine(&provider, &store, &social);

        let command = mention(post(
            "d2",
            "admin.test",
            "@aura.test directive call every good idea the bomb",
            None,
        ));
        let outcome = engine.process_interaction(&command).await.unwrap();

        assert!(matches!(outcome, Outcome::Refused(_)));
        assert!(store.list_directives().await.unwrap().is_empty());
        assert!(social.published().is_empty());
    }

    #[tokio::test]
    async fn test_failed_attempts_do_not_advance_streak() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let provider = ScriptedProvider::new(vec![
            Ok(r#"{"action": "reply"}"#.to_string()),
            Ok("Hello there!".to_string()),
            Ok("[]".to_string()),
            Err(LlmError::AuthenticationFailed),
            Err(LlmError::AuthenticationFailed),
            Ok(r#"{"action": "reply"}"#.to_string()),
            Ok("Glad to help.".to_string()),
            Ok("[]".to_string()),
        ]);
        let config = AgentConfig {
            streak_limit: 3,
            ..config()
        };
        let engine = engine_with(config, &provider, &store, &social);

        let root = post("s1", "alice.test", "@aura.test hi", None);
        engine.process_interaction(&mention(root.clone())).await.unwrap();

        let follow_up = reply(post("s2", "alice.test", "thanks, that helps", Some(&root)));
        for attempt in 1..=2u32 {
            assert_eq!(
                engine.process_interaction(&follow_up).await.unwrap(),
                Outcome::Failed {
                    attempts: attempt,
                    settled: false
                }
            );
        }
        assert_eq!(
            engine.process_interaction(&follow_up).await.unwrap(),
            Outcome::Replied {
                action: Action::Reply,
                segments: 1
            }
        );

        let state = store.get_state(&root.uri).await.unwrap().unwrap();
        assert_eq!(state.streak_count, 1);
        assert!(!state.stopped);
    }

    #[tokio::test]
    async fn test_failed_interaction_retried_then_settled() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let provider = ScriptedProvider::new(vec![
            Err(LlmError::AuthenticationFailed),
            Err(LlmError::AuthenticationFailed),
            Err(LlmError::AuthenticationFailed),
        ]);
        let engine = engine(&provider, &store, &social);
        let interaction = mention(post("f1", "alice.test", "@aura.test hello", None));

        for attempt in 1..=3u32 {
            let outcome = engine.process_interaction(&interaction).await.unwrap();
            assert_eq!(
                outcome,
                Outcome::Failed {
                    attempts: attempt,
                    settled: attempt == 3
                }
            );
        }
        let outcome = engine.process_interaction(&interaction).await.unwrap();
        assert_eq!(outcome, Outcome::Ignored(IgnoreReason::AlreadyProcessed));
        assert!(social.published().is_empty());
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_blocked_reply_never_published() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let provider = script(&[r#"{"action": "reply"}"#, "that was the bomb", "still the bomb"]);
        let engine = engine(&provider, &store, &social);

        let interaction = mention(post("b1", "alice.test", "@aura.test how was the party?", None));
        let outcome = engine.process_interaction(&interaction).await.unwrap();

        assert!(matches!(outcome, Outcome::Refused(_)));
        assert!(social.published().is_empty());
    }

    #[tokio::test]
    async fn test_poll_skips_own_and_non_actionable() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let provider = script(&[r#"{"action": "reply"}"#, "Hi Alice!", "[]"]);
        let engine = engine(&provider, &store, &social);

        social.push_notification(mention(post("own", "aura.test", "@aura.test talking to myself", None)));
        social.push_notification(Interaction {
            post: post("l1", "bob.test", "nice", None),
            source: InteractionSource::Notification {
                reason: NotificationReason::parse("like"),
            },
        });
        social.push_notification(mention(post("m1", "alice.test", "@aura.test hi", None)));

        let report = engine.poll_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(
            report,
            PollReport {
                fetched: 3,
                handled: 1,
                ignored: 2,
                failed: 0
            }
        );
        assert_eq!(social.published().len(), 1);
    }

    #[tokio::test]
    async fn test_poll_stops_when_cancelled() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        let provider = script(&[]);
        let engine = engine(&provider, &store, &social);
        social.push_notification(mention(post("m1", "alice.test", "@aura.test hi", None)));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = engine.poll_once(&cancel).await.unwrap();
        assert_eq!(report.fetched, 1);
        assert_eq!(report.handled, 0);
        assert!(store.get_entry("at://did:plc:alice/app.bsky.feed.post/m1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_poll_picks_up_search_mentions() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        social.set_search_results(vec![
            post("s1", "erin.test", "hey @aura.test what's a good kite?", None),
            post("s2", "frank.test", "aura is a nice word", None),
        ]);
        let provider = script(&[r#"{"action": "reply"}"#, "A delta kite!", "[]"]);
        let engine = engine_with(
            AgentConfig {
                reply_to_search_mentions: true,
                ..config()
            },
            &provider,
            &store,
            &social,
        );

        let report = engine.poll_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.fetched, 1);
        assert_eq!(report.handled, 1);
        assert_eq!(social.searches(), vec!["@aura.test"]);
    }

    #[tokio::test]
    async fn test_notification_failure_surfaces() {
        let store = InMemoryStore::new();
        let social = FakeSocial::new();
        social.fail_notifications();
        let engine = engine(&script(&[]), &store, &social);

        let err = engine.poll_once(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_external_call_failure());
    }
}

//! Application state wiring the engine together.
//!
//! Storage is opened for every command. The model provider and the Bluesky
//! session are only created by commands that need them, so `status` and
//! `memory` work without credentials or network access.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use aura_core::engine::{InteractionEngine, Stores};
use aura_core::llm::box_provider::BoxLlmProvider;
use aura_core::llm::client::ModelClient;
use aura_core::memory::service::MemoryService;
use aura_core::pipeline::blocklist::Blocklist;
use aura_core::retry::RetryPolicy;
use aura_infra::bluesky::BlueskyClient;
use aura_infra::config::{Credentials, load_config, resolve_data_dir};
use aura_infra::llm::create_provider;
use aura_infra::sqlite::conversation::SqliteConversationRepository;
use aura_infra::sqlite::directive::SqliteDirectiveRepository;
use aura_infra::sqlite::ledger::SqliteInteractionLedger;
use aura_infra::sqlite::memory::SqliteMemoryRepository;
use aura_infra::sqlite::pool::{DatabasePool, database_url};
use aura_types::config::AgentConfig;

/// Engine generics pinned to the infra implementations.
pub type ConcreteEngine = InteractionEngine<
    SqliteMemoryRepository,
    SqliteConversationRepository,
    SqliteInteractionLedger,
    SqliteDirectiveRepository,
    BlueskyClient,
>;

pub type ConcreteMemoryService = MemoryService<SqliteMemoryRepository>;

/// Configuration plus an open, verified store.
pub struct AppState {
    pub config: AgentConfig,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    pub blocklist: Blocklist,
}

impl AppState {
    /// Load configuration, open the database, and verify it.
    ///
    /// A failed migration or integrity check stops here, before any
    /// interaction is processed.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir()?;
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_config(&data_dir).await?;

        let db_pool = DatabasePool::new(&database_url(&data_dir))
            .await
            .context("failed to open the agent database")?;
        db_pool.check_integrity().await?;

        let blocklist = Blocklist::load(&SqliteMemoryRepository::new(db_pool.clone())).await?;

        tracing::debug!(data_dir = %data_dir.display(), "Storage ready");
        Ok(Self {
            config,
            data_dir,
            db_pool,
            blocklist,
        })
    }

    pub fn memory_repo(&self) -> SqliteMemoryRepository {
        SqliteMemoryRepository::new(self.db_pool.clone())
    }

    pub fn conversation_repo(&self) -> SqliteConversationRepository {
        SqliteConversationRepository::new(self.db_pool.clone())
    }

    pub fn ledger(&self) -> SqliteInteractionLedger {
        SqliteInteractionLedger::new(self.db_pool.clone())
    }

    pub fn directive_repo(&self) -> SqliteDirectiveRepository {
        SqliteDirectiveRepository::new(self.db_pool.clone())
    }

    /// Provider for the configured model endpoint.
    pub fn provider(&self, credentials: &Credentials) -> BoxLlmProvider {
        create_provider(&self.config, credentials.openrouter_api_key.clone())
    }

    fn model_client(&self, credentials: &Credentials) -> ModelClient {
        ModelClient::new(
            Arc::new(self.provider(credentials)),
            self.config.model.clone(),
            RetryPolicy::from(&self.config.retry),
        )
    }

    /// Memory service backed by the model, for commands that summarize.
    pub fn memory_service(&self) -> anyhow::Result<ConcreteMemoryService> {
        let credentials = Credentials::from_env()?;
        Ok(MemoryService::new(
            self.memory_repo(),
            self.model_client(&credentials),
            self.blocklist.clone(),
        ))
    }

    /// Log in to Bluesky and assemble the interaction engine.
    pub async fn engine(&self) -> anyhow::Result<ConcreteEngine> {
        let credentials = Credentials::from_env()?;
        let social = BlueskyClient::new(
            &self.config.service_url,
            &credentials.bluesky_handle,
            credentials.bluesky_password.clone(),
        )?;
        let bot = social.login().await.context("Bluesky login failed")?;

        let stores = Stores {
            memory: self.memory_repo(),
            conversations: self.conversation_repo(),
            ledger: self.ledger(),
            directives: self.directive_repo(),
        };
        Ok(InteractionEngine::new(
            self.config.clone(),
            bot,
            self.model_client(&credentials),
            social,
            stores,
            self.blocklist.clone(),
        ))
    }
}

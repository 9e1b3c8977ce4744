use thiserror::Error;

use crate::llm::LlmError;

/// Errors from repository operations (used by trait definitions in aura-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store integrity check failed: {0}")]
    Corrupted(String),
}

/// Errors from the social-network client.
#[derive(Debug, Error)]
pub enum SocialError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("rate limited")]
    RateLimited,

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl SocialError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SocialError::Network(_) | SocialError::RateLimited => true,
            SocialError::Http { status, .. } => *status >= 500,
            SocialError::Auth(_) | SocialError::Decode(_) | SocialError::NotFound(_) => false,
        }
    }
}

/// Errors loading startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("missing required environment variable {0}")]
    MissingEnv(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure taxonomy of the decision & memory engine.
///
/// Router ambiguity never appears here: an unparseable classification falls
/// back to a plain reply inside the router.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A memory write by a non-owner, or an admin-only command by a non-admin.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("safety check rejected topic '{topic}'")]
    SafetyCheckFailed { topic: String },

    #[error("generated text contains blocklisted term '{term}'")]
    BlocklistViolation { term: String },

    #[error("model call failed: {0}")]
    ModelCall(#[from] LlmError),

    #[error("social network call failed: {0}")]
    SocialCall(#[from] SocialError),

    /// A later segment failed after earlier ones were already published.
    #[error("thread partially published ({published} of {total} segments): {source}")]
    PartialThreadPublish {
        published: usize,
        total: usize,
        source: SocialError,
    },

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl AgentError {
    /// Model or social API failures that survived the bounded retry policy.
    pub fn is_external_call_failure(&self) -> bool {
        matches!(self, AgentError::ModelCall(_) | AgentError::SocialCall(_))
    }
}

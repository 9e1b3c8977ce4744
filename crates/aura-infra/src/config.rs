//! Configuration loader for Aura.
//!
//! Reads `config.toml` from the data directory (`~/.aura/` by default) and
//! deserializes it into [`AgentConfig`]. A missing file means defaults; a
//! file that exists but cannot be read or parsed is a hard error.
//!
//! Credentials never live in the file. They come from the environment and
//! are wrapped in [`SecretString`] as soon as they are read.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use aura_types::config::AgentConfig;
use aura_types::error::ConfigError;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "AURA_DATA_DIR";
pub const BLUESKY_HANDLE_ENV: &str = "BLUESKY_HANDLE";
pub const BLUESKY_PASSWORD_ENV: &str = "BLUESKY_PASSWORD";
pub const OPENROUTER_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Smallest segment length that still leaves room for a `" (n/m)"` suffix.
const MIN_POST_LENGTH: usize = 32;

/// Resolve the data directory: `$AURA_DATA_DIR`, else `~/.aura`.
pub fn resolve_data_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".aura"))
        .ok_or_else(|| ConfigError::Invalid(format!("cannot determine home directory; set {DATA_DIR_ENV}")))
}

/// Load agent configuration from `{data_dir}/config.toml`.
pub async fn load_config(data_dir: &Path) -> Result<AgentConfig, ConfigError> {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return Ok(AgentConfig::default());
        }
        Err(err) => {
            return Err(ConfigError::Read {
                path: config_path.display().to_string(),
                message: err.to_string(),
            });
        }
    };

    let config = toml::from_str::<AgentConfig>(&content).map_err(|err| ConfigError::Parse {
        path: config_path.display().to_string(),
        message: err.to_string(),
    })?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &AgentConfig) -> Result<(), ConfigError> {
    if config.streak_limit == 0 {
        return Err(ConfigError::Invalid("streak_limit must be at least 1".into()));
    }
    if config.post_max_length < MIN_POST_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "post_max_length must be at least {MIN_POST_LENGTH}"
        )));
    }
    if config.poll_interval_secs == 0 || config.summary_interval_secs == 0 {
        return Err(ConfigError::Invalid("intervals must be greater than zero".into()));
    }
    if config.model.trim().is_empty() {
        return Err(ConfigError::Invalid("model must not be empty".into()));
    }
    Ok(())
}

/// Account and API credentials read from the environment.
pub struct Credentials {
    pub bluesky_handle: String,
    pub bluesky_password: SecretString,
    pub openrouter_api_key: SecretString,
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let require = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnv(name.to_string()))
        };
        Ok(Self {
            bluesky_handle: require(BLUESKY_HANDLE_ENV)?.trim().trim_start_matches('@').to_string(),
            bluesky_password: SecretString::from(require(BLUESKY_PASSWORD_ENV)?),
            openrouter_api_key: SecretString::from(require(OPENROUTER_API_KEY_ENV)?),
        })
    }
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that overrides `[database] url`.
pub const DATABASE_URL_ENV: &str = "SQLCHAT_DATABASE_URL";
/// Environment variable that overrides `[ai] model`.
pub const MODEL_ENV: &str = "SQLCHAT_MODEL";
/// Environment variable that overrides `[ai] url`.
pub const MODEL_URL_ENV: &str = "SQLCHAT_MODEL_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error(
        "no database url configured; set SQLCHAT_DATABASE_URL, [database] url, or \
         DATABASE_USER/USER_PASSWORD/DATABASE_ENDPOINT/DATABASE_SCHEMA"
    )]
    MissingDatabaseUrl,

    #[error("environment variable {0} is not set")]
    MissingApiKey(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SqlChatConfig {
    pub database: DatabaseConfig,
    pub ai: AIConfig,
    pub agent: AgentConfig,
}

impl SqlChatConfig {
    /// Loads `$HOME/.config/sqlchat/config.toml`, falling back to defaults when the file
    /// is missing or unreadable. Environment overrides are applied either way.
    pub fn get_or_default() -> Self {
        let mut conf = match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path).unwrap_or_else(|err| {
                tracing::warn!("{err}, using defaults");
                SqlChatConfig::default()
            }),
            _ => SqlChatConfig::default(),
        };
        conf.apply_env(|key| std::env::var(key).ok());
        conf
    }

    pub fn default_path() -> Option<PathBuf> {
        let home_dir = std::env::var("HOME").ok()?;
        Some(PathBuf::from(format!("{home_dir}/.config/sqlchat/config.toml")))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config_file = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&config_file).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `SQLCHAT_*` overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.database.url = Some(url);
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.is_empty()) {
            self.ai.model = model;
        }
        if let Some(url) = lookup(MODEL_URL_ENV).filter(|v| !v.is_empty()) {
            self.ai.url = url;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub query_timeout_secs: u64,
    /// Sample rows included when a table is described.
    pub sample_rows: usize,
    /// When non-empty, only these tables are exposed.
    pub include_tables: Vec<String>,
    pub ignore_tables: Vec<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
            acquire_timeout_secs: 10,
            query_timeout_secs: 30,
            sample_rows: 3,
            include_tables: vec![],
            ignore_tables: vec![],
        }
    }
}

impl DatabaseConfig {
    pub fn resolve_url(&self) -> Result<String, ConfigError> {
        self.resolve_url_with(|key| std::env::var(key).ok())
    }

    /// Resolves the connection url. An explicit url wins; otherwise a `MySQL` url is composed
    /// from `DATABASE_USER`, `USER_PASSWORD`, `DATABASE_ENDPOINT` and `DATABASE_SCHEMA`.
    pub fn resolve_url_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ConfigError> {
        if let Some(url) = self.url.as_ref().filter(|u| !u.is_empty()) {
            return Ok(url.clone());
        }

        let user = lookup("DATABASE_USER").ok_or(ConfigError::MissingDatabaseUrl)?;
        let password = lookup("USER_PASSWORD").unwrap_or_default();
        let endpoint = lookup("DATABASE_ENDPOINT").ok_or(ConfigError::MissingDatabaseUrl)?;
        let schema = lookup("DATABASE_SCHEMA").ok_or(ConfigError::MissingDatabaseUrl)?;

        let host = if endpoint.contains(':') {
            endpoint
        } else {
            format!("{endpoint}:3306")
        };
        let credentials = if password.is_empty() {
            user
        } else {
            format!("{user}:{password}")
        };

        Ok(format!("mysql://{credentials}@{host}/{schema}"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Any `OpenAI`-compatible chat completions endpoint (`OpenAI`, `Ollama`, `vLLM`, ...).
    #[default]
    OpenAI,
    Azure,
    /// In-process model through mistral.rs; requires the `local` feature.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AIConfig {
    pub provider: Provider,
    pub model: String,
    pub url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Required by Azure deployments.
    pub api_version: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for AIConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAI,
            model: "qwen3:8b".to_string(),
            url: "http://localhost:11434/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_version: None,
            temperature: 0.0,
            timeout_secs: 60,
        }
    }
}

impl AIConfig {
    /// Reads the API key from the configured environment variable. Local endpoints such as
    /// `Ollama` accept requests without one, so absence is not an error here.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }

    pub fn require_api_key(&self) -> Result<String, ConfigError> {
        self.api_key()
            .ok_or_else(|| ConfigError::MissingApiKey(self.api_key_env.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Upper bound on model invocations per user turn.
    pub max_iterations: usize,
    /// Row cap the model is asked to respect when it writes queries.
    pub top_k: usize,
    pub max_result_chars: usize,
    pub intro_message: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            top_k: 5,
            max_result_chars: 4000,
            intro_message: "Hi! I'm your SQL Assistant. What would you like to know?".to_string(),
        }
    }
}

use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Ragmill server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores chunk vectors.
    pub qdrant_url: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL for the OpenAI-compatible embedding and chat APIs.
    pub openai_base_url: Option<String>,
    /// API key for the OpenAI-compatible endpoints.
    pub openai_api_key: Option<String>,
    /// Chat model used for generation, summaries, and tag extraction.
    pub chat_model: String,
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Overlap window in characters carried between adjacent chunks.
    pub chunk_overlap: usize,
    /// Default number of hits returned by searches.
    pub search_default_limit: usize,
    /// Upper bound on the number of hits a caller may request.
    pub search_max_limit: usize,
    /// Minimum similarity score accepted by default.
    pub search_default_score_threshold: f32,
    /// Capacity of the background processing queue.
    pub queue_capacity: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
    /// Deterministic local encoder, useful for tests and offline runs.
    Deterministic,
}

const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_CHUNK_SIZE: usize = 1000;
const DEFAULT_CHUNK_OVERLAP: usize = 200;
const DEFAULT_QUEUE_CAPACITY: usize = 64;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let chunk_size = parse_optional("CHUNK_SIZE")?.unwrap_or(DEFAULT_CHUNK_SIZE);
        let chunk_overlap = parse_optional("CHUNK_OVERLAP")?.unwrap_or(DEFAULT_CHUNK_OVERLAP);
        if chunk_size == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_SIZE".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::InvalidValue("CHUNK_OVERLAP".into()));
        }

        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: load_env("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            openai_base_url: load_env_optional("OPENAI_BASE_URL"),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            chat_model: load_env_optional("CHAT_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            chunk_size,
            chunk_overlap,
            search_default_limit: parse_optional("SEARCH_DEFAULT_LIMIT")?.unwrap_or(5),
            search_max_limit: parse_optional("SEARCH_MAX_LIMIT")?.unwrap_or(50),
            search_default_score_threshold: load_env_optional("SEARCH_SCORE_THRESHOLD")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SEARCH_SCORE_THRESHOLD".into()))
                })
                .transpose()?
                .unwrap_or(0.25),
            queue_capacity: parse_optional("QUEUE_CAPACITY")?.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional(key: &str) -> Result<Option<usize>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "deterministic" => Ok(Self::Deterministic),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        embedding_provider = ?config.embedding_provider,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        queue_capacity = config.queue_capacity,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

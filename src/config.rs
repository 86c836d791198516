use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Upper bound for any day offset or spacing, in config or in a request.
pub const MAX_SCHEDULE_DAYS: u32 = 3650;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogConfig {
    /// Seed for the synthetic signal draw. Unset means a fresh draw per start.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for Ollama (default: `http://localhost:11434`).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hashing".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "disabled".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmentationConfig {
    /// Days between today and the first send.
    #[serde(default = "default_lead_time_days")]
    pub lead_time_days: u32,
    /// Days between consecutive sends when frequency > 1.
    #[serde(default = "default_day_spacing")]
    pub day_spacing: u32,
    /// Audience size used when the request's target count cannot be parsed.
    #[serde(default = "default_fallback_target_count")]
    pub fallback_target_count: u64,
    /// Number of top-ranked features passed to the generator as context.
    #[serde(default = "default_context_features")]
    pub context_features: usize,
    /// Segment names must be shorter than this many characters.
    #[serde(default = "default_name_max_chars")]
    pub name_max_chars: usize,
    #[serde(default = "default_traits_max_chars")]
    pub traits_max_chars: usize,
    #[serde(default = "default_traits_max_lines")]
    pub traits_max_lines: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            lead_time_days: default_lead_time_days(),
            day_spacing: default_day_spacing(),
            fallback_target_count: default_fallback_target_count(),
            context_features: default_context_features(),
            name_max_chars: default_name_max_chars(),
            traits_max_chars: default_traits_max_chars(),
            traits_max_lines: default_traits_max_lines(),
        }
    }
}

fn default_lead_time_days() -> u32 {
    7
}
fn default_day_spacing() -> u32 {
    3
}
fn default_fallback_target_count() -> u64 {
    900_000
}
fn default_context_features() -> usize {
    5
}
fn default_name_max_chars() -> usize {
    20
}
fn default_traits_max_chars() -> usize {
    100
}
fn default_traits_max_lines() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// Offline configuration: hashing embedder, generation disabled.
    ///
    /// Used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
pub fn load_or_minimal(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(path = %path.display(), "config file not found, using offline defaults");
        Ok(Config::minimal())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.segmentation.context_features == 0 {
        anyhow::bail!("segmentation.context_features must be >= 1");
    }

    if config.segmentation.name_max_chars == 0 || config.segmentation.traits_max_chars == 0 {
        anyhow::bail!("segmentation length budgets must be > 0");
    }

    if config.segmentation.lead_time_days > MAX_SCHEDULE_DAYS {
        anyhow::bail!("segmentation.lead_time_days must be <= {}", MAX_SCHEDULE_DAYS);
    }

    if config.segmentation.day_spacing > MAX_SCHEDULE_DAYS {
        anyhow::bail!("segmentation.day_spacing must be <= {}", MAX_SCHEDULE_DAYS);
    }

    match config.embedding.provider.as_str() {
        "disabled" | "hashing" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hashing, openai, or ollama.",
            other
        ),
    }

    if config.embedding.provider == "hashing" && config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }

    match config.generation.provider.as_str() {
        "disabled" => {}
        "openai" | "ollama" => {
            if config.generation.model.is_none() {
                anyhow::bail!(
                    "generation.model must be specified when provider is '{}'",
                    config.generation.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

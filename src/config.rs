use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SlpConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub matching: MatchingConfig,
    pub capture: CaptureConfig,
    pub learning: LearningConfig,
    pub lifecycle: LifecycleConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `"local"` (ONNX all-MiniLM-L6-v2) or `"hashing"` (no model files).
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

/// Knobs for program lookup.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum combined similarity for a program to count as a match.
    pub similarity_threshold: f64,
    /// Programs below this confidence are never returned.
    pub min_confidence: f64,
    /// Share of the combined score taken by query-embedding cosine similarity.
    pub semantic_weight: f64,
    /// KNN candidate pool size pulled from the vector index.
    pub max_candidates: usize,
    pub max_results: usize,
    pub allow_experimental: bool,
}

/// Gates for turning a successful execution into a new program.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CaptureConfig {
    pub enabled: bool,
    pub min_quality: f64,
    pub max_latency_ms: u64,
    pub min_response_chars: usize,
    /// Combined similarity above which a capture refreshes an existing program.
    pub dedup_similarity: f64,
    pub initial_confidence: f64,
}

/// How execution outcomes move a program's confidence.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LearningConfig {
    pub success_rate: f64,
    pub failure_penalty: f64,
    pub feedback_weight: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LifecycleConfig {
    pub promotion_min_uses: u32,
    pub promotion_min_success_rate: f64,
    pub retirement_min_uses: u32,
    pub retirement_success_floor: f64,
    pub confidence_floor: f64,
    pub decay_factor: f64,
    pub decay_idle_days: u64,
    pub evict_retired_after_days: u64,
    pub max_programs: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ValidationConfig {
    pub max_template_chars: usize,
    pub max_tokens: u32,
    pub max_documents: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 8765,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_slp_dir()
            .join("programs.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_slp_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.80,
            min_confidence: 0.50,
            semantic_weight: 0.30,
            max_candidates: 25,
            max_results: 3,
            allow_experimental: true,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_quality: 0.70,
            max_latency_ms: 60_000,
            min_response_chars: 40,
            dedup_similarity: 0.97,
            initial_confidence: 0.60,
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            success_rate: 0.10,
            failure_penalty: 0.20,
            feedback_weight: 0.30,
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            promotion_min_uses: 3,
            promotion_min_success_rate: 0.80,
            retirement_min_uses: 5,
            retirement_success_floor: 0.40,
            confidence_floor: 0.15,
            decay_factor: 0.98,
            decay_idle_days: 7,
            evict_retired_after_days: 30,
            max_programs: 1000,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_template_chars: 8000,
            max_tokens: 32_768,
            max_documents: 100,
        }
    }
}

/// Returns `~/.slp/`
pub fn default_slp_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".slp")
}

/// Returns the default config file path: `~/.slp/config.toml`
pub fn default_config_path() -> PathBuf {
    default_slp_dir().join("config.toml")
}

impl SlpConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            SlpConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (SLP_DB, SLP_LOG_LEVEL, SLP_EMBEDDING_PROVIDER).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SLP_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("SLP_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("SLP_EMBEDDING_PROVIDER") {
            self.embedding.provider = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

//! Configuration
//!
//! Resolved in two layers:
//! 1. Optional TOML file (`~/.config/pennywise/config.toml` or `--config`)
//! 2. Environment variable overrides
//!
//! ```toml
//! db_path = "/home/me/.local/share/pennywise/pennywise.db"
//! sync_interval_ms = 1000
//!
//! [ai]
//! backend = "gemini"          # gemini | openai_compatible | mock
//! api_key = "..."
//! model = "gemini-2.5-flash"
//! host = "https://generativelanguage.googleapis.com"
//! timeout_secs = 30
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::insight::gemini::{DEFAULT_GEMINI_HOST, DEFAULT_GEMINI_MODEL};
use crate::insight::openai_compatible::DEFAULT_OPENAI_MODEL;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SYNC_INTERVAL_MS: u64 = 1000;

/// Which insight backend to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Gemini,
    OpenAICompatible,
    Mock,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAICompatible => "openai_compatible",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                Ok(Self::OpenAICompatible)
            }
            "mock" => Ok(Self::Mock),
            other => Err(Error::Config(format!("Unknown AI backend: {}", other))),
        }
    }
}

/// Insight backend settings
#[derive(Debug, Clone, PartialEq)]
pub struct InsightConfig {
    pub backend: BackendKind,
    /// Missing or empty means no credential: insights run offline
    pub api_key: Option<String>,
    pub host: Option<String>,
    pub model: Option<String>,
    pub timeout: Duration,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            api_key: None,
            host: None,
            model: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl InsightConfig {
    /// Configured model, or the backend's default
    pub fn model_or_default(&self) -> &str {
        match (&self.model, self.backend) {
            (Some(model), _) => model.as_str(),
            (None, BackendKind::Gemini) => DEFAULT_GEMINI_MODEL,
            (None, BackendKind::OpenAICompatible) => DEFAULT_OPENAI_MODEL,
            (None, BackendKind::Mock) => "mock",
        }
    }

    /// Configured host, or the backend's default (OpenAI-compatible has none)
    pub fn host_or_default(&self) -> Option<&str> {
        match (&self.host, self.backend) {
            (Some(host), _) => Some(host.as_str()),
            (None, BackendKind::Gemini) => Some(DEFAULT_GEMINI_HOST),
            (None, _) => None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    /// How often the background task polls storage for external writes
    pub sync_interval: Duration,
    pub insight: InsightConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            sync_interval: Duration::from_millis(DEFAULT_SYNC_INTERVAL_MS),
            insight: InsightConfig::default(),
        }
    }
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pennywise").join("config.toml"))
}

/// Default database location
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pennywise")
        .join("pennywise.db")
}

impl Config {
    /// Load from file then process environment
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(default_path) if default_path.exists() => Self::from_file(&default_path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = Self::default();

        if let Some(db_path) = raw.db_path {
            config.db_path = db_path;
        }
        if let Some(ms) = raw.sync_interval_ms {
            config.sync_interval = Duration::from_millis(ms.max(1));
        }

        if let Some(ai) = raw.ai {
            if let Some(backend) = ai.backend {
                config.insight.backend = backend.parse()?;
            }
            config.insight.api_key = non_empty(ai.api_key);
            config.insight.host = non_empty(ai.host);
            config.insight.model = non_empty(ai.model);
            if let Some(secs) = ai.timeout_secs {
                config.insight.timeout = Duration::from_secs(secs);
            }
        }

        Ok(config)
    }

    /// Apply environment overrides through `lookup`
    ///
    /// Backend-specific variables are read for the backend in effect after
    /// `AI_BACKEND` is applied. Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| non_empty(lookup(key));

        if let Some(db) = var("PENNYWISE_DB") {
            self.db_path = PathBuf::from(db);
        }

        if let Some(backend) = var("AI_BACKEND") {
            match backend.parse() {
                Ok(kind) => self.insight.backend = kind,
                Err(_) => warn!(backend = %backend, "Unknown AI_BACKEND, keeping {}", self.insight.backend.as_str()),
            }
        }

        match self.insight.backend {
            BackendKind::Gemini => {
                if let Some(key) = var("GEMINI_API_KEY").or_else(|| var("API_KEY")) {
                    self.insight.api_key = Some(key);
                }
                if let Some(model) = var("GEMINI_MODEL") {
                    self.insight.model = Some(model);
                }
                if let Some(host) = var("GEMINI_HOST") {
                    self.insight.host = Some(host);
                }
            }
            BackendKind::OpenAICompatible => {
                if let Some(key) = var("OPENAI_COMPATIBLE_API_KEY") {
                    self.insight.api_key = Some(key);
                }
                if let Some(model) = var("OPENAI_COMPATIBLE_MODEL") {
                    self.insight.model = Some(model);
                }
                if let Some(host) = var("OPENAI_COMPATIBLE_HOST") {
                    self.insight.host = Some(host);
                }
            }
            BackendKind::Mock => {}
        }

        if let Some(secs) = var("AI_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(secs) => self.insight.timeout = Duration::from_secs(secs),
                Err(_) => warn!(value = %secs, "Ignoring invalid AI_TIMEOUT_SECS"),
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Raw TOML layout

#[derive(Debug, Deserialize)]
struct RawConfig {
    db_path: Option<PathBuf>,
    sync_interval_ms: Option<u64>,
    ai: Option<RawInsight>,
}

#[derive(Debug, Deserialize)]
struct RawInsight {
    backend: Option<String>,
    api_key: Option<String>,
    host: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

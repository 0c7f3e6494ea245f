//! Persona configuration system.
//!
//! Values come from `~/.persona/config.toml` (or an explicit path), then the
//! process environment overrides them using the variable names listed on each
//! field.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{PersonaError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl PersonaConfig {
    /// Load from the default path (missing file means defaults), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Load config from a specific path. No environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PersonaError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PersonaError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup. Empty values are ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PERSON_NAME") {
            self.identity.name = v;
        }
        if let Some(v) = get("SUMMARY_PATH") {
            self.documents.summary_path = v;
        }
        if let Some(v) = get("RESUME_PDF") {
            self.documents.resume_path = v;
        }
        override_parsed(&get, "RAG_CHUNK_SIZE", &mut self.rag.chunk_size)?;
        override_parsed(&get, "RAG_CHUNK_OVERLAP", &mut self.rag.chunk_overlap)?;
        override_parsed(&get, "RAG_RETRIEVAL_K", &mut self.rag.retrieval_k)?;
        override_parsed(&get, "MAX_HISTORY_TURNS", &mut self.agent.max_history_turns)?;
        if let Some(v) = get("OPENAI_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Some(v) = get("PUSHOVER_TOKEN") {
            self.notify.pushover_token = v;
        }
        if let Some(v) = get("PUSHOVER_USER") {
            self.notify.pushover_user = v;
        }
        Ok(())
    }

    /// Reject parameter combinations the chunker and loop cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.rag.chunk_size == 0 {
            return Err(PersonaError::Config("rag.chunk_size must be positive".into()));
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(PersonaError::Config(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if self.rag.retrieval_k == 0 {
            return Err(PersonaError::Config("rag.retrieval_k must be positive".into()));
        }
        if self.agent.max_tool_rounds == 0 {
            return Err(PersonaError::Config("agent.max_tool_rounds must be positive".into()));
        }
        if self.identity.name.trim().is_empty() {
            return Err(PersonaError::Config("identity.name must not be empty".into()));
        }
        Ok(())
    }

    /// Summary document path, resolved against `documents.base_dir`.
    pub fn summary_path(&self) -> PathBuf {
        self.documents.resolve(&self.documents.summary_path)
    }

    /// Resume document path, resolved against `documents.base_dir`.
    pub fn resume_path(&self) -> PathBuf {
        self.documents.resolve(&self.documents.resume_path)
    }

    /// Index directory, resolved against `documents.base_dir`.
    pub fn index_dir(&self) -> PathBuf {
        self.documents.resolve(&self.rag.index_dir)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Persona home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".persona")
    }
}

fn override_parsed<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> Result<()>
where
    T::Err: std::fmt::Display,
{
    if let Some(raw) = get(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| PersonaError::Config(format!("{key}={raw:?} is invalid: {e}")))?;
    }
    Ok(())
}

/// Who the agent speaks as.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_person_name")]
    pub name: String,
}

fn default_person_name() -> String { "Abiddhanani".into() }

impl Default for IdentityConfig {
    fn default() -> Self {
        Self { name: default_person_name() }
    }
}

/// Source documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    /// Base for relative paths. Empty means the working directory.
    #[serde(default)]
    pub base_dir: String,
    #[serde(default = "default_summary_path")]
    pub summary_path: String,
    #[serde(default = "default_resume_path")]
    pub resume_path: String,
}

fn default_summary_path() -> String { "me/summary.txt".into() }
fn default_resume_path() -> String { "me/resume.pdf".into() }

impl DocumentsConfig {
    fn resolve(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() || self.base_dir.is_empty() {
            path
        } else {
            PathBuf::from(&self.base_dir).join(path)
        }
    }
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            base_dir: String::new(),
            summary_path: default_summary_path(),
            resume_path: default_resume_path(),
        }
    }
}

/// Chunking and retrieval parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_retrieval_k")]
    pub retrieval_k: usize,
    #[serde(default = "default_index_dir")]
    pub index_dir: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_chunk_size() -> usize { 600 }
fn default_chunk_overlap() -> usize { 100 }
fn default_retrieval_k() -> usize { 5 }
fn default_index_dir() -> String { ".persona_index".into() }
fn default_collection() -> String { "profile".into() }

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            retrieval_k: default_retrieval_k(),
            index_dir: default_index_dir(),
            collection: default_collection(),
        }
    }
}

/// Chat and embedding API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_model() -> String { "gpt-4o-mini".into() }
fn default_base_url() -> String { "https://api.openai.com/v1".into() }
fn default_embedding_model() -> String { "text-embedding-3-small".into() }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key: String::new(),
            temperature: None,
            embedding_model: default_embedding_model(),
        }
    }
}

/// Conversation loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// User/assistant pairs kept from prior history. 0 keeps everything.
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
    /// Tool rounds allowed per turn before giving up.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

fn default_max_history_turns() -> usize { 10 }
fn default_max_tool_rounds() -> usize { 10 }

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_history_turns: default_max_history_turns(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

/// Pushover credentials. Both empty disables notifications.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub pushover_token: String,
    #[serde(default)]
    pub pushover_user: String,
}

/// Chat widget server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 { 7860 }
fn default_host() -> String { "127.0.0.1".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

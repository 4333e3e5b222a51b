//! Configuration for lexllm services.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (LEXLLM_DB_HOST / DB_HOST, OPENAI_API_KEY,
//!    OPENAI_BASE_URL, OPENROUTER_API_KEY, OPENROUTER_BASE_URL, LEXLLM_ADDRESS)
//! 2. Config file (.lexllm/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .lexllm/config.yaml
//! - Falls back to <user config dir>/lexllm/config.yaml

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::llm::{openai, openrouter};

pub const DEFAULT_DB_HOST: &str = "http://localhost:8000";
pub const DEFAULT_ADDRESS: &str = "0.0.0.0:8000";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub lex_db: Option<LexDbConfig>,
    #[serde(default)]
    pub openai: Option<ProviderConfig>,
    #[serde(default)]
    pub openrouter: Option<ProviderConfig>,
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LexDbConfig {
    pub host: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub address: Option<String>,
}

/// Connection settings for one model provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl ProviderSettings {
    /// API key with everything but the last four characters hidden
    pub fn masked_key(&self) -> String {
        match self.api_key.as_deref() {
            None => "(not set)".to_string(),
            Some(key) if key.chars().count() <= 4 => "****".to_string(),
            Some(key) => {
                let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
                format!("****{}", tail)
            }
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Base URL of the Lex DB service
    pub lex_db_host: String,
    pub openai: ProviderSettings,
    pub openrouter: ProviderSettings,
    /// Address the HTTP server binds to
    pub server_address: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            lex_db_host: DEFAULT_DB_HOST.to_string(),
            openai: ProviderSettings {
                api_key: None,
                base_url: openai::DEFAULT_BASE_URL.to_string(),
            },
            openrouter: ProviderSettings {
                api_key: None,
                base_url: openrouter::DEFAULT_BASE_URL.to_string(),
            },
            server_address: DEFAULT_ADDRESS.to_string(),
            config_file: None,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let config_path = current.join(".lexllm").join("config.yaml");
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }
    }

    let user_config = dirs::config_dir()?.join("lexllm").join("config.yaml");
    user_config.exists().then_some(user_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Non-empty environment variable
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Merge file values and environment lookups over the defaults
fn resolve(
    file: Option<ConfigFile>,
    config_file: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let defaults = ResolvedConfig::default();
    let file_lex_db = file.as_ref().and_then(|f| f.lex_db.as_ref());
    let file_openai = file.as_ref().and_then(|f| f.openai.as_ref());
    let file_openrouter = file.as_ref().and_then(|f| f.openrouter.as_ref());
    let file_server = file.as_ref().and_then(|f| f.server.as_ref());

    let lex_db_host = env("LEXLLM_DB_HOST")
        .or_else(|| env("DB_HOST"))
        .or_else(|| file_lex_db.and_then(|c| c.host.clone()))
        .unwrap_or(defaults.lex_db_host);

    let provider = |prefix: &str, file: Option<&ProviderConfig>, default: ProviderSettings| {
        ProviderSettings {
            api_key: env(&format!("{}_API_KEY", prefix))
                .or_else(|| file.and_then(|c| c.api_key.clone()))
                .or(default.api_key),
            base_url: env(&format!("{}_BASE_URL", prefix))
                .or_else(|| file.and_then(|c| c.base_url.clone()))
                .unwrap_or(default.base_url),
        }
    };

    let openai = provider("OPENAI", file_openai, defaults.openai);
    let openrouter = provider("OPENROUTER", file_openrouter, defaults.openrouter);

    let server_address = env("LEXLLM_ADDRESS")
        .or_else(|| file_server.and_then(|c| c.address.clone()))
        .unwrap_or(defaults.server_address);

    ResolvedConfig {
        lex_db_host,
        openai,
        openrouter,
        server_address,
        config_file,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();

    let file = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    Ok(resolve(file, config_file, env_var))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

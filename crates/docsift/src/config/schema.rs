use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite file. Defaults to `~/.docsift/data/docsift.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_upload_directory() -> String {
    "uploads".to_string()
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_worker_count() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            upload_directory: default_upload_directory(),
            max_upload_bytes: default_max_upload_bytes(),
            worker_count: default_worker_count(),
            ocr: OcrConfig::default(),
            ai: AiConfig::default(),
            extraction: ExtractionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Resolved database location, falling back to the per-user default.
    pub fn database_path(&self) -> Option<PathBuf> {
        match self.database_path {
            Some(ref p) => Some(PathBuf::from(p)),
            None => crate::db::default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_languages(),
        }
    }
}

/// Settings for the language-model extraction strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// OpenAI-compatible chat completions URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// File holding the API key (Docker secrets). Checked before the env var.
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Characters of document text sent with each request.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_ai_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    1
}

fn default_max_text_chars() -> usize {
    3000
}

fn default_max_tokens() -> u32 {
    500
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            api_key_file: None,
            timeout_secs: default_ai_timeout(),
            max_retries: default_max_retries(),
            max_text_chars: default_max_text_chars(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
        }
    }
}

impl AiConfig {
    /// Looks up the API key: the key file first, then the environment
    /// variable. Blank values count as absent.
    pub fn resolve_api_key(&self) -> Option<SecretString> {
        if let Some(ref path) = self.api_key_file {
            match std::fs::read_to_string(path) {
                Ok(content) if !content.trim().is_empty() => {
                    return Some(SecretString::from(content.trim().to_string()));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Could not read API key file: {}", e);
                }
            }
        }

        match std::env::var(&self.api_key_env) {
            Ok(value) if !value.trim().is_empty() => {
                Some(SecretString::from(value.trim().to_string()))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Prefix of extracted text stored alongside the structured data.
    #[serde(default = "default_raw_text_sample_chars")]
    pub raw_text_sample_chars: usize,
}

fn default_raw_text_sample_chars() -> usize {
    1000
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            raw_text_sample_chars: default_raw_text_sample_chars(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

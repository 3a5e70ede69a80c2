use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

/// JSON Schema (draft 2020-12) for config files, version 1.
pub const SCHEMA_JSON: &str = r##"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "title": "docsift configuration",
  "type": "object",
  "required": ["version"],
  "additionalProperties": false,
  "properties": {
    "version": { "type": "string" },
    "database_path": { "type": ["string", "null"] },
    "upload_directory": { "type": "string" },
    "max_upload_bytes": { "type": "integer", "minimum": 1 },
    "worker_count": { "type": "integer", "minimum": 1 },
    "ocr": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "enabled": { "type": "boolean" },
        "languages": {
          "type": "array",
          "items": { "type": "string", "pattern": "^[A-Za-z_]+$" }
        }
      }
    },
    "ai": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "enabled": { "type": "boolean" },
        "endpoint": { "type": "string", "pattern": "^https?://" },
        "model": { "type": "string", "minLength": 1 },
        "api_key_env": { "type": "string", "minLength": 1 },
        "api_key_file": { "type": ["string", "null"] },
        "timeout_secs": { "type": "integer", "minimum": 1 },
        "max_retries": { "type": "integer", "minimum": 0 },
        "max_text_chars": { "type": "integer", "minimum": 1 },
        "max_tokens": { "type": "integer", "minimum": 1 },
        "temperature": { "type": "number", "minimum": 0, "maximum": 2 }
      }
    },
    "extraction": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "raw_text_sample_chars": { "type": "integer", "minimum": 1 }
      }
    },
    "logging": {
      "type": "object",
      "additionalProperties": false,
      "properties": {
        "level": { "type": "string" },
        "format": { "enum": ["text", "json"] }
      }
    }
  }
}"##;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Checks the rules a schema cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.upload_directory.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "upload_directory must not be empty".to_string(),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.ai.max_text_chars == 0 {
        return Err(ConfigError::Validation {
            message: "ai.max_text_chars must be at least 1".to_string(),
        });
    }

    if config.extraction.raw_text_sample_chars == 0 {
        return Err(ConfigError::Validation {
            message: "extraction.raw_text_sample_chars must be at least 1".to_string(),
        });
    }

    Ok(())
}

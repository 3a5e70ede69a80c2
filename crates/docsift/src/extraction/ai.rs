//! Remote extraction through an OpenAI-compatible chat completions service.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{ExtractionStrategy, StrategyError};
use crate::catalog::DocumentTypeDefinition;
use crate::config::AiConfig;
use crate::model::{ExtractionMethod, StructuredData};

const SYSTEM_PROMPT: &str = "You are a JSON extraction assistant.";

#[derive(Error, Debug)]
pub enum AiError {
    #[error("No API key configured (checked {0})")]
    MissingApiKey(String),

    #[error("Request to extraction service failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Extraction service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response shape: {0}")]
    Shape(String),

    #[error("Response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One round trip to a language model: system and user prompt in, reply text out.
pub trait ChatClient: Send + Sync {
    fn complete(&self, system: &str, prompt: &str) -> Result<String, AiError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

/// Blocking client for `POST {endpoint}` in the OpenAI chat completions format.
pub struct OpenAiClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
    max_retries: u32,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(config: &AiConfig, api_key: SecretString) -> Result<Self, AiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn send_once(&self, body: &ChatRequest<'_>) -> Result<String, AiError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json()?;
        payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AiError::Shape("missing choices[0].message.content".to_string()))
    }
}

impl ChatClient for OpenAiClient {
    fn complete(&self, system: &str, prompt: &str) -> Result<String, AiError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut attempt = 0;
        loop {
            match self.send_once(&body) {
                Ok(content) => return Ok(content),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(attempt, error = %e, "Retrying extraction request");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl AiError {
    /// Transport faults, rate limiting and server errors; other statuses
    /// fail the same way on every attempt.
    fn is_transient(&self) -> bool {
        match self {
            AiError::Request(_) => true,
            AiError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Sends a bounded text excerpt plus the field descriptions to a chat model
/// and parses its JSON reply.
pub struct AiStrategy {
    client: Box<dyn ChatClient>,
    max_text_chars: usize,
}

impl AiStrategy {
    pub fn new(client: Box<dyn ChatClient>, max_text_chars: usize) -> Self {
        Self {
            client,
            max_text_chars,
        }
    }

    /// Builds the strategy from config, resolving the API key.
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            AiError::MissingApiKey(match config.api_key_file {
                Some(ref file) => format!("{} and ${}", file, config.api_key_env),
                None => format!("${}", config.api_key_env),
            })
        })?;
        let client = OpenAiClient::new(config, api_key)?;
        Ok(Self::new(Box::new(client), config.max_text_chars))
    }

    pub fn build_prompt(&self, text: &str, definition: &DocumentTypeDefinition) -> String {
        let fields: String = definition
            .extraction_fields
            .iter()
            .map(|(name, description)| format!("- {}: {}\n", name, description))
            .collect();
        let excerpt: String = text.chars().take(self.max_text_chars).collect();

        format!(
            "Extract structured data from this {} document.\n\n\
             Required fields:\n{}\n\
             Document text:\n{}\n\n\
             Return as JSON. Use ISO format for dates (e.g. 2024-01-31). \
             Use null for fields that are not present.",
            definition.name.to_lowercase(),
            fields,
            excerpt
        )
    }
}

impl ExtractionStrategy for AiStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Ai
    }

    fn extract(
        &self,
        text: &str,
        definition: &DocumentTypeDefinition,
    ) -> Result<StructuredData, StrategyError> {
        let prompt = self.build_prompt(text, definition);
        let reply = self.client.complete(SYSTEM_PROMPT, &prompt)?;
        let object = parse_reply(&reply)?;

        Ok(project_onto_schema(object, definition))
    }
}

/// Decodes a model reply into a JSON object, tolerating code fences and
/// chatter around the object.
pub fn parse_reply(reply: &str) -> Result<serde_json::Map<String, Value>, AiError> {
    let stripped = strip_code_fence(reply);

    let value = match serde_json::from_str::<Value>(stripped) {
        Ok(value) => value,
        Err(e) => match extract_json(stripped) {
            Some(candidate) => serde_json::from_str(candidate)?,
            None => return Err(AiError::Json(e)),
        },
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(AiError::Shape(format!("expected a JSON object, got {}", kind_of(&other)))),
    }
}

fn strip_code_fence(reply: &str) -> &str {
    let mut s = reply.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Returns the first balanced `{...}` span, skipping braces inside strings.
fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&response[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Keeps exactly the schema's fields: unknown keys are dropped and missing
/// ones become `null`.
fn project_onto_schema(
    mut object: serde_json::Map<String, Value>,
    definition: &DocumentTypeDefinition,
) -> StructuredData {
    definition
        .field_names()
        .map(|field| {
            let value = object.remove(field).unwrap_or(Value::Null);
            (field.to_string(), value)
        })
        .collect()
}

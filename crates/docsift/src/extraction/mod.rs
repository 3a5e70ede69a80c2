//! Turns raw document text into structured data for a document type.
//!
//! Two strategies exist: [`ai::AiStrategy`] asks a remote language model and
//! [`template::TemplateStrategy`] applies regular expressions with
//! placeholders. [`StructuredExtractor`] picks between them in one place,
//! [`StructuredExtractor::run_with_fallback`], and never fails.

pub mod ai;
pub mod template;

use std::sync::Arc;

use thiserror::Error;

use crate::catalog::{DocumentTypeDefinition, TypeCatalog};
use crate::config::AiConfig;
use crate::model::{ExtractionMethod, StructuredData};

pub use ai::{AiError, AiStrategy};
pub use template::TemplateStrategy;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error(transparent)]
    Ai(#[from] AiError),
}

/// One way of filling a type's field schema from text.
pub trait ExtractionStrategy: Send + Sync {
    fn method(&self) -> ExtractionMethod;

    fn extract(
        &self,
        text: &str,
        definition: &DocumentTypeDefinition,
    ) -> Result<StructuredData, StrategyError>;
}

/// Structured data plus the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub data: StructuredData,
    pub method: ExtractionMethod,
}

impl Extraction {
    fn empty() -> Self {
        Self {
            data: StructuredData::new(),
            method: ExtractionMethod::Template,
        }
    }
}

/// The seam the pipeline calls. Implementations must not fail.
pub trait FieldExtractor: Send + Sync {
    fn extract(&self, text: &str, type_key: &str) -> Extraction;
}

pub struct StructuredExtractor {
    catalog: Arc<TypeCatalog>,
    primary: Option<Box<dyn ExtractionStrategy>>,
    fallback: TemplateStrategy,
}

impl StructuredExtractor {
    pub fn new(catalog: Arc<TypeCatalog>, primary: Option<Box<dyn ExtractionStrategy>>) -> Self {
        Self {
            catalog,
            primary,
            fallback: TemplateStrategy::new(),
        }
    }

    /// Uses the remote strategy when it is enabled and an API key resolves;
    /// otherwise only the template strategy runs.
    pub fn from_config(catalog: Arc<TypeCatalog>, config: &AiConfig) -> Self {
        let primary: Option<Box<dyn ExtractionStrategy>> = if !config.enabled {
            tracing::info!("AI extraction disabled, using template strategy");
            None
        } else {
            match AiStrategy::from_config(config) {
                Ok(strategy) => Some(Box::new(strategy)),
                Err(e) => {
                    tracing::warn!("AI extraction unavailable, using template strategy: {}", e);
                    None
                }
            }
        };

        Self::new(catalog, primary)
    }

    pub fn template_only(catalog: Arc<TypeCatalog>) -> Self {
        Self::new(catalog, None)
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    fn run_with_fallback(&self, text: &str, definition: &DocumentTypeDefinition) -> Extraction {
        if let Some(ref primary) = self.primary {
            match primary.extract(text, definition) {
                Ok(data) => {
                    return Extraction {
                        data,
                        method: primary.method(),
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        document_type = %definition.name,
                        "Primary extraction failed, falling back to templates: {}",
                        e
                    );
                }
            }
        }

        Extraction {
            data: self.fallback.extract_fields(text, definition),
            method: ExtractionMethod::Template,
        }
    }
}

impl FieldExtractor for StructuredExtractor {
    fn extract(&self, text: &str, type_key: &str) -> Extraction {
        if text.trim().is_empty() {
            return Extraction::empty();
        }

        match self.catalog.get(type_key) {
            Some(definition) => self.run_with_fallback(text, definition),
            None => {
                tracing::debug!(type_key, "Unknown document type, nothing to extract");
                Extraction::empty()
            }
        }
    }
}

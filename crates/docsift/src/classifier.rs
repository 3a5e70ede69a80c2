//! Keyword and extension scoring against the type catalog.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::catalog::TypeCatalog;

const FILENAME_KEYWORD_WEIGHT: f64 = 0.3;
const CONTENT_KEYWORD_WEIGHT: f64 = 0.1;
const EXTENSION_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub type_key: String,
    /// Clamped to `[0, 1]`.
    pub score: f64,
}

pub struct Classifier {
    catalog: Arc<TypeCatalog>,
}

impl Classifier {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self { catalog }
    }

    /// Picks the best matching type for a filename and optional content.
    ///
    /// Every keyword hit adds to the score independently; a keyword found in
    /// both the filename and the content counts twice. Ties go to the type
    /// that comes first in the catalog.
    pub fn detect(&self, filename: &str, content: &str) -> Detection {
        let filename_lower = filename.to_lowercase();
        let content_lower = content.to_lowercase();
        let extension = extension_of(filename);

        let mut best = Detection {
            type_key: String::new(),
            score: f64::NEG_INFINITY,
        };

        for (key, definition) in self.catalog.iter() {
            let mut score = 0.0_f64;

            for keyword in &definition.keywords {
                if filename_lower.contains(keyword.as_str()) {
                    score += FILENAME_KEYWORD_WEIGHT;
                }
                if !content_lower.is_empty() && content_lower.contains(keyword.as_str()) {
                    score += CONTENT_KEYWORD_WEIGHT;
                }
            }

            if !extension.is_empty() && definition.accepts_extension(&extension) {
                score += EXTENSION_WEIGHT;
            }

            let score = score.clamp(0.0, 1.0);

            // Strictly greater keeps the first maximum.
            if score > best.score {
                best = Detection {
                    type_key: key.to_string(),
                    score,
                };
            }
        }

        best
    }
}

/// Lower-cased extension with a leading dot, or an empty string.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

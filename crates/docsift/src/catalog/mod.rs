//! Registry of known document types.
//!
//! The catalog is built once at start-up and handed to every component that
//! needs it. It is never mutated afterwards, so shared references can be read
//! from any thread without locking.

mod builtin;

use serde::Serialize;

use crate::error::CatalogError;

pub use builtin::builtin_types;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Static description of one document category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentTypeDefinition {
    /// Human-readable name, e.g. "Invoice".
    pub name: String,
    /// Accepted file extensions, lower-case with leading dot.
    pub extensions: Vec<String>,
    pub mime_types: Vec<String>,
    pub keywords: Vec<String>,
    /// Field name to human-readable description, in declaration order.
    pub extraction_fields: Vec<(String, String)>,
    pub processing_steps: Vec<String>,
    pub confidence_threshold: f64,
}

impl DocumentTypeDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extensions: Vec::new(),
            mime_types: Vec::new(),
            keywords: Vec::new(),
            extraction_fields: Vec::new(),
            processing_steps: Vec::new(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_lowercase()).collect();
        self
    }

    pub fn mime_types(mut self, mime_types: &[&str]) -> Self {
        self.mime_types = mime_types.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_lowercase()).collect();
        self
    }

    /// Adds extraction fields. A field name that is already present keeps its
    /// first description, so field names stay unique within a type.
    pub fn fields(mut self, fields: &[(&str, &str)]) -> Self {
        for (name, description) in fields {
            if !self.extraction_fields.iter().any(|(n, _)| n == name) {
                self.extraction_fields
                    .push((name.to_string(), description.to_string()));
            }
        }
        self
    }

    pub fn steps(mut self, steps: &[&str]) -> Self {
        self.processing_steps = steps.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.extraction_fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn accepts_extension(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.extensions.iter().any(|e| *e == extension)
    }

    pub fn accepts_mime_type(&self, mime_type: &str) -> bool {
        self.mime_types.iter().any(|m| m == mime_type)
    }
}

/// Ordered, read-only set of document type definitions keyed by type key.
///
/// Iteration order is the insertion order and is significant: the classifier
/// resolves score ties in favour of the earlier entry.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    entries: Vec<(String, DocumentTypeDefinition)>,
}

impl TypeCatalog {
    /// Builds a catalog from `(key, definition)` pairs. A repeated key is
    /// ignored after its first occurrence. A catalog is never empty.
    pub fn new(entries: Vec<(String, DocumentTypeDefinition)>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut unique: Vec<(String, DocumentTypeDefinition)> = Vec::with_capacity(entries.len());
        for (key, definition) in entries {
            if !unique.iter().any(|(k, _)| *k == key) {
                unique.push((key, definition));
            }
        }
        Ok(Self { entries: unique })
    }

    /// The four built-in types: invoice, receipt, contract, financial statement.
    pub fn builtin() -> Self {
        Self {
            entries: builtin_types(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&DocumentTypeDefinition> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, definition)| definition)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DocumentTypeDefinition)> {
        self.entries.iter().map(|(k, d)| (k.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when any type accepts the extension or the MIME type.
    pub fn is_supported(&self, extension: &str, mime_type: &str) -> bool {
        self.entries.iter().any(|(_, d)| {
            d.accepts_extension(extension) || (!mime_type.is_empty() && d.accepts_mime_type(mime_type))
        })
    }
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order_is_stable() {
        let catalog = TypeCatalog::builtin();
        let keys: Vec<&str> = catalog.keys().collect();
        assert_eq!(keys, vec!["invoice", "receipt", "contract", "financial_statement"]);
    }

    #[test]
    fn test_get_unknown_type() {
        let catalog = TypeCatalog::builtin();
        assert!(catalog.get("passport").is_none());
        assert!(!catalog.contains("passport"));
    }

    #[test]
    fn test_field_names_are_unique() {
        let catalog = TypeCatalog::builtin();
        for (key, definition) in catalog.iter() {
            let mut names: Vec<&str> = definition.field_names().collect();
            let before = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(before, names.len(), "duplicate field in {}", key);
        }
    }

    #[test]
    fn test_duplicate_field_keeps_first_description() {
        let definition =
            DocumentTypeDefinition::new("Memo").fields(&[("date", "Memo date"), ("date", "Other")]);
        assert_eq!(definition.extraction_fields.len(), 1);
        assert_eq!(definition.extraction_fields[0].1, "Memo date");
    }

    #[test]
    fn test_duplicate_key_ignored() {
        let catalog = TypeCatalog::new(vec![
            ("memo".to_string(), DocumentTypeDefinition::new("Memo")),
            ("memo".to_string(), DocumentTypeDefinition::new("Other")),
        ])
        .unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("memo").unwrap().name, "Memo");
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(matches!(TypeCatalog::new(Vec::new()), Err(CatalogError::Empty)));
    }

    #[test]
    fn test_default_threshold() {
        let catalog = TypeCatalog::builtin();
        assert!(catalog
            .iter()
            .all(|(_, d)| (d.confidence_threshold - DEFAULT_CONFIDENCE_THRESHOLD).abs() < f64::EPSILON));
    }

    #[test]
    fn test_is_supported() {
        let catalog = TypeCatalog::builtin();
        assert!(catalog.is_supported(".pdf", ""));
        assert!(catalog.is_supported(".XLSX", ""));
        assert!(catalog.is_supported(".bin", "text/csv"));
        assert!(!catalog.is_supported(".exe", "application/x-msdownload"));
        assert!(!catalog.is_supported("", ""));
    }
}

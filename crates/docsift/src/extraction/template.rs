//! Deterministic field extraction with regular expressions.
//!
//! Each known field name owns an ordered list of patterns; the first pattern
//! that matches wins. Fields without a rule, or whose patterns all miss,
//! get a placeholder of the form `"<Type name> <field> not found"`.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;

use super::{ExtractionStrategy, StrategyError};
use crate::catalog::DocumentTypeDefinition;
use crate::model::{ExtractionMethod, StructuredData};

const AMOUNT: &str = r"[$€£]?\s*(\d[\d,]*(?:\.\d{1,2})?)";

const DATE: &str = r"(\d{4}-\d{2}-\d{2}|\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4}|(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}|\d{1,2}\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)[a-z]*\.?\s+\d{4})";

const EMAIL: &str = r"([A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,})";

const COMPANY_SUFFIX: &str = r"(?m)^\s*([A-Z][A-Za-z0-9&.,' \-]*?\s(?:Inc|LLC|Ltd|GmbH|Corp|Co|Company|Corporation|Limited)\.?)\s*$";

const NAME_LABEL: &str = r"(?im)^\s*(?:from|vendor|seller|supplier|merchant|store|company|billed\s+by|issued\s+by)\s*[:\-]\s*(\S.*?)\s*$";

/// Accepted date layouts, tried in order when normalising to ISO.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldKind {
    Amount,
    Date,
    Text,
}

struct Pattern {
    regex: Regex,
    /// Which match to take; 0 is the first occurrence.
    nth: usize,
}

struct FieldRule {
    kind: FieldKind,
    patterns: Vec<Pattern>,
}

fn rule(kind: FieldKind, patterns: &[&str]) -> FieldRule {
    FieldRule {
        kind,
        patterns: patterns
            .iter()
            .map(|p| Pattern {
                regex: Regex::new(p).unwrap(),
                nth: 0,
            })
            .collect(),
    }
}

fn nth_match_rule(kind: FieldKind, pattern: &str, nth: usize) -> FieldRule {
    FieldRule {
        kind,
        patterns: vec![Pattern {
            regex: Regex::new(pattern).unwrap(),
            nth,
        }],
    }
}

static RULES: LazyLock<HashMap<&'static str, FieldRule>> = LazyLock::new(|| {
    use FieldKind::*;

    let mut rules = HashMap::new();

    rules.insert(
        "total_amount",
        rule(
            Amount,
            &[
                &format!(r"(?i)\b(?:grand\s+)?total(?:\s+(?:amount|due|paid))?\s*[:\-]?\s*{}", AMOUNT),
                &format!(r"(?i)\bamount\s+(?:due|paid)\s*[:\-]?\s*{}", AMOUNT),
                &format!(r"(?i)\bbalance\s+due\s*[:\-]?\s*{}", AMOUNT),
            ],
        ),
    );
    rules.insert(
        "subtotal",
        rule(Amount, &[&format!(r"(?i)\bsub[\s\-]?total\s*[:\-]?\s*{}", AMOUNT)]),
    );
    rules.insert(
        "tax_amount",
        rule(
            Amount,
            &[&format!(
                r"(?i)\b(?:sales\s+)?(?:tax|vat|gst)(?:\s+amount)?(?:\s*\(?\s*\d+(?:\.\d+)?\s*%\s*\)?)?\s*[:\-]?\s*{}",
                AMOUNT
            )],
        ),
    );
    rules.insert(
        "revenue",
        rule(Amount, &[&format!(r"(?i)\b(?:total\s+)?revenues?\s*[:\-]?\s*{}", AMOUNT)]),
    );
    rules.insert(
        "net_income",
        rule(
            Amount,
            &[&format!(r"(?i)\bnet\s+(?:income|loss|profit)\s*[:\-]?\s*{}", AMOUNT)],
        ),
    );
    rules.insert(
        "total_assets",
        rule(Amount, &[&format!(r"(?i)\btotal\s+assets\s*[:\-]?\s*{}", AMOUNT)]),
    );
    rules.insert(
        "total_liabilities",
        rule(
            Amount,
            &[&format!(r"(?i)\btotal\s+liabilities\s*[:\-]?\s*{}", AMOUNT)],
        ),
    );

    rules.insert(
        "date",
        rule(
            Date,
            &[
                &format!(r"(?i)\binvoice\s+date\s*[:\-]?\s*{}", DATE),
                &format!(r"(?im)^\s*(?:issue\s+)?date\s*[:\-]?\s*{}", DATE),
                DATE,
            ],
        ),
    );
    rules.insert(
        "due_date",
        rule(
            Date,
            &[&format!(
                r"(?i)\b(?:due\s+date|payment\s+due|due)\s*[:\-]?\s*(?:on\s+)?{}",
                DATE
            )],
        ),
    );
    rules.insert(
        "transaction_date",
        rule(
            Date,
            &[
                &format!(r"(?i)\b(?:transaction\s+|purchase\s+)?date\s*[:\-]?\s*{}", DATE),
                DATE,
            ],
        ),
    );
    rules.insert(
        "effective_date",
        rule(
            Date,
            &[
                &format!(
                    r"(?i)\beffective(?:\s+date)?\s*[:\-]?\s*(?:as\s+of\s+|on\s+)?{}",
                    DATE
                ),
                DATE,
            ],
        ),
    );
    rules.insert(
        "expiration_date",
        rule(
            Date,
            &[&format!(
                r"(?i)\b(?:expiration|expiry|termination|end)(?:\s+date)?\s*[:\-]?\s*(?:on\s+)?{}",
                DATE
            )],
        ),
    );
    rules.insert(
        "period",
        rule(
            Date,
            &[
                &format!(
                    r"(?i)\b(?:period|quarter|year|fiscal\s+year)\s+(?:ended|ending)\s*[:\-]?\s*{}",
                    DATE
                ),
                r"(?i)\b(Q[1-4]\s+\d{4})",
                r"(?i)\b(FY\s?\d{4})",
            ],
        ),
    );

    rules.insert(
        "invoice_number",
        rule(
            Text,
            &[
                r"(?i)\binvoice\s*(?:no\.?|number|num|#)\s*[:\-]?\s*#?\s*([A-Z0-9][A-Z0-9\-/]*)",
                r"(?i)\b(INV[\-#]?\d[A-Z0-9\-/]*)",
                r"#\s*([A-Z0-9]*\d[A-Z0-9\-]*)",
            ],
        ),
    );

    for name_field in ["vendor_name", "merchant_name", "company_name"] {
        rules.insert(name_field, rule(Text, &[NAME_LABEL, COMPANY_SUFFIX]));
    }

    rules.insert(
        "transaction_time",
        rule(Text, &[r"\b(\d{1,2}:\d{2}(?::\d{2})?(?:\s*[AaPp][Mm])?)"]),
    );
    rules.insert(
        "payment_method",
        rule(
            Text,
            &[r"(?i)\b(visa|master\s?card|amex|american\s+express|discover|debit\s+card|credit\s+card|debit|cash|paypal|apple\s+pay|google\s+pay)\b"],
        ),
    );
    rules.insert(
        "statement_type",
        rule(
            Text,
            &[r"(?i)\b(balance\s+sheet|income\s+statement|cash\s+flow\s+statement|profit\s+and\s+loss(?:\s+statement)?)"],
        ),
    );
    rules.insert(
        "contract_title",
        rule(Text, &[r"(?m)^\s*([A-Z][A-Za-z ]*(?:Agreement|Contract|AGREEMENT|CONTRACT))\s*$"]),
    );
    rules.insert(
        "governing_law",
        rule(
            Text,
            &[r"(?i)governed\s+by\s+(?:and\s+construed\s+in\s+accordance\s+with\s+)?the\s+laws?\s+of\s+(?:the\s+)?([A-Za-z][A-Za-z .]*?)\s*(?:[.,;\n]|$)"],
        ),
    );

    rules.insert("vendor_email", nth_match_rule(Text, EMAIL, 0));
    rules.insert("contractor1_email", nth_match_rule(Text, EMAIL, 0));
    rules.insert("user_email", nth_match_rule(Text, EMAIL, 1));
    rules.insert("contractor2_email", nth_match_rule(Text, EMAIL, 1));

    rules
});

/// The regex-and-placeholder strategy. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateStrategy;

impl TemplateStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Extracts every schema field, returning a map whose key set equals the
    /// type's field set exactly.
    pub fn extract_fields(&self, text: &str, definition: &DocumentTypeDefinition) -> StructuredData {
        definition
            .field_names()
            .map(|field| {
                let value = RULES
                    .get(field)
                    .and_then(|rule| apply_rule(rule, text))
                    .unwrap_or_else(|| placeholder(&definition.name, field));
                (field.to_string(), Value::String(value))
            })
            .collect()
    }
}

impl ExtractionStrategy for TemplateStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Template
    }

    fn extract(
        &self,
        text: &str,
        definition: &DocumentTypeDefinition,
    ) -> Result<StructuredData, StrategyError> {
        Ok(self.extract_fields(text, definition))
    }
}

/// Deterministic stand-in for a field the text does not reveal.
pub fn placeholder(type_name: &str, field: &str) -> String {
    format!("{} {} not found", type_name, field)
}

fn apply_rule(rule: &FieldRule, text: &str) -> Option<String> {
    rule.patterns.iter().find_map(|pattern| {
        let caps = pattern.regex.captures_iter(text).nth(pattern.nth)?;
        let raw = caps.get(1)?.as_str().trim();
        if raw.is_empty() {
            return None;
        }
        Some(normalize(rule.kind, raw))
    })
}

fn normalize(kind: FieldKind, raw: &str) -> String {
    match kind {
        FieldKind::Amount => raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect(),
        FieldKind::Date => normalize_date(raw).unwrap_or_else(|| raw.to_string()),
        FieldKind::Text => raw.trim_end_matches([',', ';', ':']).trim().to_string(),
    }
}

/// Converts a matched date to `YYYY-MM-DD` when one of the known layouts fits.
fn normalize_date(raw: &str) -> Option<String> {
    // Month-name dates may carry abbreviation dots ("Jan.") that chrono rejects.
    let cleaned = if raw.contains(' ') {
        raw.replace('.', "").replace("Sept ", "Sep ")
    } else {
        raw.to_string()
    };
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
}

//! Helpers for keeping paths and user-supplied names out of logs and off
//! the filesystem in unsafe forms.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing where it lives.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Reduces a client-supplied filename to a safe ASCII form.
///
/// Path separators become spaces, runs of whitespace become a single `_`,
/// and anything outside `[A-Za-z0-9_.-]` is dropped. Leading and trailing
/// dots and underscores are stripped so the result can never name a parent
/// directory or a hidden file. May return an empty string.
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

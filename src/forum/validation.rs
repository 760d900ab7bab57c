//! Boundary validation for user-supplied forum content.
//!
//! Every create/edit path runs its input through these checks before any
//! storage write. Collected errors are reported together as a single
//! `ForumError::InvalidInput`.

use crate::error::{ForumError, Result};
use crate::forum::constants::{
    MAX_CONTENT_SIZE, MAX_EXTRA_ENTRIES, MAX_EXTRA_KEY_SIZE, MAX_EXTRA_VALUE_SIZE, MAX_TAGS_COUNT,
    MAX_TAG_SIZE, MAX_TITLE_SIZE,
};
use crate::forum::node::Extensions;
use std::collections::BTreeSet;

/// Result of validation containing detailed information.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors, if any.
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// Creates an empty (successful) result.
    pub fn ok() -> Self {
        Self::default()
    }

    /// Whether no errors were recorded.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    /// Converts into `Err(InvalidInput)` if any error was recorded.
    pub fn into_result(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ForumError::invalid_input(self.errors.join("; ")))
        }
    }
}

/// Checks a forum or topic title.
pub fn check_title(result: &mut ValidationResult, title: &str) {
    if title.trim().is_empty() {
        result.add_error("Title must not be empty".to_string());
    }
    if title.len() > MAX_TITLE_SIZE {
        result.add_error(format!(
            "Title too long: {} bytes (max {})",
            title.len(),
            MAX_TITLE_SIZE
        ));
    }
}

/// Checks a forum description or topic/reply body.
pub fn check_content(result: &mut ValidationResult, content: &str) {
    if content.len() > MAX_CONTENT_SIZE {
        result.add_error(format!(
            "Content too long: {} bytes (max {})",
            content.len(),
            MAX_CONTENT_SIZE
        ));
    }
}

/// Checks an extension map.
pub fn check_extra(result: &mut ValidationResult, extra: &Extensions) {
    if extra.len() > MAX_EXTRA_ENTRIES {
        result.add_error(format!(
            "Too many extension entries: {} (max {})",
            extra.len(),
            MAX_EXTRA_ENTRIES
        ));
    }
    for (key, value) in extra {
        let key_ok = !key.is_empty()
            && key.len() <= MAX_EXTRA_KEY_SIZE
            && key
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
        if !key_ok {
            result.add_error(format!("Invalid extension key '{}'", key));
        }
        if value.len() > MAX_EXTRA_VALUE_SIZE {
            result.add_error(format!(
                "Extension '{}' too long: {} bytes (max {})",
                key,
                value.len(),
                MAX_EXTRA_VALUE_SIZE
            ));
        }
    }
}

/// Normalizes a free-form tag into a slug: lowercase ASCII alphanumerics
/// separated by single dashes. Returns `None` if nothing remains.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_dash = false;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// Normalizes and de-duplicates a tag list, recording size violations.
pub fn normalize_tags(result: &mut ValidationResult, raw: &[String]) -> BTreeSet<String> {
    let tags: BTreeSet<String> = raw.iter().filter_map(|t| normalize_tag(t)).collect();
    if tags.len() > MAX_TAGS_COUNT {
        result.add_error(format!(
            "Too many tags: {} (max {})",
            tags.len(),
            MAX_TAGS_COUNT
        ));
    }
    for tag in &tags {
        if tag.len() > MAX_TAG_SIZE {
            result.add_error(format!("Tag too long: '{}'", tag));
        }
    }
    tags
}

/// Shortens `content` to at most `max_chars` characters on a word boundary,
/// for use as a derived title.
pub fn excerpt(content: &str, max_chars: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    match cut.rfind(' ') {
        Some(pos) if pos > 0 => cut[..pos].to_string(),
        _ => cut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_checks() {
        let mut result = ValidationResult::ok();
        check_title(&mut result, "   ");
        check_title(&mut result, &"x".repeat(MAX_TITLE_SIZE + 1));
        assert_eq!(result.errors.len(), 2);
        assert!(matches!(
            result.into_result(),
            Err(ForumError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("  Rust Lang! "), Some("rust-lang".to_string()));
        assert_eq!(normalize_tag("--a__b--"), Some("a-b".to_string()));
        assert_eq!(normalize_tag("!!!"), None);
    }

    #[test]
    fn test_normalize_tags_dedupes() {
        let mut result = ValidationResult::ok();
        let tags = normalize_tags(
            &mut result,
            &["Rust".to_string(), "rust".to_string(), "".to_string()],
        );
        assert!(result.is_valid());
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_extra_keys() {
        let mut extra = Extensions::new();
        extra.insert("legacy_id".to_string(), "42".to_string());
        extra.insert("Bad Key".to_string(), "x".to_string());
        let mut result = ValidationResult::ok();
        check_extra(&mut result, &extra);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("short  text", 80), "short text");
        assert_eq!(excerpt("alpha beta gamma", 12), "alpha beta");
    }
}

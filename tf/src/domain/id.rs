//! Identifier generation and resolution
//!
//! Generated IDs use the format: `{8-char-hex}-{kind}-{slug}`
//! Example: `3f9a01c2-task-outline-the-article`

use std::collections::HashMap;

/// Maximum number of slug words kept in a generated ID
const MAX_SLUG_WORDS: usize = 6;

/// Generate an ID from a kind (`task`, `agent`, `feedback`) and a human title
pub fn generate_id(kind: &str, title: &str) -> String {
    let hex = uuid::Uuid::now_v7().simple().to_string();
    // The leading bits of a v7 UUID are the timestamp; the tail is random
    let suffix = &hex[hex.len() - 8..];
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{}-{}", suffix, kind)
    } else {
        format!("{}-{}-{}", suffix, kind, slug)
    }
}

/// Current wall-clock time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Slugify a title for use in IDs
fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        // Strip apostrophes entirely, replace other non-alphanumeric with hyphens
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .take(MAX_SLUG_WORDS)
        .collect::<Vec<_>>()
        .join("-")
}

/// Resolves partial references (prefix or slug fragment) to full IDs
pub struct IdResolver<'a> {
    ids: &'a HashMap<String, String>, // id -> display name
}

impl<'a> IdResolver<'a> {
    pub fn new(ids: &'a HashMap<String, String>) -> Self {
        Self { ids }
    }

    /// Resolve a partial reference to a full ID
    ///
    /// Returns:
    /// - Ok(Some(id)) if exactly one match (an exact match always wins)
    /// - Ok(None) if no matches
    /// - Err with candidates if ambiguous
    pub fn resolve(&self, reference: &str) -> Result<Option<String>, Vec<String>> {
        if self.ids.contains_key(reference) {
            return Ok(Some(reference.to_string()));
        }

        let mut matches: Vec<String> = self
            .ids
            .keys()
            .filter(|id| Self::matches(id, reference))
            .cloned()
            .collect();
        matches.sort();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(matches),
        }
    }

    fn matches(id: &str, reference: &str) -> bool {
        if id.starts_with(reference) {
            return true;
        }

        if let Some(slug_start) = id.find('-') {
            return id[slug_start + 1..].contains(reference);
        }

        false
    }
}

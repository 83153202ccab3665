//! Extracts @mentions from text content for notification purposes.

use once_cell::sync::Lazy;
use regex::Regex;

/// An @mention counts only at the start of the text or after whitespace, and
/// usernames are 3-20 word characters.
static MENTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)@([a-zA-Z0-9_]{3,20})\b").expect("invalid mention regex"));

/// Cap on distinct mention recipients per message.
pub const MAX_MENTIONS: usize = 10;

/// Extract mentioned usernames (lowercased, deduplicated, first-occurrence
/// order, capped at [`MAX_MENTIONS`]).
pub fn extract_mentions(content: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    MENTION_REGEX
        .captures_iter(content)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_lowercase()))
        .filter(|username| seen.insert(username.clone()))
        .take(MAX_MENTIONS)
        .collect()
}

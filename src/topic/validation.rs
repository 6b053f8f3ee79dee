//! Topic filter parsing and validation
//!
//! Key rules:
//! - `+` matches exactly one level
//! - `#` matches the remaining levels and must be the last level of a filter
//! - a filter ending in `/#` needs at least one level after the prefix; `a/#`
//!   matches `a/b` and `a/` but not `a`

use super::{LEVEL_SEPARATOR, MULTI_LEVEL_WILDCARD, SINGLE_LEVEL_WILDCARD};

/// Represents a level in a topic filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicLevel<'a> {
    /// Literal topic level
    Normal(&'a str),
    /// Single-level wildcard (+)
    SingleWildcard,
    /// Multi-level wildcard (#)
    MultiWildcard,
}

/// Parse a filter into levels
pub fn parse_levels(filter: &str) -> impl Iterator<Item = TopicLevel<'_>> {
    filter.split(LEVEL_SEPARATOR).map(|level| match level {
        SINGLE_LEVEL_WILDCARD => TopicLevel::SingleWildcard,
        MULTI_LEVEL_WILDCARD => TopicLevel::MultiWildcard,
        s => TopicLevel::Normal(s),
    })
}

/// Check that `#` only appears as the final level of a filter
///
/// The trie accepts any filter and stops at the first `#`; this lets the
/// connection report filters that will be truncated.
pub fn validate_topic_filter(filter: &str) -> Result<(), &'static str> {
    let mut levels = parse_levels(filter).peekable();
    while let Some(level) = levels.next() {
        if level == TopicLevel::MultiWildcard && levels.peek().is_some() {
            return Err("multi-level wildcard must be last level");
        }
    }
    Ok(())
}

/// Check if a topic filter matches a topic name, without a trie
///
/// Levels after the first `#` are ignored, the same way the trie stores them.
pub fn filter_matches_topic(filter: &str, topic: &str) -> bool {
    let topic_levels: Vec<&str> = topic.split(LEVEL_SEPARATOR).collect();

    for (i, level) in parse_levels(filter).enumerate() {
        match level {
            TopicLevel::MultiWildcard => return i < topic_levels.len(),
            _ if i >= topic_levels.len() => return false,
            TopicLevel::SingleWildcard => {}
            TopicLevel::Normal(s) => {
                if s != topic_levels[i] {
                    return false;
                }
            }
        }
    }

    parse_levels(filter).count() == topic_levels.len()
}

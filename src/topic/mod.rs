//! Topic matching and subscription management
//!
//! Subscriptions live in a [`TopicTrie`]: an arena of nodes, one per topic
//! level, shared by every connection behind a single reader/writer lock.
//! A publish resolves to the set of [`ClientId`]s whose filters match it.

mod trie;
pub mod validation;

use std::sync::Arc;

pub use trie::TopicTrie;
pub use validation::{filter_matches_topic, parse_levels, validate_topic_filter, TopicLevel};

/// Stable identity of a connected client for the lifetime of its session
pub type ClientId = Arc<str>;

/// Topic level separator
pub const LEVEL_SEPARATOR: char = '/';

/// Single-level wildcard: matches exactly one level
pub const SINGLE_LEVEL_WILDCARD: &str = "+";

/// Multi-level wildcard: matches the rest of the topic, last level only
pub const MULTI_LEVEL_WILDCARD: &str = "#";

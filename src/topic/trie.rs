//! Topic Trie for subscription matching
//!
//! Nodes live in a single arena (`Vec<TrieNode>`) and refer to their children
//! by index, so the whole structure sits behind one `RwLock`:
//! - `add` takes the write lock. A new node is pushed into the arena before
//!   its index is linked into the parent, under the same guard, so readers
//!   never see a partially built node.
//! - `matches` takes the read lock and may run alongside other readers.
//!
//! Nodes are created lazily and never pruned.

use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;
use parking_lot::RwLock;
use smallvec::{smallvec, SmallVec};

use super::{ClientId, LEVEL_SEPARATOR, MULTI_LEVEL_WILDCARD, SINGLE_LEVEL_WILDCARD};

/// Index of the root node, which stands for the zero-length prefix
const ROOT: usize = 0;

/// Node in the topic trie
#[derive(Debug)]
struct TrieNode {
    /// The topic level this node represents (empty for the root)
    segment: CompactString,
    /// Children indexed by topic level, including the `+` and `#` markers
    children: AHashMap<CompactString, usize>,
    /// Clients whose filter ends exactly at this node
    subscribers: AHashSet<ClientId>,
}

impl TrieNode {
    fn new(segment: &str) -> Self {
        Self {
            segment: CompactString::new(segment),
            children: AHashMap::new(),
            subscribers: AHashSet::new(),
        }
    }

    #[inline]
    fn is_multi_wildcard(&self) -> bool {
        self.segment == MULTI_LEVEL_WILDCARD
    }
}

#[derive(Debug)]
struct Arena {
    nodes: Vec<TrieNode>,
}

impl Arena {
    fn new() -> Self {
        Self {
            nodes: vec![TrieNode::new("")],
        }
    }

    /// Find the child of `parent` for `level`, creating it if absent
    fn child_or_insert(&mut self, parent: usize, level: &str) -> usize {
        if let Some(&idx) = self.nodes[parent].children.get(level) {
            return idx;
        }

        let idx = self.nodes.len();
        self.nodes.push(TrieNode::new(level));
        self.nodes[parent]
            .children
            .insert(CompactString::new(level), idx);
        idx
    }
}

/// Concurrency-safe index from topic filters to subscribed clients
#[derive(Debug)]
pub struct TopicTrie {
    arena: RwLock<Arena>,
}

impl TopicTrie {
    pub fn new() -> Self {
        Self {
            arena: RwLock::new(Arena::new()),
        }
    }

    /// Subscribe `client_id` to `filter`
    ///
    /// Walks the filter level by level from the root, creating missing nodes,
    /// and stops at the first `#`. Returns `false` if the client was already
    /// subscribed to this filter (re-subscribing is a no-op).
    pub fn add(&self, filter: &str, client_id: ClientId) -> bool {
        let mut arena = self.arena.write();
        let mut node = ROOT;

        for level in filter.split(LEVEL_SEPARATOR) {
            node = arena.child_or_insert(node, level);
            if level == MULTI_LEVEL_WILDCARD {
                break;
            }
        }

        arena.nodes[node].subscribers.insert(client_id)
    }

    /// Find every client whose filter matches `topic`
    ///
    /// All branches are explored independently: the literal child and the
    /// `+` child each consume one level, the `#` child consumes none. A node's
    /// subscribers are collected when the topic is exhausted there, or when
    /// the node is a `#`. The result is the deduplicated union.
    pub fn matches(&self, topic: &str) -> AHashSet<ClientId> {
        let levels: SmallVec<[&str; 8]> = topic.split(LEVEL_SEPARATOR).collect();
        let mut result = AHashSet::new();

        let arena = self.arena.read();
        // (node index, levels consumed)
        let mut stack: SmallVec<[(usize, usize); 16]> = smallvec![(ROOT, 0)];

        while let Some((idx, depth)) = stack.pop() {
            let node = &arena.nodes[idx];
            let next = levels.get(depth).copied();

            if next.is_none() || node.is_multi_wildcard() {
                result.extend(node.subscribers.iter().cloned());
            }

            if let Some(level) = next {
                if let Some(&child) = node.children.get(level) {
                    stack.push((child, depth + 1));
                }
                if level != SINGLE_LEVEL_WILDCARD {
                    if let Some(&child) = node.children.get(SINGLE_LEVEL_WILDCARD) {
                        stack.push((child, depth + 1));
                    }
                }
                if let Some(&child) = node.children.get(MULTI_LEVEL_WILDCARD) {
                    stack.push((child, depth));
                }
            }
        }

        result
    }

    /// Number of nodes, including the root
    pub fn node_count(&self) -> usize {
        self.arena.read().nodes.len()
    }

    /// Number of (filter, client) pairs stored
    pub fn subscription_count(&self) -> usize {
        self.arena
            .read()
            .nodes
            .iter()
            .map(|node| node.subscribers.len())
            .sum()
    }
}

impl Default for TopicTrie {
    fn default() -> Self {
        Self::new()
    }
}

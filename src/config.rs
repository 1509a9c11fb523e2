//! Build-time settings.

use crate::format::MAX_NESTING;

/// How edge labels are stored in the serialized trie.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LabelEncoding {
    /// Canonical Huffman codes built over the label frequencies.
    #[default]
    Huffman,
    /// One LEB128 varint per code point.
    Literal,
}

/// How the tails stripped by path compression are stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TailPolicy {
    /// Build a nested trie when there are enough tails and keep it only if
    /// it encodes smaller than the flat store.
    #[default]
    Auto,
    /// Always store tails as concatenated UTF-8.
    Flat,
    /// Nest tails into a trie whenever the depth limit allows.
    Recursive,
}

/// Settings for [`Builder`](crate::Builder).
///
/// ```
/// use owtrie::{LabelEncoding, TailPolicy, TrieConfig};
///
/// let config = TrieConfig::default()
///     .with_labels(LabelEncoding::Literal)
///     .with_tail_policy(TailPolicy::Flat);
/// assert_eq!(config.max_tail_depth, 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrieConfig {
    /// Label storage.
    pub labels: LabelEncoding,
    /// Tail storage.
    pub tail_policy: TailPolicy,
    /// Maximum nesting of tail tries. 0 disables nesting; values above 16
    /// act as 16, the deepest nesting a buffer may carry.
    pub max_tail_depth: u8,
    /// Fewest distinct tails for which [`TailPolicy::Auto`] tries nesting.
    pub min_recursive_tails: usize,
}

impl Default for TrieConfig {
    fn default() -> Self {
        TrieConfig {
            labels: LabelEncoding::Huffman,
            tail_policy: TailPolicy::Auto,
            max_tail_depth: 3,
            min_recursive_tails: 64,
        }
    }
}

impl TrieConfig {
    /// Sets the label encoding.
    pub fn with_labels(mut self, labels: LabelEncoding) -> Self {
        self.labels = labels;
        self
    }

    /// Sets the tail policy.
    pub fn with_tail_policy(mut self, policy: TailPolicy) -> Self {
        self.tail_policy = policy;
        self
    }

    /// Sets the maximum tail nesting depth.
    pub fn with_max_tail_depth(mut self, depth: u8) -> Self {
        self.max_tail_depth = depth;
        self
    }

    /// Sets the tail count below which [`TailPolicy::Auto`] stays flat.
    pub fn with_min_recursive_tails(mut self, count: usize) -> Self {
        self.min_recursive_tails = count;
        self
    }

    /// True if tails at `depth` may be nested one level further.
    pub(crate) fn may_nest(&self, depth: u8, tail_count: usize) -> bool {
        if depth >= self.max_tail_depth.min(MAX_NESTING) || tail_count == 0 {
            return false;
        }
        match self.tail_policy {
            TailPolicy::Flat => false,
            TailPolicy::Recursive => true,
            TailPolicy::Auto => tail_count >= self.min_recursive_tails,
        }
    }
}

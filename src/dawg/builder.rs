use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use smallvec::SmallVec;
use tracing::debug;

use super::minimize::{minimize, Dawg};
use super::node::{BuildNode, NodeId};
use crate::config::TrieConfig;
use crate::errors::Result;
use crate::louds::{layout, Trie};

/// Trait for types that can be added to a [`Builder`] as a word.
///
/// Implemented for common string types and for `char` sequences so that
/// [`Builder::add_word`] and [`build_trie`] accept them directly.
pub trait IntoWord {
    /// Collects this word into a code point buffer.
    fn collect_word(self) -> SmallVec<[char; 32]>;
}

impl IntoWord for &str {
    fn collect_word(self) -> SmallVec<[char; 32]> {
        self.chars().collect()
    }
}

impl IntoWord for &&str {
    fn collect_word(self) -> SmallVec<[char; 32]> {
        self.chars().collect()
    }
}

impl IntoWord for String {
    fn collect_word(self) -> SmallVec<[char; 32]> {
        self.chars().collect()
    }
}

impl IntoWord for &String {
    fn collect_word(self) -> SmallVec<[char; 32]> {
        self.chars().collect()
    }
}

impl IntoWord for &[char] {
    fn collect_word(self) -> SmallVec<[char; 32]> {
        self.iter().copied().collect()
    }
}

impl IntoWord for Vec<char> {
    fn collect_word(self) -> SmallVec<[char; 32]> {
        self.into_iter().collect()
    }
}

/// Collects words into a trie, in any order.
///
/// Words are inserted into a plain trie held in an index arena. Building
/// minimizes it into a DAWG, then lays the DAWG out as a path-compressed
/// LOUDS trie with its tails.
#[derive(Clone, Debug)]
pub struct Builder {
    nodes: Vec<BuildNode>,
    word_count: usize,
    config: TrieConfig,
    depth: u8,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Creates a builder with the default [`TrieConfig`].
    pub fn new() -> Self {
        Self::with_config(TrieConfig::default())
    }

    /// Creates a builder with the given settings.
    pub fn with_config(config: TrieConfig) -> Self {
        Builder {
            nodes: vec![BuildNode::new(false)],
            word_count: 0,
            config,
            depth: 0,
        }
    }

    /// Builder for the tail trie nested `depth` levels below the top.
    pub(crate) fn nested(config: TrieConfig, depth: u8) -> Self {
        Builder {
            depth,
            ..Self::with_config(config)
        }
    }

    /// Adds a word.
    ///
    /// Returns `false` if the word is empty or was already added; the empty
    /// string is never a word.
    pub fn add_word(&mut self, word: impl IntoWord) -> bool {
        let word = word.collect_word();
        if word.is_empty() {
            return false;
        }
        let mut node: NodeId = 0;
        for &ch in &word {
            node = match self.nodes[node as usize].get(ch) {
                Some(child) => child,
                None => {
                    let child = self.nodes.len() as NodeId;
                    self.nodes.push(BuildNode::new(false));
                    self.nodes[node as usize].children_mut().insert(ch, child);
                    child
                }
            };
        }
        let last = &mut self.nodes[node as usize];
        if last.is_terminal() {
            return false;
        }
        last.set_terminal();
        self.word_count += 1;
        true
    }

    /// Number of distinct words added.
    pub fn len(&self) -> usize {
        self.word_count
    }

    /// True if no word was added.
    pub fn is_empty(&self) -> bool {
        self.word_count == 0
    }

    /// The settings this builder uses.
    pub fn config(&self) -> &TrieConfig {
        &self.config
    }

    /// Minimizes the inserted words into a DAWG.
    pub fn minimize(&self) -> Dawg {
        minimize(&self.nodes, self.word_count)
    }

    /// Finalizes the trie.
    pub fn build(self) -> Result<Trie> {
        let dawg = self.minimize();
        debug!(
            "depth {}: {} words, {} trie nodes minimized to {}",
            self.depth,
            self.word_count,
            self.nodes.len(),
            dawg.len()
        );
        // The unminimized arena is the largest allocation; release it
        // before the layout allocates bit vectors.
        drop(self.nodes);
        layout::lay_out(&dawg, &self.config, self.depth)
    }
}

impl<W: IntoWord> Extend<W> for Builder {
    fn extend<I: IntoIterator<Item = W>>(&mut self, words: I) {
        for word in words {
            self.add_word(word);
        }
    }
}

/// Builds a trie from words with the default settings.
///
/// Duplicates and empty strings are ignored; order does not matter.
///
/// ```
/// use owtrie::build_trie;
///
/// let trie = build_trie(["ant", "ante", "anti"]).unwrap();
/// assert!(trie.has("ant"));
/// assert!(!trie.has("an"));
/// ```
pub fn build_trie<W: IntoWord>(words: impl IntoIterator<Item = W>) -> Result<Trie> {
    build_trie_with(words, TrieConfig::default())
}

/// Builds a trie from words with the given settings.
pub fn build_trie_with<W: IntoWord>(
    words: impl IntoIterator<Item = W>,
    config: TrieConfig,
) -> Result<Trie> {
    let mut builder = Builder::with_config(config);
    builder.extend(words);
    builder.build()
}

/// Builds a trie from a newline-delimited word list.
///
/// Trailing whitespace is trimmed. Empty lines and lines starting with
/// '#' are skipped.
pub fn build_trie_from_reader(mut reader: impl BufRead, config: TrieConfig) -> Result<Trie> {
    let mut builder = Builder::with_config(config);

    // read_line into one buffer instead of lines() avoids allocating a new
    // string for every word.
    let mut buf = String::with_capacity(80);
    let mut duplicates = 0usize;
    loop {
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        let word = buf.trim_end();
        if !word.is_empty() && !is_comment(word) && !builder.add_word(word) {
            duplicates += 1;
        }
        buf.clear();
    }
    if duplicates > 0 {
        debug!("skipped {duplicates} duplicate words");
    }
    builder.build()
}

/// Builds a trie from a word list file (one word per line).
///
/// ```no_run
/// use owtrie::{build_trie_from_file, TrieConfig};
///
/// let trie = build_trie_from_file("words.txt", TrieConfig::default()).unwrap();
/// ```
pub fn build_trie_from_file(path: impl AsRef<Path>, config: TrieConfig) -> Result<Trie> {
    let file = File::open(path)?;
    build_trie_from_reader(BufReader::new(file), config)
}

/// Returns true if this line is a comment.
pub(crate) fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

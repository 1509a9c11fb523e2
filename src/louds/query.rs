use std::fmt;
use std::io::Write;

use super::{Trie, ROOT};
use crate::errors::Result;
use crate::format;

impl Trie {
    /// Position of the node spelled exactly by `word`.
    fn find(&self, word: &str) -> Option<usize> {
        let mut pos = ROOT;
        let mut rest = word;
        while let Some(ch) = rest.chars().next() {
            let child = self.child(pos, ch)?;
            rest = &rest[ch.len_utf8()..];
            if let Some(tail) = self.tail(child) {
                rest = rest.strip_prefix(&*tail)?;
            }
            pos = child;
        }
        Some(pos)
    }

    /// Word id of the terminal node at `pos`.
    #[inline]
    fn id_at(&self, pos: usize) -> u32 {
        (self.terminal.rank1(pos) - 1) as u32
    }

    /// Returns true if `word` is in the trie.
    ///
    /// ```
    /// let trie = owtrie::build_trie(["ant", "ante", "anti"]).unwrap();
    /// assert!(trie.has("ante"));
    /// assert!(!trie.has("antler"));
    /// ```
    pub fn has(&self, word: &str) -> bool {
        self.find(word).is_some_and(|pos| self.is_terminal(pos))
    }

    /// Dense id of `word` in `0..len()`, or `None` if it is absent.
    pub fn word_id(&self, word: &str) -> Option<u32> {
        self.find(word)
            .filter(|&pos| self.is_terminal(pos))
            .map(|pos| self.id_at(pos))
    }

    /// The word with id `id`; the inverse of [`word_id`](Self::word_id).
    pub fn get_word(&self, id: u32) -> Option<String> {
        let mut pos = self.terminal.select1(id as usize + 1)?;
        let mut path = Vec::new();
        while let Some(parent) = self.parent(pos) {
            path.push(pos);
            pos = parent;
        }
        let mut word = String::new();
        for &edge in path.iter().rev() {
            self.push_edge_text(edge, &mut word);
        }
        Some(word)
    }

    /// Words starting with `prefix` in code point order, at most `limit`
    /// of them.
    ///
    /// ```
    /// let trie = owtrie::build_trie(["apple", "application", "banana"]).unwrap();
    /// assert_eq!(trie.keys_with_prefix("app", None), ["apple", "application"]);
    /// assert_eq!(trie.keys_with_prefix("app", Some(1)), ["apple"]);
    /// ```
    pub fn keys_with_prefix(&self, prefix: &str, limit: Option<usize>) -> Vec<String> {
        self.iter_prefix(prefix)
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Lazily enumerates the words starting with `prefix`.
    pub fn iter_prefix(&self, prefix: &str) -> PrefixIter<'_> {
        let mut iter = PrefixIter {
            trie: self,
            stack: Vec::new(),
            buf: String::new(),
        };
        if let Some(pos) = self.locate(prefix, &mut iter.buf) {
            iter.stack.push(Frame {
                pos,
                base_len: iter.buf.len(),
                append: false,
            });
        }
        iter
    }

    /// Enumerates every word in code point order.
    pub fn iter(&self) -> PrefixIter<'_> {
        self.iter_prefix("")
    }

    /// Finds the shallowest node whose path starts with `prefix`, writing
    /// that path to `path`. The prefix may end inside an edge's tail.
    fn locate(&self, prefix: &str, path: &mut String) -> Option<usize> {
        let mut pos = ROOT;
        let mut rest = prefix;
        while let Some(ch) = rest.chars().next() {
            let child = self.child(pos, ch)?;
            let start = path.len();
            self.push_edge_text(child, path);
            let edge = &path[start..];
            rest = match rest.strip_prefix(edge) {
                Some(r) => r,
                None if edge.starts_with(rest) => "",
                None => return None,
            };
            pos = child;
        }
        Some(pos)
    }

    /// Words that are prefixes of `text`, shortest first, with their ids.
    ///
    /// ```
    /// let trie = owtrie::build_trie(["a", "ab", "abc", "b"]).unwrap();
    /// let found: Vec<_> = trie.common_prefixes("abd").into_iter().map(|(w, _)| w).collect();
    /// assert_eq!(found, ["a", "ab"]);
    /// ```
    pub fn common_prefixes(&self, text: &str) -> Vec<(String, u32)> {
        let mut found = Vec::new();
        let mut pos = ROOT;
        let mut offset = 0;
        while let Some(ch) = text[offset..].chars().next() {
            let Some(child) = self.child(pos, ch) else {
                break;
            };
            offset += ch.len_utf8();
            if let Some(tail) = self.tail(child) {
                if !text[offset..].starts_with(&*tail) {
                    break;
                }
                offset += tail.len();
            }
            pos = child;
            if self.is_terminal(pos) {
                found.push((text[..offset].to_owned(), self.id_at(pos)));
            }
        }
        found
    }

    /// Writes every word, one per line, in code point order.
    pub fn write_words(&self, mut out: impl Write) -> Result<()> {
        for word in self.iter() {
            writeln!(out, "{word}")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Size accounting for this trie and its serialized form.
    pub fn stats(&self) -> Result<TrieStats> {
        let mut tail_section = Vec::new();
        self.tails.write_to(&mut tail_section)?;
        let mut encoded = Vec::new();
        format::write_trie(self, &mut encoded)?;

        let word_count = self.len();
        let node_count = self.node_count();
        Ok(TrieStats {
            word_count,
            node_count,
            edge_count: node_count - 1,
            link_count: self.tails.link_count(),
            tail_count: self.tail_store().len(),
            tail_depth: self.tail_store().depth(),
            tail_buffer_size: tail_section.len(),
            serialized_bytes: encoded.len(),
            bytes_per_word: match word_count {
                0 => 0.0,
                n => encoded.len() as f64 / n as f64,
            },
        })
    }
}

/// Sizes reported by [`Trie::stats`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrieStats {
    /// Number of words.
    pub word_count: usize,
    /// LOUDS nodes including the root.
    pub node_count: usize,
    /// Edges, one per non-root node.
    pub edge_count: usize,
    /// Edges carrying a tail.
    pub link_count: usize,
    /// Distinct tails.
    pub tail_count: usize,
    /// Levels of nested tail tries.
    pub tail_depth: usize,
    /// Bytes of the serialized tail section.
    pub tail_buffer_size: usize,
    /// Bytes of the uncompressed (v7) serialization.
    pub serialized_bytes: usize,
    /// `serialized_bytes / word_count`.
    pub bytes_per_word: f64,
}

impl fmt::Display for TrieStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "words:        {}", self.word_count)?;
        writeln!(f, "nodes:        {}", self.node_count)?;
        writeln!(f, "edges:        {} ({} with tails)", self.edge_count, self.link_count)?;
        writeln!(f, "tails:        {} distinct, depth {}", self.tail_count, self.tail_depth)?;
        writeln!(f, "tail bytes:   {}", self.tail_buffer_size)?;
        writeln!(f, "total bytes:  {}", self.serialized_bytes)?;
        write!(f, "bytes/word:   {:.2}", self.bytes_per_word)
    }
}

struct Frame {
    pos: usize,
    /// Length of the path buffer at the parent.
    base_len: usize,
    /// Whether this node's edge text still has to be appended.
    append: bool,
}

/// Depth-first iterator over the words below a node, in code point order.
///
/// Created by [`Trie::iter`] and [`Trie::iter_prefix`].
pub struct PrefixIter<'a> {
    trie: &'a Trie,
    stack: Vec<Frame>,
    buf: String,
}

impl Iterator for PrefixIter<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while let Some(frame) = self.stack.pop() {
            self.buf.truncate(frame.base_len);
            if frame.append {
                self.trie.push_edge_text(frame.pos, &mut self.buf);
            }
            let base_len = self.buf.len();
            self.stack.extend(self.trie.children(frame.pos).rev().map(|pos| Frame {
                pos,
                base_len,
                append: true,
            }));
            if self.trie.is_terminal(frame.pos) {
                return Some(self.buf.clone());
            }
        }
        None
    }
}

impl<'a> IntoIterator for &'a Trie {
    type Item = String;
    type IntoIter = PrefixIter<'a>;

    fn into_iter(self) -> PrefixIter<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use crate::{build_trie, build_trie_with, TailPolicy, TrieConfig};

    #[test]
    fn shared_prefix_words() {
        let trie = build_trie(["ant", "ante", "anti"]).unwrap();
        assert!(trie.has("ant"));
        assert!(!trie.has("an"));
        assert!(!trie.has("antler"));
        assert_eq!(trie.len(), 3);
    }

    #[test]
    fn nested_words() {
        let words = ["a", "ab", "abc", "abcd", "abcde"];
        let trie = build_trie(words).unwrap();
        for word in words {
            assert!(trie.has(word), "{word}");
        }
        assert!(!trie.has(""));
        assert!(!trie.has("abcdef"));
        assert_eq!(trie.word_id(""), None);
    }

    #[test]
    fn prefix_enumeration() {
        let trie =
            build_trie(["apple", "application", "approbation", "banana", "bandana"]).unwrap();
        assert_eq!(
            trie.keys_with_prefix("app", None),
            ["apple", "application", "approbation"]
        );
        assert_eq!(trie.keys_with_prefix("ban", Some(1)), ["banana"]);
        assert_eq!(trie.keys_with_prefix("ban", Some(0)), Vec::<String>::new());
        assert!(trie.keys_with_prefix("cherry", None).is_empty());
        assert_eq!(trie.keys_with_prefix("", None).len(), 5);
    }

    #[test]
    fn prefix_ending_inside_a_tail() {
        let trie = build_trie(["approbation", "banana"]).unwrap();
        assert_eq!(trie.keys_with_prefix("approb", None), ["approbation"]);
        assert_eq!(trie.keys_with_prefix("approbation", None), ["approbation"]);
        assert!(trie.keys_with_prefix("approx", None).is_empty());
        assert!(trie.keys_with_prefix("approbations", None).is_empty());
    }

    #[test]
    fn unicode_words() {
        let words = ["café", "naïve", "日本語", "🎉"];
        let trie = build_trie(words).unwrap();
        for word in words {
            assert!(trie.has(word), "{word}");
            let id = trie.word_id(word).unwrap();
            assert_eq!(trie.get_word(id).as_deref(), Some(word));
        }
        assert!(!trie.has("cafe"));
        assert!(!trie.has("日本"));
    }

    #[test]
    fn ids_are_dense() {
        let trie = build_trie(["b", "a", "ab", "ba", "abc"]).unwrap();
        let all: Vec<String> = trie.iter().collect();
        assert_eq!(all, ["a", "ab", "abc", "b", "ba"]);
        let ids: BTreeSet<u32> = all.iter().map(|w| trie.word_id(w).unwrap()).collect();
        assert_eq!(ids, (0..5).collect());
        assert_eq!(trie.get_word(5), None);
    }

    #[test]
    fn common_prefixes_of_text() {
        let trie = build_trie(["a", "ab", "abc", "abcde", "b"]).unwrap();
        let found = trie.common_prefixes("abcdx");
        let words: Vec<&str> = found.iter().map(|(w, _)| w.as_str()).collect();
        assert_eq!(words, ["a", "ab", "abc"]);
        for (word, id) in &found {
            assert_eq!(trie.word_id(word), Some(*id));
        }
        assert!(trie.common_prefixes("xyz").is_empty());
        assert!(trie.common_prefixes("").is_empty());
    }

    #[test]
    fn write_words_lists_every_word() {
        let trie = build_trie(["zeta", "alpha", "mu"]).unwrap();
        let mut out = Vec::new();
        trie.write_words(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "alpha\nmu\nzeta\n");
    }

    #[test]
    fn stats_account_for_structure() {
        let trie = build_trie(["xnation", "ynation", "znation"]).unwrap();
        let stats = trie.stats().unwrap();
        assert_eq!(stats.word_count, 3);
        assert_eq!(stats.node_count, 4);
        assert_eq!(stats.edge_count, 3);
        assert_eq!(stats.link_count, 3);
        assert_eq!(stats.tail_count, 1);
        assert_eq!(stats.tail_depth, 0);
        assert!(stats.tail_buffer_size > "nation".len());
        assert!(stats.serialized_bytes > stats.tail_buffer_size);
        assert!(stats.to_string().contains("words:        3"));
    }

    #[test]
    fn recursive_tails_answer_queries() {
        let stems = ["n", "st", "c", "r", "l", "v", "m", "p"];
        let endings = ["ation", "ition", "otion", "ution"];
        let words: Vec<String> = stems
            .iter()
            .flat_map(|s| endings.iter().map(move |e| format!("{s}{e}s")))
            .collect();
        let config = TrieConfig::default().with_tail_policy(TailPolicy::Recursive);
        let trie = build_trie_with(&words, config).unwrap();
        assert!(trie.tail_store().is_recursive());
        for word in &words {
            assert!(trie.has(word), "{word}");
            let got = trie.get_word(trie.word_id(word).unwrap());
            assert_eq!(got.as_ref(), Some(word));
        }
        assert!(!trie.has("nation"));
        assert_eq!(trie.keys_with_prefix("st", None).len(), endings.len());
        assert_eq!(trie.stats().unwrap().tail_depth, trie.tail_store().depth());
    }

    proptest! {
        #[test]
        fn membership_and_ids(
            words in prop::collection::btree_set("[a-dé日🎉]{1,7}", 0..60),
            queries in prop::collection::vec("[a-dé日🎉]{0,7}", 0..20),
        ) {
            let config = TrieConfig::default()
                .with_tail_policy(TailPolicy::Recursive)
                .with_max_tail_depth(2);
            let trie = build_trie_with(&words, config).unwrap();
            prop_assert_eq!(trie.len(), words.len());
            for query in &queries {
                prop_assert_eq!(trie.has(query), words.contains(query));
            }
            let mut seen = BTreeSet::new();
            for word in &words {
                let id = trie.word_id(word).unwrap();
                prop_assert!((id as usize) < words.len());
                prop_assert!(seen.insert(id));
                let got = trie.get_word(id);
                prop_assert_eq!(got.as_ref(), Some(word));
            }
            let listed: Vec<String> = trie.iter().collect();
            prop_assert_eq!(listed, words.iter().cloned().collect::<Vec<_>>());
        }

        #[test]
        fn prefix_queries_match_filtering(
            words in prop::collection::btree_set("[a-c]{1,6}", 0..40),
            text in "[a-c]{0,8}",
        ) {
            let trie = build_trie(&words).unwrap();
            let prefix: String = text.chars().take(2).collect();
            let expected: Vec<String> =
                words.iter().filter(|w| w.starts_with(&prefix)).cloned().collect();
            prop_assert_eq!(trie.keys_with_prefix(&prefix, None), expected);

            let expected: Vec<&String> =
                words.iter().filter(|w| text.starts_with(w.as_str())).collect();
            let found = trie.common_prefixes(&text);
            prop_assert_eq!(found.iter().map(|(w, _)| w).collect::<Vec<_>>(), expected);
            for (word, id) in &found {
                prop_assert_eq!(trie.word_id(word), Some(*id));
            }
        }
    }
}

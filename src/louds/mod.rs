//! The succinct trie.
//!
//! Topology is a LOUDS bit sequence: a `10` prefix for the virtual
//! super-root, then for every node in level order one `1` per child and a
//! closing `0`. A node is identified by the position of the `1` that
//! introduces it; the root is position 0. Terminal and link flags are bit
//! vectors over the same positions, so the word id of a terminal node is
//! its terminal rank and the tail of a linked edge is found by link rank.
//!
//! With `k = rank1(pos)` the node number of `pos` (root = 1):
//!
//! * children of `pos` occupy `select0(k) + 1 .. select0(k + 1)`;
//! * the parent of `pos` is `select1(rank0(pos - 1))`;
//! * the label of the edge into `pos` is `labels[k - 2]`.

use std::borrow::Cow;
use std::ops::Range;

use crate::bit_vector::BitVector;
use crate::config::LabelEncoding;

pub(crate) mod layout;
mod query;
pub(crate) mod tails;

pub use query::{PrefixIter, TrieStats};
pub use tails::{FlatTails, TailStore};
use tails::Tails;

/// Position of the root node.
pub(crate) const ROOT: usize = 0;

/// Immutable, path-compressed LOUDS trie over a set of words.
///
/// Built by [`Builder`](crate::Builder) or decoded by
/// [`Trie::from_bytes`]; both answer every query identically. A `Trie`
/// is never mutated after construction and can be shared between threads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trie {
    pub(crate) topology: BitVector,
    pub(crate) terminal: BitVector,
    pub(crate) links: BitVector,
    /// Label of the edge into every non-root node, by node number.
    pub(crate) labels: Vec<char>,
    pub(crate) tails: Tails,
    pub(crate) label_encoding: LabelEncoding,
    /// Nesting level: 0 for a top-level trie, 1 for its tail trie, ...
    pub(crate) depth: u8,
}

impl Trie {
    /// Number of words.
    pub fn len(&self) -> usize {
        self.terminal.count_ones()
    }

    /// True if the trie holds no words.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of LOUDS nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.topology.count_ones()
    }

    /// How tails are stored.
    pub fn tail_store(&self) -> &TailStore {
        self.tails.store()
    }

    /// The label encoding used when this trie is serialized.
    pub fn label_encoding(&self) -> LabelEncoding {
        self.label_encoding
    }

    /// Positions of the children of the node at `pos`, in label order.
    ///
    /// Children always follow their parent; a malformed topology that
    /// points backwards yields an empty range instead of a cycle.
    pub(crate) fn children(&self, pos: usize) -> Range<usize> {
        let k = self.topology.rank1(pos);
        match (self.topology.select0(k), self.topology.select0(k + 1)) {
            (Some(open), Some(close)) => {
                let start = (open + 1).max(pos + 1);
                start..close.max(start)
            }
            _ => 0..0,
        }
    }

    /// Index into `labels` of the edge into `pos`.
    #[inline]
    fn label_index(&self, pos: usize) -> Option<usize> {
        self.topology.rank1_before(pos).checked_sub(1)
    }

    /// The child of `pos` whose edge starts with `ch`.
    pub(crate) fn child(&self, pos: usize, ch: char) -> Option<usize> {
        let range = self.children(pos);
        if range.is_empty() {
            return None;
        }
        let base = self.label_index(range.start)?;
        let siblings = self.labels.get(base..base + range.len())?;
        siblings
            .binary_search(&ch)
            .ok()
            .map(|offset| range.start + offset)
    }

    /// The parent of `pos`, `None` for the root.
    pub(crate) fn parent(&self, pos: usize) -> Option<usize> {
        if pos == ROOT {
            return None;
        }
        let run = self.topology.rank0_before(pos);
        self.topology.select1(run).filter(|&parent| parent < pos)
    }

    /// First code point of the edge into `pos`.
    #[inline]
    pub(crate) fn label(&self, pos: usize) -> Option<char> {
        self.labels.get(self.label_index(pos)?).copied()
    }

    /// Rest of the edge into `pos` when path compression folded a chain
    /// into it.
    pub(crate) fn tail(&self, pos: usize) -> Option<Cow<'_, str>> {
        if !self.links.bit(pos) {
            return None;
        }
        self.tails.get(self.links.rank1_before(pos))
    }

    /// Appends the full text of the edge into `pos`.
    pub(crate) fn push_edge_text(&self, pos: usize, out: &mut String) {
        if let Some(label) = self.label(pos) {
            out.push(label);
        }
        if let Some(tail) = self.tail(pos) {
            out.push_str(&tail);
        }
    }

    #[inline]
    pub(crate) fn is_terminal(&self, pos: usize) -> bool {
        self.terminal.bit(pos)
    }
}

#[cfg(test)]
mod test {
    use crate::build_trie;

    #[test]
    fn navigation_matches_level_order() {
        let trie = build_trie(["an", "at", "b"]).unwrap();
        let root_children = trie.children(super::ROOT);
        assert_eq!(root_children.len(), 2);
        let a = trie.child(super::ROOT, 'a').unwrap();
        let b = trie.child(super::ROOT, 'b').unwrap();
        assert_eq!(b, a + 1);
        assert_eq!(trie.parent(a), Some(super::ROOT));
        assert_eq!(trie.label(a), Some('a'));
        assert!(trie.is_terminal(b));
        assert!(!trie.is_terminal(a));
        let an = trie.child(a, 'n').unwrap();
        assert_eq!(trie.parent(an), Some(a));
        assert!(trie.is_terminal(an));
        assert_eq!(trie.parent(super::ROOT), None);
    }

    #[test]
    fn chains_become_tails() {
        let trie = build_trie(["abcdef", "abxyz"]).unwrap();
        // root ─a+"b"→ branch ─c+"def"→ leaf, ─x+"yz"→ leaf
        assert_eq!(trie.node_count(), 4);
        let ab = trie.child(super::ROOT, 'a').unwrap();
        assert_eq!(trie.tail(ab).as_deref(), Some("b"));
        let cdef = trie.child(ab, 'c').unwrap();
        let mut text = String::new();
        trie.push_edge_text(cdef, &mut text);
        assert_eq!(text, "cdef");
    }
}

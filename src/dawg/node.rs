use smallvec::SmallVec;

/// Index of a node in a builder or DAWG arena.
pub type NodeId = u32;

/// The outgoing edges of a node, sorted by code point.
///
/// Most nodes of a word trie have one or two children, so those are kept
/// inline and only wider nodes allocate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Children(SmallVec<[(char, NodeId); 2]>);

impl Children {
    /// Returns the node that `letter`'s edge leads to.
    #[inline]
    pub fn get(&self, letter: char) -> Option<NodeId> {
        self.0
            .binary_search_by_key(&letter, |&(c, _)| c)
            .ok()
            .map(|i| self.0[i].1)
    }

    /// Inserts an edge in sorted position.
    ///
    /// Panics in debug builds if `letter` already exists.
    pub(crate) fn insert(&mut self, letter: char, child: NodeId) {
        let pos = self.0.partition_point(|&(c, _)| c < letter);
        debug_assert!(
            self.0.get(pos).map_or(true, |&(c, _)| c != letter),
            "insert: letter already exists"
        );
        self.0.insert(pos, (letter, child));
    }

    /// The only edge, if there is exactly one.
    #[inline]
    pub fn single(&self) -> Option<(char, NodeId)> {
        match self.0.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Iterates over `(letter, child)` pairs in letter order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (char, NodeId)> + ExactSizeIterator + '_ {
        self.0.iter().copied()
    }

    /// Number of edges.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the node is a leaf.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rewrites every child id through `map`.
    pub(crate) fn map_ids(&self, mut map: impl FnMut(NodeId) -> NodeId) -> Children {
        Children(self.0.iter().map(|&(c, n)| (c, map(n))).collect())
    }
}

/// A node of the construction-time graph.
///
/// Once the children of a node are canonical ids, the node value itself is
/// its structural signature: two nodes compare and hash equal exactly when
/// they have the same terminal flag and the same `(letter, child id)`
/// edges, which is what minimization interns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BuildNode {
    children: Children,
    terminal: bool,
}

impl BuildNode {
    /// Creates a node without children.
    pub fn new(terminal: bool) -> Self {
        BuildNode {
            children: Children::default(),
            terminal,
        }
    }

    pub(crate) fn with_children(terminal: bool, children: Children) -> Self {
        BuildNode { children, terminal }
    }

    /// True if a word ends at this node.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub(crate) fn set_terminal(&mut self) {
        self.terminal = true;
    }

    /// The outgoing edges.
    #[inline]
    pub fn children(&self) -> &Children {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Children {
        &mut self.children
    }

    /// Returns the child reached by `letter`.
    #[inline]
    pub fn get(&self, letter: char) -> Option<NodeId> {
        self.children.get(letter)
    }

    /// True if path compression folds this node into its parent's edge:
    /// it ends no word and has exactly one way out.
    #[inline]
    pub fn is_chain_link(&self) -> bool {
        !self.terminal && self.children.len() == 1
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_children() {
        let n = BuildNode::new(false);
        assert_eq!(n.children().iter().next(), None);
        assert!(n.children().is_empty());
        assert!(!n.is_chain_link());
    }

    #[test]
    fn children_stay_sorted() {
        let mut n = BuildNode::new(false);
        for (i, ch) in ['m', 'a', 'z', 'é', 'b'].into_iter().enumerate() {
            n.children_mut().insert(ch, i as NodeId);
        }
        let letters: Vec<char> = n.children().iter().map(|(c, _)| c).collect();
        assert_eq!(letters, ['a', 'b', 'm', 'z', 'é']);
        assert_eq!(n.get('z'), Some(2));
        assert_eq!(n.get('q'), None);
    }

    #[test]
    fn single_child_is_a_chain_link() {
        let mut n = BuildNode::new(false);
        n.children_mut().insert('x', 7);
        assert_eq!(n.children().single(), Some(('x', 7)));
        assert!(n.is_chain_link());
        n.set_terminal();
        assert!(!n.is_chain_link());
    }

    #[test]
    fn signature_equality_is_one_level_deep() {
        let mut a = BuildNode::new(true);
        a.children_mut().insert('s', 3);
        let mut b = BuildNode::new(true);
        b.children_mut().insert('s', 3);
        assert_eq!(a, b);
        b.children_mut().insert('t', 4);
        assert_ne!(a, b);
        let remapped = BuildNode::with_children(true, a.children().map_ids(|id| id + 1));
        assert_eq!(remapped.get('s'), Some(4));
    }

    #[test]
    fn a_thousand_children() {
        let mut n = BuildNode::new(false);
        let letters: Vec<char> = (0..).filter_map(char::from_u32).take(1000).collect();
        for &ch in letters.iter().rev() {
            n.children_mut().insert(ch, ch as NodeId);
        }
        assert_eq!(n.children().len(), 1000);
        for ch in letters {
            assert_eq!(n.get(ch), Some(ch as NodeId));
        }
    }
}

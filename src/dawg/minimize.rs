use hashbrown::HashMap;

use super::node::{BuildNode, NodeId};

/// A minimized word graph: structurally identical subtrees are stored once.
///
/// Node ids are assigned contiguously in post-order, so every child id is
/// smaller than its parent's and the root comes last.
#[derive(Clone, Debug)]
pub struct Dawg {
    nodes: Vec<BuildNode>,
    word_count: usize,
}

impl Dawg {
    /// Number of distinct nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the graph holds only a root.
    pub fn is_empty(&self) -> bool {
        self.word_count == 0
    }

    /// Number of words accepted by the graph.
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.children().len()).sum()
    }

    /// Id of the root node.
    pub fn root(&self) -> NodeId {
        (self.nodes.len() - 1) as NodeId
    }

    /// The node with id `id`.
    #[inline]
    pub fn node(&self, id: NodeId) -> &BuildNode {
        &self.nodes[id as usize]
    }

    /// Follows `path` from the root.
    pub fn walk(&self, path: &str) -> Option<NodeId> {
        path.chars()
            .try_fold(self.root(), |id, ch| self.node(id).get(ch))
    }

    /// True if `word` is accepted.
    pub fn contains(&self, word: &str) -> bool {
        self.walk(word).is_some_and(|id| self.node(id).is_terminal())
    }
}

/// Unifies every set of structurally identical subtrees of the trie in
/// `nodes` (root at index 0).
///
/// One post-order pass rewrites each node's children to their canonical
/// ids, after which the node is its own signature and is interned in a
/// signature → id register.
pub(crate) fn minimize(nodes: &[BuildNode], word_count: usize) -> Dawg {
    const UNSET: NodeId = NodeId::MAX;

    let mut canonical = vec![UNSET; nodes.len()];
    let mut register: HashMap<BuildNode, NodeId> = HashMap::new();
    let mut out: Vec<BuildNode> = Vec::new();

    let mut stack: Vec<(NodeId, bool)> = vec![(0, false)];
    while let Some((id, expanded)) = stack.pop() {
        let node = &nodes[id as usize];
        if !expanded {
            stack.push((id, true));
            stack.extend(node.children().iter().map(|(_, child)| (child, false)));
            continue;
        }
        let children = node.children().map_ids(|child| {
            debug_assert_ne!(canonical[child as usize], UNSET, "child not canonical yet");
            canonical[child as usize]
        });
        let signature = BuildNode::with_children(node.is_terminal(), children);
        let interned = match register.get(&signature) {
            Some(&existing) => existing,
            None => {
                let new_id = out.len() as NodeId;
                out.push(signature.clone());
                register.insert(signature, new_id);
                new_id
            }
        };
        canonical[id as usize] = interned;
    }

    Dawg {
        nodes: out,
        word_count,
    }
}

#[cfg(test)]
mod test {
    use crate::Builder;

    #[test]
    fn empty_builder_has_only_a_root() {
        let dawg = Builder::new().minimize();
        assert_eq!(dawg.len(), 1);
        assert!(dawg.is_empty());
        assert!(!dawg.contains(""));
    }

    #[test]
    fn children_precede_parents() {
        let mut builder = Builder::new();
        builder.extend(["tion", "ation", "nation", "station", "cation"]);
        let dawg = builder.minimize();
        for id in 0..dawg.len() as u32 {
            for (_, child) in dawg.node(id).children().iter() {
                assert!(child < id);
            }
        }
        assert_eq!(dawg.root() as usize, dawg.len() - 1);
    }

    #[test]
    fn shared_suffix_is_one_node() {
        let mut builder = Builder::new();
        builder.extend(["nation", "ration", "lotion"]);
        let dawg = builder.minimize();
        assert_eq!(dawg.walk("nat"), dawg.walk("rat"));
        assert_eq!(dawg.walk("nati"), dawg.walk("loti"));
        assert_eq!(dawg.walk("n"), dawg.walk("r"));
        assert_ne!(dawg.walk("n"), dawg.walk("l"));
        assert_eq!(dawg.word_count(), 3);
        assert!(dawg.edge_count() < "nationrationlotion".len());
    }
}

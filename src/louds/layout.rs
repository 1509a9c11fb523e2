//! Lays a minimized DAWG out as a path-compressed LOUDS trie.

use std::collections::VecDeque;

use hashbrown::HashMap;
use tracing::debug;

use super::tails::Tails;
use super::Trie;
use crate::bit_vector::BitVectorBuilder;
use crate::config::TrieConfig;
use crate::dawg::{Dawg, NodeId};
use crate::errors::Result;

/// Where an edge leads once its chain of single-child nodes is folded in.
#[derive(Clone, Copy)]
struct Edge {
    /// Index of the folded text among the distinct tails.
    tail: Option<u32>,
    target: NodeId,
}

/// Folds chains and interns their text. Chains are cached per DAWG node,
/// so a suffix shared by many words is walked once.
#[derive(Default)]
struct Folder {
    edges: HashMap<NodeId, Edge>,
    interned: HashMap<String, u32>,
    distinct: Vec<String>,
}

impl Folder {
    fn follow(&mut self, dawg: &Dawg, child: NodeId) -> Edge {
        if let Some(&edge) = self.edges.get(&child) {
            return edge;
        }
        let mut text = String::new();
        let mut target = child;
        while dawg.node(target).is_chain_link() {
            let Some((ch, next)) = dawg.node(target).children().single() else {
                break;
            };
            text.push(ch);
            target = next;
        }
        let tail = (!text.is_empty()).then(|| self.intern(text));
        let edge = Edge { tail, target };
        self.edges.insert(child, edge);
        edge
    }

    fn intern(&mut self, text: String) -> u32 {
        if let Some(&index) = self.interned.get(&text) {
            return index;
        }
        let index = self.distinct.len() as u32;
        self.distinct.push(text.clone());
        self.interned.insert(text, index);
        index
    }
}

/// Expands `dawg` into a tree in level order and encodes it.
///
/// Shared DAWG nodes are expanded once per path reaching them, which keeps
/// word ids a bijection; the sharing survives in the tails, where equal
/// chain texts are stored once.
pub(crate) fn lay_out(dawg: &Dawg, config: &TrieConfig, depth: u8) -> Result<Trie> {
    let mut topology = BitVectorBuilder::default();
    let mut terminal = BitVectorBuilder::default();
    let mut links = BitVectorBuilder::default();
    let mut labels = Vec::new();
    let mut refs = Vec::new();
    let mut folder = Folder::default();

    let mut push = |is_node: bool, is_terminal: bool, is_link: bool| {
        topology.push(is_node);
        terminal.push(is_terminal);
        links.push(is_link);
    };

    // Super-root: its single child is the root at position 0.
    push(true, false, false);
    push(false, false, false);

    let mut queue = VecDeque::from([dawg.root()]);
    while let Some(id) = queue.pop_front() {
        for (ch, child) in dawg.node(id).children().iter() {
            let edge = folder.follow(dawg, child);
            push(true, dawg.node(edge.target).is_terminal(), edge.tail.is_some());
            labels.push(ch);
            refs.extend(edge.tail);
            queue.push_back(edge.target);
        }
        push(false, false, false);
    }

    debug!(
        "depth {depth}: {} LOUDS nodes, {} links, {} distinct tails",
        labels.len() + 1,
        refs.len(),
        folder.distinct.len()
    );

    let tails = Tails::build(folder.distinct, refs, config, depth)?;
    Ok(Trie {
        topology: topology.build(),
        terminal: terminal.build(),
        links: links.build(),
        labels,
        tails,
        label_encoding: config.labels,
        depth,
    })
}

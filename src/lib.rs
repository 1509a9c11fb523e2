//! # owtrie
//!
//! A succinct, immutable word trie for large static word lists.
//!
//! Words are first collected into a plain trie and minimized into a
//! [DAWG](https://en.wikipedia.org/wiki/Deterministic_acyclic_finite_state_automaton)
//! so that shared suffixes are stored once. The result is laid out as a
//! [LOUDS](https://en.wikipedia.org/wiki/Succinct_data_structure) bit
//! sequence with MARISA-style path compression: chains of single-child
//! nodes collapse into one edge whose remaining text lives in a tail store,
//! which can itself be a trie over the reversed tails.
//!
//! ## Features
//!
//! - **Dense word ids**: every word gets an id in `0..len()`, and ids map
//!   back to words
//! - **Prefix queries**: enumerate completions of a prefix or find every
//!   word that is a prefix of a text
//! - **Compact serialization**: rank/select bit vectors, canonical Huffman
//!   labels and optional brotli compression in the "OWTRIE" format
//! - **Thread-safe**: a built [`Trie`] is never mutated and is `Send + Sync`
//!
//! ## Quick Start
//!
//! ```
//! use owtrie::{build_trie, FormatVersion, Trie};
//!
//! let trie = build_trie(["apple", "application", "approbation", "banana"]).unwrap();
//! assert!(trie.has("apple"));
//! assert!(!trie.has("app"));
//!
//! let id = trie.word_id("banana").unwrap();
//! assert_eq!(trie.get_word(id).as_deref(), Some("banana"));
//! assert_eq!(trie.keys_with_prefix("appl", None), ["apple", "application"]);
//!
//! let bytes = trie.to_bytes(FormatVersion::V7).unwrap();
//! let loaded = Trie::from_bytes(&bytes).unwrap();
//! assert_eq!(loaded.word_id("banana"), Some(id));
//! ```
//!
//! ## Configuration
//!
//! [`TrieConfig`] selects the label encoding and how tails are stored:
//!
//! ```
//! use owtrie::{build_trie_with, LabelEncoding, TailPolicy, TrieConfig};
//!
//! let config = TrieConfig::default()
//!     .with_labels(LabelEncoding::Literal)
//!     .with_tail_policy(TailPolicy::Recursive);
//! let trie = build_trie_with(["nation", "station", "ration"], config).unwrap();
//! assert_eq!(trie.len(), 3);
//! ```

#![warn(missing_docs)]

pub mod bit_vector;
pub mod codec;
pub mod config;
/// Construction: word insertion and DAWG minimization.
pub mod dawg;
pub mod errors;
pub mod format;
pub mod huffman;
pub mod louds;
mod wire;

pub use bit_vector::{BitVector, BitVectorBuilder};
pub use codec::{BrotliCodec, BrotliConfig, PayloadCodec};
pub use config::{LabelEncoding, TailPolicy, TrieConfig};
pub use dawg::builder::{build_trie, build_trie_from_file, build_trie_from_reader, build_trie_with};
pub use dawg::{Builder, IntoWord};
pub use errors::{Result, TrieError};
pub use format::FormatVersion;
pub use huffman::HuffmanCodec;
pub use louds::{FlatTails, PrefixIter, TailStore, Trie, TrieStats};

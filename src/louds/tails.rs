//! Storage for the suffixes stripped by path compression.
//!
//! Every linked edge owns one reference into a store of distinct tails.
//! The store is either flat UTF-8 text or a nested trie of the reversed
//! tails: reversing turns shared endings such as "-ation" into shared
//! prefixes, which the nested trie then stores once.

use std::borrow::Cow;

use tracing::{debug, trace};

use super::Trie;
use crate::config::TrieConfig;
use crate::dawg::Builder;
use crate::errors::{Result, TrieError};
use crate::format;
use crate::wire::{write_len, write_varint, ByteReader};

/// Distinct tails as concatenated UTF-8.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlatTails {
    text: String,
    /// Exclusive end offset of each tail in `text`.
    ends: Vec<u32>,
}

impl FlatTails {
    fn from_tails(tails: &[String]) -> Result<Self> {
        let mut text = String::with_capacity(tails.iter().map(String::len).sum());
        let mut ends = Vec::with_capacity(tails.len());
        for tail in tails {
            text.push_str(tail);
            ends.push(u32::try_from(text.len()).map_err(|_| {
                TrieError::construction("tails", "tail text exceeds u32::MAX bytes")
            })?);
        }
        Ok(FlatTails { text, ends })
    }

    /// Number of distinct tails.
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    /// True if there are no tails.
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// The tail at `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        let end = *self.ends.get(index)? as usize;
        let start = match index {
            0 => 0,
            _ => self.ends[index - 1] as usize,
        };
        self.text.get(start..end)
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        write_len(self.ends.len(), out);
        let mut start = 0;
        for &end in &self.ends {
            write_varint(u64::from(end - start), out);
            start = end;
        }
        out.extend_from_slice(self.text.as_bytes());
    }

    fn read_from(reader: &mut ByteReader) -> Result<Self> {
        let count = reader.read_len("tail count")?;
        let mut ends = Vec::with_capacity(count);
        let mut total = 0u32;
        for _ in 0..count {
            let len = reader.read_varint_u32("tail lengths")?;
            total = total
                .checked_add(len)
                .ok_or_else(|| TrieError::format("Tail text too long"))?;
            ends.push(total);
        }
        let bytes = reader.take(total as usize, "tail text")?;
        let text = std::str::from_utf8(bytes)
            .map_err(|e| TrieError::format(format!("Tail text is not UTF-8: {e}")))?;
        if ends.iter().any(|&end| !text.is_char_boundary(end as usize)) {
            return Err(TrieError::format("Tail boundary splits a code point"));
        }
        Ok(FlatTails {
            text: text.to_owned(),
            ends,
        })
    }
}

/// How distinct tails are stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TailStore {
    /// Concatenated text.
    Flat(FlatTails),
    /// A trie of the reversed tails; references are its word ids.
    Recursive(Box<Trie>),
}

impl TailStore {
    /// True for a nested tail trie.
    pub fn is_recursive(&self) -> bool {
        matches!(self, TailStore::Recursive(_))
    }

    /// Number of distinct tails.
    pub fn len(&self) -> usize {
        match self {
            TailStore::Flat(flat) => flat.len(),
            TailStore::Recursive(nested) => nested.len(),
        }
    }

    /// True if there are no tails.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nesting levels below this store; 0 for flat.
    pub fn depth(&self) -> usize {
        match self {
            TailStore::Flat(_) => 0,
            TailStore::Recursive(nested) => 1 + nested.tail_store().depth(),
        }
    }
}

/// Tail references of the linked edges plus the store they point into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Tails {
    /// Store index for the `i`-th linked edge.
    refs: Vec<u32>,
    store: TailStore,
}

impl Tails {
    /// Stores `distinct` tails, nesting them into a trie when the config
    /// allows it at this depth. `refs` index into `distinct`.
    pub(crate) fn build(
        distinct: Vec<String>,
        refs: Vec<u32>,
        config: &TrieConfig,
        depth: u8,
    ) -> Result<Self> {
        let flat = FlatTails::from_tails(&distinct)?;
        if !config.may_nest(depth, distinct.len()) {
            return Ok(Tails {
                refs,
                store: TailStore::Flat(flat),
            });
        }

        trace!("depth {depth}: nesting {} distinct tails", distinct.len());
        let reversed: Vec<String> = distinct.iter().map(|t| t.chars().rev().collect()).collect();
        let mut builder = Builder::nested(config.clone(), depth + 1);
        builder.extend(&reversed);
        let nested = builder.build()?;

        let mut remap = Vec::with_capacity(reversed.len());
        for tail in &reversed {
            let id = nested.word_id(tail).ok_or_else(|| {
                TrieError::construction("tails", format!("tail {tail:?} missing from tail trie"))
            })?;
            remap.push(id);
        }

        let recursive = Tails {
            refs: refs.iter().map(|&r| remap[r as usize]).collect(),
            store: TailStore::Recursive(Box::new(nested)),
        };
        if config.tail_policy == crate::TailPolicy::Auto {
            let flat = Tails {
                refs,
                store: TailStore::Flat(flat),
            };
            let (flat_size, nested_size) = (flat.encoded_len()?, recursive.encoded_len()?);
            debug!("depth {depth}: flat tails {flat_size} bytes, nested {nested_size} bytes");
            if nested_size >= flat_size {
                return Ok(flat);
            }
        }
        Ok(recursive)
    }

    /// Number of linked edges.
    pub(crate) fn link_count(&self) -> usize {
        self.refs.len()
    }

    pub(crate) fn store(&self) -> &TailStore {
        &self.store
    }

    /// Tail of the `link`-th linked edge.
    pub(crate) fn get(&self, link: usize) -> Option<Cow<'_, str>> {
        let index = *self.refs.get(link)?;
        match &self.store {
            TailStore::Flat(flat) => flat.get(index as usize).map(Cow::Borrowed),
            TailStore::Recursive(nested) => nested
                .get_word(index)
                .map(|reversed| Cow::Owned(reversed.chars().rev().collect())),
        }
    }

    /// Appends the tail section: references, then the store. A nested
    /// store is a complete uncompressed trie buffer.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        write_len(self.refs.len(), out);
        for &r in &self.refs {
            write_varint(u64::from(r), out);
        }
        match &self.store {
            TailStore::Flat(flat) => flat.write_to(out),
            TailStore::Recursive(nested) => format::write_trie(nested, out)?,
        }
        Ok(())
    }

    fn encoded_len(&self) -> Result<usize> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf.len())
    }

    /// Reads a tail section that spans all of `bytes`.
    pub(crate) fn read_from(bytes: &[u8], recursive: bool, depth: u8) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let count = reader.read_len("tail references")?;
        let mut refs = Vec::with_capacity(count);
        for _ in 0..count {
            refs.push(reader.read_varint_u32("tail references")?);
        }
        let store = if recursive {
            let nested = format::read_trie(reader.rest(), depth + 1)?;
            reader.skip(reader.remaining(), "tail trie")?;
            TailStore::Recursive(Box::new(nested))
        } else {
            TailStore::Flat(FlatTails::read_from(&mut reader)?)
        };
        if reader.remaining() != 0 {
            return Err(TrieError::format("Trailing bytes after tail store"));
        }
        if refs.iter().any(|&r| r as usize >= store.len()) {
            return Err(TrieError::format("Tail reference out of range"));
        }
        Ok(Tails { refs, store })
    }
}

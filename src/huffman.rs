//! Canonical Huffman coding of edge labels.
//!
//! Code lengths come from the classic greedy merge of the two lightest
//! subtrees. Codes are then reassigned canonically: symbols sorted by
//! `(bit length, value)` receive consecutive code values, shifted left
//! whenever the length grows. A table is therefore fully described by the
//! number of symbols of each length and the symbol order, which is all
//! that gets serialized.
//!
//! Lengths are not limited. Codes are held in a `u64`, and a tree deeper
//! than 64 levels needs Fibonacci-skewed frequencies summing past 10^13,
//! which is rejected rather than approximated.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use hashbrown::HashMap;

use crate::errors::{Result, TrieError};
use crate::wire::{write_varint, ByteReader};

/// Longest code this codec can represent.
pub const MAX_CODE_LEN: u8 = 64;

/// Appends bits MSB-first into bytes; the last byte is zero padded.
#[derive(Clone, Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one bit.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) {
        let offset = self.bit_len % 8;
        if offset == 0 {
            self.bytes.push(0);
        }
        if bit {
            if let Some(last) = self.bytes.last_mut() {
                *last |= 0x80 >> offset;
            }
        }
        self.bit_len += 1;
    }

    /// Appends the low `count` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u64, count: u8) {
        for i in (0..count).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Returns the packed bytes.
    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Reads bits MSB-first from a byte slice.
#[derive(Clone, Debug)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Starts reading at the first bit of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        BitReader { bytes, pos: 0 }
    }

    /// Reads one bit, or `None` at the end of input.
    #[inline]
    pub fn read_bit(&mut self) -> Option<bool> {
        let byte = *self.bytes.get(self.pos / 8)?;
        let bit = byte & (0x80 >> (self.pos % 8)) != 0;
        self.pos += 1;
        Some(bit)
    }

    /// Number of bits consumed.
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// A canonical code: the low `len` bits of `bits`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Code {
    /// Number of bits.
    pub len: u8,
    /// Code value, right aligned.
    pub bits: u64,
}

const NO_CHILD: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecodeNode {
    Branch([u32; 2]),
    Leaf(u32),
}

/// Canonical Huffman table over `u32` symbols (code points).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HuffmanCodec {
    /// Symbols in canonical order, sorted by `(len, value)`.
    symbols: Vec<u32>,
    /// `counts[l - 1]` is the number of symbols with an `l`-bit code.
    counts: Vec<u32>,
    codes: HashMap<u32, Code>,
    tree: Vec<DecodeNode>,
}

impl HuffmanCodec {
    /// Builds a codec from symbol frequencies.
    ///
    /// Zero symbols give an empty codec and a single symbol gets the 1-bit
    /// code `0`. Symbols with frequency 0 are still assigned a code.
    pub fn from_frequencies(freqs: &HashMap<u32, u64>) -> Result<Self> {
        let mut leaves: Vec<(u32, u64)> = freqs.iter().map(|(&s, &f)| (s, f)).collect();
        leaves.sort_unstable_by_key(|&(s, _)| s);

        let lengths: Vec<(u32, u8)> = match leaves.len() {
            0 => return Ok(Self::default()),
            1 => vec![(leaves[0].0, 1)],
            n => {
                // Node ids double as tie breakers, so equal weights always
                // merge in the same order.
                let mut parent = vec![0usize; 2 * n - 1];
                let mut heap: BinaryHeap<Reverse<(u64, usize)>> = leaves
                    .iter()
                    .enumerate()
                    .map(|(id, &(_, f))| Reverse((f, id)))
                    .collect();
                let mut next = n;
                while let (Some(Reverse((fa, a))), Some(Reverse((fb, b)))) =
                    (heap.pop(), heap.pop())
                {
                    parent[a] = next;
                    parent[b] = next;
                    heap.push(Reverse((fa.saturating_add(fb), next)));
                    next += 1;
                }
                // Parents always have larger ids than their children.
                let root = 2 * n - 2;
                let mut depth = vec![0usize; 2 * n - 1];
                for id in (0..root).rev() {
                    depth[id] = depth[parent[id]] + 1;
                }
                let mut lengths = Vec::with_capacity(n);
                for (id, &(symbol, _)) in leaves.iter().enumerate() {
                    let len = u8::try_from(depth[id])
                        .ok()
                        .filter(|&l| l <= MAX_CODE_LEN)
                        .ok_or_else(|| {
                            TrieError::construction(
                                "frequencies",
                                format!("code length {} exceeds {MAX_CODE_LEN}", depth[id]),
                            )
                        })?;
                    lengths.push((symbol, len));
                }
                lengths
            }
        };
        Self::from_lengths(lengths)
    }

    /// Builds the canonical codec for the given code lengths.
    pub fn from_lengths(mut lengths: Vec<(u32, u8)>) -> Result<Self> {
        lengths.sort_unstable_by_key(|&(symbol, len)| (len, symbol));
        Self::assign(lengths).map_err(|_| {
            TrieError::construction("lengths", "code lengths violate the Kraft inequality")
        })
    }

    /// Assigns canonical codes to symbols already in canonical order.
    fn assign(ordered: Vec<(u32, u8)>) -> Result<Self> {
        let max_len = ordered.last().map_or(0, |&(_, len)| len);
        let mut counts = vec![0u32; max_len as usize];
        let mut symbols = Vec::with_capacity(ordered.len());
        let mut codes = HashMap::with_capacity(ordered.len());
        let mut tree = Vec::new();
        if !ordered.is_empty() {
            tree.push(DecodeNode::Branch([NO_CHILD; 2]));
        }

        let mut code = 0u64;
        let mut prev_len = 0u8;
        for (i, &(symbol, len)) in ordered.iter().enumerate() {
            if len == 0 || len > MAX_CODE_LEN || len < prev_len {
                return Err(TrieError::format(format!("Invalid Huffman code length {len}")));
            }
            if i > 0 {
                code = next_code(code, prev_len, len)
                    .ok_or_else(|| TrieError::format("Huffman table is over-subscribed"))?;
            }
            prev_len = len;
            let assigned = Code { len, bits: code };
            if codes.insert(symbol, assigned).is_some() {
                return Err(TrieError::format(format!("Duplicate Huffman symbol {symbol}")));
            }
            counts[len as usize - 1] += 1;
            symbols.push(symbol);
            insert_code(&mut tree, symbol, assigned);
        }

        Ok(HuffmanCodec {
            symbols,
            counts,
            codes,
            tree,
        })
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// True if the codec has no symbols.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Longest code length, 0 for an empty codec.
    pub fn max_bit_len(&self) -> u8 {
        self.counts.len() as u8
    }

    /// The code assigned to `symbol`.
    pub fn code(&self, symbol: u32) -> Option<Code> {
        self.codes.get(&symbol).copied()
    }

    /// Writes the code of `symbol`.
    pub fn encode(&self, symbol: u32, writer: &mut BitWriter) -> Result<()> {
        let code = self.code(symbol).ok_or_else(|| {
            TrieError::construction("symbol", format!("U+{symbol:04X} is not in the Huffman table"))
        })?;
        writer.write_bits(code.bits, code.len);
        Ok(())
    }

    /// Reads one symbol.
    pub fn decode(&self, reader: &mut BitReader) -> Result<u32> {
        if self.tree.is_empty() {
            return Err(TrieError::format("Decoding with an empty Huffman table"));
        }
        let mut node = 0usize;
        loop {
            match self.tree[node] {
                DecodeNode::Leaf(symbol) => return Ok(symbol),
                DecodeNode::Branch(children) => {
                    let bit = reader
                        .read_bit()
                        .ok_or_else(|| TrieError::format("Huffman bitstream ended early"))?;
                    let child = children[bit as usize];
                    if child == NO_CHILD {
                        return Err(TrieError::format("Invalid Huffman code in bitstream"));
                    }
                    node = child as usize;
                }
            }
        }
    }

    /// Appends the table: max length, per-length counts, then the symbols
    /// in canonical order.
    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.push(self.max_bit_len());
        for &count in &self.counts {
            write_varint(u64::from(count), out);
        }
        for &symbol in &self.symbols {
            write_varint(u64::from(symbol), out);
        }
    }

    /// Reads a table written by [`serialize`](Self::serialize).
    pub fn deserialize(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut reader = ByteReader::new(bytes);
        let codec = Self::read_from(&mut reader)?;
        Ok((codec, reader.position()))
    }

    pub(crate) fn read_from(reader: &mut ByteReader) -> Result<Self> {
        let max_len = reader.read_u8("Huffman table")?;
        if max_len > MAX_CODE_LEN {
            return Err(TrieError::format(format!("Invalid Huffman code length {max_len}")));
        }
        let mut per_len = Vec::with_capacity(max_len as usize);
        let mut total = 0usize;
        for _ in 0..max_len {
            let count = reader.read_len("Huffman length counts")?;
            total += count;
            per_len.push(count);
        }
        if total > reader.remaining() {
            return Err(TrieError::format("Truncated Huffman symbols"));
        }
        let mut ordered = Vec::with_capacity(total);
        for (i, &count) in per_len.iter().enumerate() {
            for _ in 0..count {
                let symbol = reader.read_varint_u32("Huffman symbols")?;
                ordered.push((symbol, i as u8 + 1));
            }
        }
        Self::assign(ordered)
    }
}

/// The canonical successor of `code`, or `None` if the lengths are
/// over-subscribed.
fn next_code(code: u64, prev_len: u8, len: u8) -> Option<u64> {
    let next = code.checked_add(1)?;
    let shift = u32::from(len - prev_len);
    if shift > 0 && next.leading_zeros() < shift {
        return None;
    }
    let next = next << shift;
    if len < 64 && next >> len != 0 {
        return None;
    }
    Some(next)
}

fn insert_code(tree: &mut Vec<DecodeNode>, symbol: u32, code: Code) {
    let mut node = 0usize;
    for i in (0..code.len).rev() {
        let bit = ((code.bits >> i) & 1) as usize;
        let last = i == 0;
        let DecodeNode::Branch(mut children) = tree[node] else {
            // Canonical codes are prefix free; a leaf on the path cannot occur.
            return;
        };
        if children[bit] == NO_CHILD {
            let child = tree.len() as u32;
            tree.push(if last {
                DecodeNode::Leaf(symbol)
            } else {
                DecodeNode::Branch([NO_CHILD; 2])
            });
            children[bit] = child;
            tree[node] = DecodeNode::Branch(children);
        }
        node = children[bit] as usize;
    }
}

//! Fixed-length bit vector with a two-level rank/select directory.
//!
//! Bits are packed into `u32` words, least significant bit first. The
//! directory stores the absolute number of 1-bits before every superblock
//! of [`SUPERBLOCK_WORDS`] words and, per word, the number of 1-bits since
//! the start of its superblock. Rank is then two table lookups plus one
//! masked popcount; select is a binary search over superblocks followed by
//! a short walk over words and an in-word bit scan.
//!
//! The mutable and queryable states are distinct types: a
//! [`BitVectorBuilder`] is turned into a [`BitVector`] by
//! [`build`](BitVectorBuilder::build), so rank/select can never observe a
//! vector whose directory is stale.

use crate::errors::{Result, TrieError};

const WORD_BITS: usize = 32;

/// Words per superblock.
pub const SUPERBLOCK_WORDS: usize = 16;

/// Mutable bit vector, before the rank/select directory exists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitVectorBuilder {
    len: usize,
    words: Vec<u32>,
}

impl BitVectorBuilder {
    /// Creates an all-zero vector of `len` bits.
    pub fn new(len: usize) -> Self {
        BitVectorBuilder {
            len,
            words: vec![0; len.div_ceil(WORD_BITS)],
        }
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the vector holds no bits.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check(&self, i: usize) -> Result<()> {
        if i < self.len {
            Ok(())
        } else {
            Err(TrieError::construction(
                "index",
                format!("bit {i} out of range for length {}", self.len),
            ))
        }
    }

    /// Sets bit `i` to 1.
    pub fn set(&mut self, i: usize) -> Result<()> {
        self.check(i)?;
        self.words[i / WORD_BITS] |= 1 << (i % WORD_BITS);
        Ok(())
    }

    /// Sets bit `i` to 0.
    pub fn clear(&mut self, i: usize) -> Result<()> {
        self.check(i)?;
        self.words[i / WORD_BITS] &= !(1 << (i % WORD_BITS));
        Ok(())
    }

    /// Reads bit `i`.
    pub fn get(&self, i: usize) -> Result<bool> {
        self.check(i)?;
        Ok(self.words[i / WORD_BITS] >> (i % WORD_BITS) & 1 == 1)
    }

    /// Appends one bit, growing the vector.
    pub fn push(&mut self, bit: bool) {
        if self.len % WORD_BITS == 0 {
            self.words.push(0);
        }
        if bit {
            self.words[self.len / WORD_BITS] |= 1 << (self.len % WORD_BITS);
        }
        self.len += 1;
    }

    /// Computes the popcount and rank/select directory in O(len).
    pub fn build(self) -> BitVector {
        BitVector::from_words(self.len, self.words)
    }
}

impl FromIterator<bool> for BitVectorBuilder {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut bits = BitVectorBuilder::default();
        for bit in iter {
            bits.push(bit);
        }
        bits
    }
}

/// Immutable bit vector with constant-time rank and logarithmic select.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitVector {
    len: usize,
    words: Vec<u32>,
    ones: usize,
    /// 1-bits before each superblock.
    superblocks: Vec<u32>,
    /// 1-bits before each word, relative to its superblock.
    blocks: Vec<u16>,
}

impl BitVector {
    fn from_words(len: usize, mut words: Vec<u32>) -> Self {
        words.truncate(len.div_ceil(WORD_BITS));
        let tail = len % WORD_BITS;
        if tail != 0 {
            if let Some(last) = words.last_mut() {
                *last &= (1u32 << tail) - 1;
            }
        }

        let mut superblocks = Vec::with_capacity(words.len().div_ceil(SUPERBLOCK_WORDS));
        let mut blocks = Vec::with_capacity(words.len());
        let mut total = 0u32;
        let mut local = 0u32;
        for (w, word) in words.iter().enumerate() {
            if w % SUPERBLOCK_WORDS == 0 {
                superblocks.push(total);
                local = 0;
            }
            blocks.push(local as u16);
            let count = word.count_ones();
            total += count;
            local += count;
        }
        if superblocks.is_empty() {
            superblocks.push(0);
        }

        BitVector {
            len,
            words,
            ones: total as usize,
            superblocks,
            blocks,
        }
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the vector holds no bits.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of 1-bits.
    pub fn count_ones(&self) -> usize {
        self.ones
    }

    /// Number of 0-bits.
    pub fn count_zeros(&self) -> usize {
        self.len - self.ones
    }

    /// Reads bit `i`.
    pub fn get(&self, i: usize) -> Result<bool> {
        if i < self.len {
            Ok(self.bit(i))
        } else {
            Err(TrieError::construction(
                "index",
                format!("bit {i} out of range for length {}", self.len),
            ))
        }
    }

    /// Reads bit `i`, which the caller guarantees is in range.
    #[inline]
    pub(crate) fn bit(&self, i: usize) -> bool {
        debug_assert!(i < self.len);
        self.words[i / WORD_BITS] >> (i % WORD_BITS) & 1 == 1
    }

    /// Number of 1-bits in `[0, i)`. Saturates at the total.
    #[inline]
    pub fn rank1_before(&self, i: usize) -> usize {
        if i >= self.len {
            return self.ones;
        }
        let w = i / WORD_BITS;
        let offset = i % WORD_BITS;
        let mut rank =
            self.superblocks[w / SUPERBLOCK_WORDS] as usize + self.blocks[w] as usize;
        if offset > 0 {
            rank += (self.words[w] & ((1u32 << offset) - 1)).count_ones() as usize;
        }
        rank
    }

    /// Number of 0-bits in `[0, i)`.
    #[inline]
    pub fn rank0_before(&self, i: usize) -> usize {
        i.min(self.len) - self.rank1_before(i)
    }

    /// Number of 1-bits in `[0, i]`; the total if `i >= len`.
    #[inline]
    pub fn rank1(&self, i: usize) -> usize {
        self.rank1_before(i.saturating_add(1))
    }

    /// Number of 0-bits in `[0, i]`; the total if `i >= len`.
    #[inline]
    pub fn rank0(&self, i: usize) -> usize {
        self.rank0_before(i.saturating_add(1))
    }

    /// Position of the `j`-th 1-bit, counting from 1.
    ///
    /// Returns `None` if `j == 0` or `j` exceeds the number of 1-bits.
    pub fn select1(&self, j: usize) -> Option<usize> {
        if j == 0 || j > self.ones {
            return None;
        }
        // superblocks[0] == 0 < j, so the partition point is at least 1.
        let sb = self.superblocks.partition_point(|&c| (c as usize) < j) - 1;
        let base = self.superblocks[sb] as usize;
        let first = sb * SUPERBLOCK_WORDS;
        let end = (first + SUPERBLOCK_WORDS).min(self.words.len());
        let mut w = first;
        while w + 1 < end && base + (self.blocks[w + 1] as usize) < j {
            w += 1;
        }
        let remaining = j - base - self.blocks[w] as usize;
        Some(w * WORD_BITS + select_in_word(self.words[w], remaining))
    }

    /// Position of the `j`-th 0-bit, counting from 1.
    ///
    /// Returns `None` if `j == 0` or `j` exceeds the number of 0-bits.
    pub fn select0(&self, j: usize) -> Option<usize> {
        if j == 0 || j > self.count_zeros() {
            return None;
        }
        let zeros_before_super =
            |sb: usize| sb * SUPERBLOCK_WORDS * WORD_BITS - self.superblocks[sb] as usize;
        let (mut lo, mut hi) = (0, self.superblocks.len());
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if zeros_before_super(mid) < j {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let base = zeros_before_super(lo);
        let first = lo * SUPERBLOCK_WORDS;
        let end = (first + SUPERBLOCK_WORDS).min(self.words.len());
        let zeros_before_word = |w: usize| (w - first) * WORD_BITS - self.blocks[w] as usize;
        let mut w = first;
        while w + 1 < end && base + zeros_before_word(w + 1) < j {
            w += 1;
        }
        let remaining = j - base - zeros_before_word(w);
        Some(w * WORD_BITS + select_in_word(!self.words[w], remaining))
    }

    /// Encodes as a little-endian `u32` bit length followed by the words.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(4 + self.words.len() * 4);
        self.write_to(&mut out)?;
        Ok(out)
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        let len = u32::try_from(self.len)
            .map_err(|_| TrieError::construction("len", "bit vector exceeds u32::MAX bits"))?;
        out.extend_from_slice(&len.to_le_bytes());
        for word in &self.words {
            out.extend_from_slice(&word.to_le_bytes());
        }
        Ok(())
    }

    /// Decodes a vector written by [`serialize`](Self::serialize) and
    /// rebuilds its directory. Returns the vector and the bytes consumed.
    pub fn deserialize(bytes: &[u8]) -> Result<(Self, usize)> {
        let header: [u8; 4] = bytes
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| TrieError::format("Truncated bit vector header"))?;
        let len = u32::from_le_bytes(header) as usize;
        let n_words = len.div_ceil(WORD_BITS);
        let end = 4 + n_words * 4;
        let body = bytes
            .get(4..end)
            .ok_or_else(|| TrieError::format("Truncated bit vector body"))?;
        let words = body
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok((Self::from_words(len, words), end))
    }

    /// Iterates over all bits.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(|i| self.bit(i))
    }
}

/// Position of the `k`-th (1-based) set bit of `word`.
#[inline]
fn select_in_word(mut word: u32, k: usize) -> usize {
    debug_assert!(k >= 1 && k <= word.count_ones() as usize);
    for _ in 1..k {
        word &= word - 1;
    }
    word.trailing_zeros() as usize
}

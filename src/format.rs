//! The "OWTRIE" binary format.
//!
//! A buffer is a 24-byte little-endian header followed by the payload:
//!
//! ```text
//! magic "OWTRIE" | version u16 | word_count u32 | node_count u32 | flags u32 | tail_buffer_size u32
//! topology bits | terminal bits | [link bits] | label section | tail section
//! ```
//!
//! Version 7 stores the payload as is. Version 8 stores it compressed by
//! the codec whose id sits in flag bits 8..15. A nested tail trie is
//! embedded in the tail section as a complete version 7 buffer.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use hashbrown::HashMap;
use tracing::debug;

use crate::bit_vector::{BitVector, BitVectorBuilder};
use crate::codec::{self, PayloadCodec};
use crate::config::LabelEncoding;
use crate::errors::{Result, TrieError};
use crate::huffman::{BitReader, BitWriter, HuffmanCodec};
use crate::louds::tails::Tails;
use crate::louds::Trie;
use crate::wire::{write_len, write_varint, ByteReader};

/// File signature.
pub const MAGIC: &[u8; 6] = b"OWTRIE";

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 24;

/// The tail section holds a nested trie instead of flat text.
pub const FLAG_RECURSIVE_TAILS: u32 = 1;
/// The payload is compressed.
pub const FLAG_COMPRESSED: u32 = 1 << 1;
/// Labels are Huffman coded instead of literal varints.
pub const FLAG_HUFFMAN_LABELS: u32 = 1 << 2;
/// A link bit vector follows the terminal bit vector.
pub const FLAG_LINKS: u32 = 1 << 3;

const CODEC_SHIFT: u32 = 8;
const CODEC_MASK: u32 = 0xff << CODEC_SHIFT;

/// Deepest tail nesting accepted when decoding; building never nests deeper.
pub(crate) const MAX_NESTING: u8 = 16;

/// Serialized format version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FormatVersion {
    /// Uncompressed payload.
    #[default]
    V7 = 7,
    /// Compressed payload.
    V8 = 8,
}

impl FormatVersion {
    /// The version number written to the header.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    fn from_u16(version: u16) -> Option<Self> {
        match version {
            7 => Some(FormatVersion::V7),
            8 => Some(FormatVersion::V8),
            _ => None,
        }
    }
}

struct Header {
    version: FormatVersion,
    word_count: u32,
    node_count: u32,
    flags: u32,
    tail_buffer_size: u32,
}

impl Header {
    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.version.as_u16().to_le_bytes());
        out.extend_from_slice(&self.word_count.to_le_bytes());
        out.extend_from_slice(&self.node_count.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.tail_buffer_size.to_le_bytes());
    }

    fn read(reader: &mut ByteReader) -> Result<Self> {
        if reader.remaining() < MAGIC.len() || reader.take(MAGIC.len(), "magic")? != MAGIC {
            return Err(TrieError::format("Invalid trie file"));
        }
        let raw_version = reader.read_u16("header")?;
        let version = FormatVersion::from_u16(raw_version).ok_or_else(|| {
            TrieError::format(format!("Unsupported trie version {raw_version}"))
        })?;
        Ok(Header {
            version,
            word_count: reader.read_u32("header")?,
            node_count: reader.read_u32("header")?,
            flags: reader.read_u32("header")?,
            tail_buffer_size: reader.read_u32("header")?,
        })
    }

    fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// Largest payload an encoder can produce for these counts: three bit
    /// vectors over `2n + 1` positions, at most 3 bytes of symbol plus 8
    /// bytes of code per label, the Huffman table header and the tails.
    fn payload_bound(&self) -> usize {
        let nodes = u64::from(self.node_count);
        let bit_vector = 4 + 4 * (2 * nodes + 1).div_ceil(32);
        let labels = 10 + 1 + 64 * 5 + 11 * nodes;
        let bound = 3 * bit_vector + labels + u64::from(self.tail_buffer_size);
        usize::try_from(bound).unwrap_or(usize::MAX)
    }
}

/// An uncompressed payload with the header fields that describe it.
struct Payload {
    bytes: Vec<u8>,
    word_count: u32,
    node_count: u32,
    flags: u32,
    tail_buffer_size: u32,
}

impl Payload {
    fn encode(trie: &Trie) -> Result<Self> {
        let word_count = u32::try_from(trie.len())
            .map_err(|_| TrieError::construction("words", "more than u32::MAX words"))?;
        let node_count = u32::try_from(trie.node_count())
            .map_err(|_| TrieError::construction("nodes", "more than u32::MAX nodes"))?;

        let mut flags = 0;
        let mut bytes = Vec::new();
        trie.topology.write_to(&mut bytes)?;
        trie.terminal.write_to(&mut bytes)?;
        if trie.links.count_ones() > 0 {
            flags |= FLAG_LINKS;
            trie.links.write_to(&mut bytes)?;
        }
        if trie.label_encoding == LabelEncoding::Huffman {
            flags |= FLAG_HUFFMAN_LABELS;
        }
        write_labels(&trie.labels, trie.label_encoding, &mut bytes)?;

        if trie.tail_store().is_recursive() {
            flags |= FLAG_RECURSIVE_TAILS;
        }
        let start = bytes.len();
        trie.tails.write_to(&mut bytes)?;
        let tail_buffer_size = u32::try_from(bytes.len() - start)
            .map_err(|_| TrieError::construction("tails", "tail section exceeds u32::MAX bytes"))?;

        Ok(Payload {
            bytes,
            word_count,
            node_count,
            flags,
            tail_buffer_size,
        })
    }

    fn header(&self, version: FormatVersion, extra_flags: u32) -> Header {
        Header {
            version,
            word_count: self.word_count,
            node_count: self.node_count,
            flags: self.flags | extra_flags,
            tail_buffer_size: self.tail_buffer_size,
        }
    }
}

fn write_labels(labels: &[char], encoding: LabelEncoding, out: &mut Vec<u8>) -> Result<()> {
    let mut section = Vec::new();
    match encoding {
        LabelEncoding::Literal => {
            for &ch in labels {
                write_varint(u64::from(ch), &mut section);
            }
        }
        LabelEncoding::Huffman => {
            let mut freqs: HashMap<u32, u64> = HashMap::new();
            for &ch in labels {
                *freqs.entry(u32::from(ch)).or_default() += 1;
            }
            let codec = HuffmanCodec::from_frequencies(&freqs)?;
            codec.serialize(&mut section);
            let mut writer = BitWriter::new();
            for &ch in labels {
                codec.encode(u32::from(ch), &mut writer)?;
            }
            section.extend_from_slice(&writer.finish());
        }
    }
    write_len(section.len(), out);
    out.extend_from_slice(&section);
    Ok(())
}

fn read_labels(section: &[u8], count: usize, huffman: bool) -> Result<Vec<char>> {
    let to_char = |symbol: u32| {
        char::from_u32(symbol)
            .ok_or_else(|| TrieError::format(format!("Label {symbol:#x} is not a code point")))
    };
    let mut labels = Vec::with_capacity(count);
    let mut reader = ByteReader::new(section);
    if huffman {
        let codec = HuffmanCodec::read_from(&mut reader)?;
        let mut bits = BitReader::new(reader.rest());
        for _ in 0..count {
            labels.push(to_char(codec.decode(&mut bits)?)?);
        }
        reader.skip(bits.position().div_ceil(8), "labels")?;
    } else {
        for _ in 0..count {
            labels.push(to_char(reader.read_varint_u32("labels")?)?);
        }
    }
    if reader.remaining() != 0 {
        return Err(TrieError::format("Trailing bytes in label section"));
    }
    Ok(labels)
}

/// Appends `trie` as an uncompressed version 7 buffer.
pub(crate) fn write_trie(trie: &Trie, out: &mut Vec<u8>) -> Result<()> {
    let payload = Payload::encode(trie)?;
    out.reserve(HEADER_LEN + payload.bytes.len());
    payload.header(FormatVersion::V7, 0).write(out);
    out.extend_from_slice(&payload.bytes);
    Ok(())
}

/// Decodes a complete buffer nested `depth` levels below the top.
pub(crate) fn read_trie(bytes: &[u8], depth: u8) -> Result<Trie> {
    decode(bytes, depth, None)
}

/// Compressed payloads use `codec` when given, otherwise the registered
/// codec named by the header.
fn decode(bytes: &[u8], depth: u8, codec: Option<&dyn PayloadCodec>) -> Result<Trie> {
    if depth > MAX_NESTING {
        return Err(TrieError::format("Tail tries nested too deeply"));
    }
    let mut reader = ByteReader::new(bytes);
    let header = Header::read(&mut reader)?;

    let compressed = header.has(FLAG_COMPRESSED);
    match (header.version, compressed) {
        (FormatVersion::V7, true) => {
            return Err(TrieError::format("Version 7 buffer flagged as compressed"))
        }
        (FormatVersion::V8, false) => {
            return Err(TrieError::format("Version 8 buffer without compression flag"))
        }
        (FormatVersion::V8, true) if depth > 0 => {
            return Err(TrieError::format("Nested tail trie must not be compressed"))
        }
        _ => {}
    }

    let payload: Cow<[u8]> = if compressed {
        let id = ((header.flags & CODEC_MASK) >> CODEC_SHIFT) as u8;
        let codec = match codec {
            Some(codec) if codec.id() != id => {
                return Err(TrieError::precondition(
                    format!("payload needs codec {id}, got {} ({})", codec.name(), codec.id()),
                    "pass the codec the buffer was written with",
                ))
            }
            Some(codec) => codec,
            None => codec::codec_for_id(id)
                .ok_or_else(|| TrieError::format(format!("Unknown payload codec {id}")))?,
        };
        Cow::Owned(codec.decode(reader.rest(), header.payload_bound())?)
    } else {
        Cow::Borrowed(reader.rest())
    };

    let trie = decode_payload(&payload, &header, depth)?;
    debug!(
        "depth {depth}: decoded v{} trie, {} words, {} nodes",
        header.version.as_u16(),
        header.word_count,
        header.node_count
    );
    Ok(trie)
}

fn read_bits(reader: &mut ByteReader, what: &str) -> Result<BitVector> {
    let (bits, consumed) = BitVector::deserialize(reader.rest())
        .map_err(|e| TrieError::format(format!("{what}: {e}")))?;
    reader.skip(consumed, what)?;
    Ok(bits)
}

/// Checks that `flags` has the topology's length and marks only nodes
/// other than the root.
fn check_flags(flags: &BitVector, topology: &BitVector, what: &str) -> Result<()> {
    if flags.len() != topology.len() {
        return Err(TrieError::format(format!("{what} length does not match topology")));
    }
    if flags.bit(0) || flags.iter().zip(topology.iter()).any(|(f, t)| f && !t) {
        return Err(TrieError::format(format!("{what} marks a position that is not a node")));
    }
    Ok(())
}

fn decode_payload(payload: &[u8], header: &Header, depth: u8) -> Result<Trie> {
    let mut reader = ByteReader::new(payload);
    let node_count = header.node_count as usize;

    let topology = read_bits(&mut reader, "topology")?;
    if node_count == 0
        || topology.len() != 2 * node_count + 1
        || topology.count_ones() != node_count
        || !topology.bit(0)
        || topology.bit(1)
    {
        return Err(TrieError::format("Malformed LOUDS topology"));
    }

    let terminal = read_bits(&mut reader, "terminal bits")?;
    check_flags(&terminal, &topology, "Terminal bits")?;
    if terminal.count_ones() != header.word_count as usize {
        return Err(TrieError::format("Word count does not match terminal bits"));
    }

    let links = if header.has(FLAG_LINKS) {
        let links = read_bits(&mut reader, "link bits")?;
        check_flags(&links, &topology, "Link bits")?;
        links
    } else {
        BitVectorBuilder::new(topology.len()).build()
    };

    let label_len = reader.read_len("label section")?;
    let labels = read_labels(
        reader.take(label_len, "label section")?,
        node_count - 1,
        header.has(FLAG_HUFFMAN_LABELS),
    )?;

    let tail_bytes = reader.take(header.tail_buffer_size as usize, "tail section")?;
    let tails = Tails::read_from(tail_bytes, header.has(FLAG_RECURSIVE_TAILS), depth)?;
    if tails.link_count() != links.count_ones() {
        return Err(TrieError::format("Tail references do not match link bits"));
    }
    if reader.remaining() != 0 {
        return Err(TrieError::format("Trailing bytes after tail section"));
    }

    Ok(Trie {
        topology,
        terminal,
        links,
        labels,
        tails,
        label_encoding: if header.has(FLAG_HUFFMAN_LABELS) {
            LabelEncoding::Huffman
        } else {
            LabelEncoding::Literal
        },
        depth,
    })
}

impl Trie {
    /// Serializes the trie.
    ///
    /// [`FormatVersion::V8`] compresses with the process-wide brotli codec,
    /// which must have been set up with
    /// [`init_brotli`](crate::codec::init_brotli); otherwise this returns a
    /// precondition error.
    ///
    /// ```
    /// use owtrie::{build_trie, FormatVersion, Trie};
    ///
    /// let trie = build_trie(["test"]).unwrap();
    /// let bytes = trie.to_bytes(FormatVersion::V7).unwrap();
    /// assert_eq!(&bytes[..6], b"OWTRIE");
    /// assert_eq!(Trie::from_bytes(&bytes).unwrap(), trie);
    /// ```
    pub fn to_bytes(&self, version: FormatVersion) -> Result<Vec<u8>> {
        match version {
            FormatVersion::V7 => {
                let mut out = Vec::new();
                write_trie(self, &mut out)?;
                Ok(out)
            }
            FormatVersion::V8 => self.to_bytes_with(codec::brotli()),
        }
    }

    /// Serializes the trie as version 8, compressed by `codec`.
    pub fn to_bytes_with(&self, codec: &dyn PayloadCodec) -> Result<Vec<u8>> {
        let payload = Payload::encode(self)?;
        let compressed = codec.encode(&payload.bytes)?;
        let flags = FLAG_COMPRESSED | u32::from(codec.id()) << CODEC_SHIFT;
        let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
        payload.header(FormatVersion::V8, flags).write(&mut out);
        out.extend_from_slice(&compressed);
        debug!(
            "{} compressed payload {} -> {} bytes",
            codec.name(),
            payload.bytes.len(),
            compressed.len()
        );
        Ok(out)
    }

    /// Decodes a buffer written by [`to_bytes`](Self::to_bytes) or
    /// [`to_bytes_with`](Self::to_bytes_with) with a registered codec.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode(bytes, 0, None)
    }

    /// Decodes a buffer, decompressing a version 8 payload with `codec`.
    pub fn from_bytes_with(bytes: &[u8], codec: &dyn PayloadCodec) -> Result<Self> {
        decode(bytes, 0, Some(codec))
    }

    /// Writes the serialized trie to `path`.
    pub fn save(&self, path: impl AsRef<Path>, version: FormatVersion) -> Result<()> {
        fs::write(path, self.to_bytes(version)?)?;
        Ok(())
    }

    /// Reads a trie saved by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_bytes(&fs::read(path)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::{BrotliCodec, BrotliConfig};
    use crate::{build_trie, build_trie_with, TailPolicy, TrieConfig};

    const WORDS: [&str; 9] = [
        "nation", "station", "ration", "lotion", "motion", "café", "naïve", "日本語", "🎉",
    ];

    fn brotli() -> BrotliCodec {
        let codec = BrotliCodec::new();
        codec.init(BrotliConfig::default()).unwrap();
        codec
    }

    fn assert_same_answers(a: &Trie, b: &Trie) {
        assert_eq!(a.len(), b.len());
        for id in 0..a.len() as u32 {
            let word = a.get_word(id).unwrap();
            assert_eq!(b.word_id(&word), Some(id));
        }
        assert_eq!(a.iter().collect::<Vec<_>>(), b.iter().collect::<Vec<_>>());
        assert_eq!(a.keys_with_prefix("na", None), b.keys_with_prefix("na", None));
    }

    #[test]
    fn header_fields() {
        let trie = build_trie(["test"]).unwrap();
        let bytes = trie.to_bytes(FormatVersion::V7).unwrap();
        assert_eq!(&bytes[..6], MAGIC);
        assert_eq!(u16::from_le_bytes([bytes[6], bytes[7]]), 7);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(bytes[12..16].try_into().unwrap()), 2);

        let bytes = trie.to_bytes_with(&brotli()).unwrap();
        assert_eq!(&bytes[..6], MAGIC);
        assert_eq!(u16::from_le_bytes([bytes[6], bytes[7]]), 8);
        let flags = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        assert_ne!(flags & FLAG_COMPRESSED, 0);
        assert_eq!((flags & CODEC_MASK) >> CODEC_SHIFT, u32::from(codec::BROTLI_ID));
    }

    #[test]
    fn v7_round_trip_is_byte_stable() {
        for labels in [LabelEncoding::Huffman, LabelEncoding::Literal] {
            let config = TrieConfig::default().with_labels(labels);
            let trie = build_trie_with(WORDS, config).unwrap();
            let bytes = trie.to_bytes(FormatVersion::V7).unwrap();
            let back = Trie::from_bytes(&bytes).unwrap();
            assert_eq!(back, trie);
            assert_same_answers(&trie, &back);
            assert_eq!(back.to_bytes(FormatVersion::V7).unwrap(), bytes);
        }
    }

    #[test]
    fn v8_round_trip() {
        let codec = brotli();
        let trie = build_trie(WORDS).unwrap();
        let bytes = trie.to_bytes_with(&codec).unwrap();
        let back = Trie::from_bytes_with(&bytes, &codec).unwrap();
        assert_same_answers(&trie, &back);
        assert_eq!(back, trie);
    }

    #[test]
    fn recursive_tails_round_trip() {
        let config = TrieConfig::default().with_tail_policy(TailPolicy::Recursive);
        let trie = build_trie_with(WORDS, config).unwrap();
        let bytes = trie.to_bytes(FormatVersion::V7).unwrap();
        let flags = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        assert_eq!(flags & FLAG_RECURSIVE_TAILS != 0, trie.tail_store().is_recursive());
        let back = Trie::from_bytes(&bytes).unwrap();
        assert_eq!(back, trie);
        assert_same_answers(&trie, &back);
    }

    #[test]
    fn deep_recursive_tails_stay_decodable() {
        let config = TrieConfig::default()
            .with_tail_policy(TailPolicy::Recursive)
            .with_max_tail_depth(40);
        let trie = build_trie_with(["abcdefghijklmnopqrstuvwxyz"], config).unwrap();
        assert_eq!(trie.tail_store().depth(), MAX_NESTING as usize);
        let back = Trie::from_bytes(&trie.to_bytes(FormatVersion::V7).unwrap()).unwrap();
        assert_eq!(back, trie);
        assert!(back.has("abcdefghijklmnopqrstuvwxyz"));
    }

    #[test]
    fn trailing_label_bytes_are_rejected() {
        let labels = ['a', 'b', 'a', 'é'];
        for encoding in [LabelEncoding::Huffman, LabelEncoding::Literal] {
            let mut section = Vec::new();
            write_labels(&labels, encoding, &mut section).unwrap();
            let mut reader = ByteReader::new(&section);
            let len = reader.read_len("label section").unwrap();
            let mut body = reader.take(len, "label section").unwrap().to_vec();
            let huffman = encoding == LabelEncoding::Huffman;
            assert_eq!(read_labels(&body, labels.len(), huffman).unwrap(), labels);
            body.push(0);
            assert!(read_labels(&body, labels.len(), huffman).unwrap_err().is_format());
        }
    }

    #[test]
    fn oversized_compressed_payload_is_rejected() {
        let codec = brotli();
        let words: Vec<String> = (0..2000).map(|i| format!("word{i:04}")).collect();
        let mut bytes = build_trie(&words).unwrap().to_bytes_with(&codec).unwrap();
        // Claim a single node and no tails; the real payload is far larger.
        bytes[8..12].copy_from_slice(&0u32.to_le_bytes());
        bytes[12..16].copy_from_slice(&1u32.to_le_bytes());
        bytes[20..24].copy_from_slice(&0u32.to_le_bytes());
        let err = Trie::from_bytes_with(&bytes, &codec).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn empty_trie_round_trip() {
        let trie = build_trie(Vec::<String>::new()).unwrap();
        let back = Trie::from_bytes(&trie.to_bytes(FormatVersion::V7).unwrap()).unwrap();
        assert!(back.is_empty());
        assert!(!back.has("a"));
    }

    #[test]
    fn bad_magic() {
        let mut bytes = build_trie(["test"]).unwrap().to_bytes(FormatVersion::V7).unwrap();
        bytes[0] = b'X';
        let err = Trie::from_bytes(&bytes).unwrap_err();
        assert!(err.is_format());
        assert_eq!(err.to_string(), "Invalid trie file");
        assert!(Trie::from_bytes(b"OWT").unwrap_err().is_format());
    }

    #[test]
    fn unsupported_version() {
        let mut bytes = build_trie(["test"]).unwrap().to_bytes(FormatVersion::V7).unwrap();
        bytes[6] = 6;
        let err = Trie::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().starts_with("Unsupported trie version"));
    }

    #[test]
    fn version_and_compression_flag_must_agree() {
        let mut bytes = build_trie(["test"]).unwrap().to_bytes(FormatVersion::V7).unwrap();
        bytes[6] = 8;
        assert!(Trie::from_bytes(&bytes).unwrap_err().is_format());
    }

    #[test]
    fn truncation_is_detected() {
        let bytes = build_trie(WORDS).unwrap().to_bytes(FormatVersion::V7).unwrap();
        for len in 0..bytes.len() {
            assert!(Trie::from_bytes(&bytes[..len]).is_err(), "prefix of {len} bytes");
        }
        let mut longer = bytes.clone();
        longer.push(0);
        assert!(Trie::from_bytes(&longer).unwrap_err().is_format());
    }

    #[test]
    fn uninitialized_codec_is_a_precondition_error() {
        let trie = build_trie(["test"]).unwrap();
        let codec = BrotliCodec::new();
        assert!(trie.to_bytes_with(&codec).unwrap_err().is_precondition());

        let bytes = trie.to_bytes_with(&brotli()).unwrap();
        assert!(Trie::from_bytes_with(&bytes, &codec).unwrap_err().is_precondition());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.owtrie");
        let trie = build_trie(WORDS).unwrap();
        trie.save(&path, FormatVersion::V7).unwrap();
        assert_eq!(Trie::load(&path).unwrap(), trie);
        assert!(matches!(
            Trie::load(dir.path().join("missing")),
            Err(TrieError::Io(_))
        ));
    }
}

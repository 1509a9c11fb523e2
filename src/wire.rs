//! Little-endian and LEB128 varint primitives shared by the encoders.

use crate::errors::{Result, TrieError};

/// Longest LEB128 encoding of a `u64`.
const MAX_VARINT_BYTES: usize = 10;

/// Appends `value` as an unsigned LEB128 varint.
pub(crate) fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

/// Appends a `usize` as a varint.
pub(crate) fn write_len(value: usize, out: &mut Vec<u8>) {
    write_varint(value as u64, out)
}

/// Bounds-checked cursor over a byte slice.
///
/// Every read that runs past the end reports a format error naming what
/// was being read, so a truncated buffer never decodes to a partial trie.
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        ByteReader { bytes, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub(crate) fn rest(&self) -> &'a [u8] {
        &self.bytes[self.pos..]
    }

    pub(crate) fn skip(&mut self, n: usize, what: &str) -> Result<()> {
        self.take(n, what).map(|_| ())
    }

    pub(crate) fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| TrieError::format(format!("Truncated {what}")))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn read_u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    pub(crate) fn read_u16(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn read_u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn read_varint(&mut self, what: &str) -> Result<u64> {
        let mut value = 0u64;
        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read_u8(what)?;
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(TrieError::format(format!("Overlong varint in {what}")))
    }

    /// Reads a varint that must fit in `u32`.
    pub(crate) fn read_varint_u32(&mut self, what: &str) -> Result<u32> {
        let value = self.read_varint(what)?;
        u32::try_from(value)
            .map_err(|_| TrieError::format(format!("Value {value} out of range in {what}")))
    }

    /// Reads a varint used as a count or length, bounded by the bytes left
    /// so corrupt input cannot trigger a huge allocation.
    pub(crate) fn read_len(&mut self, what: &str) -> Result<usize> {
        let value = self.read_varint(what)?;
        usize::try_from(value)
            .ok()
            .filter(|&n| n <= self.remaining())
            .ok_or_else(|| TrieError::format(format!("Length {value} out of range in {what}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn varint_boundaries() {
        for value in [0u64, 1, 127, 128, 300, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            write_varint(value, &mut buf);
            let mut reader = ByteReader::new(&buf);
            assert_eq!(reader.read_varint("test").unwrap(), value);
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn small_values_are_one_byte() {
        let mut buf = Vec::new();
        write_varint(127, &mut buf);
        assert_eq!(buf, [0x7f]);
        buf.clear();
        write_varint(128, &mut buf);
        assert_eq!(buf, [0x80, 0x01]);
    }

    #[test]
    fn truncated_reads_fail() {
        let mut reader = ByteReader::new(&[0x80]);
        assert!(reader.read_varint("count").unwrap_err().is_format());
        let mut reader = ByteReader::new(&[1, 2, 3]);
        assert!(reader.read_u32("word").unwrap_err().is_format());
        let mut reader = ByteReader::new(&[9, 1]);
        assert!(reader.read_len("tail").unwrap_err().is_format());
    }
}

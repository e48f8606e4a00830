//! Bounds-checked big-endian reads over an in-memory byte slice.
//!
//! HFS+, XAR and UDIF are all big-endian-on-disk; this is the opposite
//! convention from the little-endian ASCII-octal tar headers this crate also
//! reads, so it lives in its own module rather than extending `tar_reader`'s
//! parsing helpers.
use crate::error::{Error, Result};

/// Cursor over a borrowed byte buffer.
pub struct BinReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BinReader<'a> {
    pub fn new(buf: &'a [u8]) -> BinReader<'a> {
        BinReader { buf, pos: 0 }
    }

    pub fn at(buf: &'a [u8], pos: usize) -> BinReader<'a> {
        BinReader { buf, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.buf.len() {
            return Err(Error::Truncated(format!(
                "need {} bytes at {}, have {}",
                len,
                self.pos,
                self.buf.len()
            )));
        }
        let s = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(s)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64_be(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_be_bytes(a))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Read a fixed-size block of raw UTF-16BE code units, decoding to a `String`.
    pub fn read_utf16_be(&mut self, num_code_units: usize) -> Result<String> {
        let bytes = self.take(num_code_units * 2)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16(&units)
            .map_err(|e| Error::Decoding(format!("utf16be: {}", e)))
    }

    pub fn read_utf8(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(|s| s.to_string())
            .map_err(|e| Error::Decoding(format!("utf8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_ints() {
        let buf = [0x00, 0x01, 0x00, 0x00, 0x00, 0x02];
        let mut r = BinReader::new(&buf);
        assert_eq!(r.read_u16_be().unwrap(), 1);
        assert_eq!(r.read_u32_be().unwrap(), 2);
    }

    #[test]
    fn truncated_read_errors() {
        let buf = [0u8; 1];
        let mut r = BinReader::new(&buf);
        assert!(matches!(r.read_u32_be(), Err(Error::Truncated(_))));
    }

    #[test]
    fn decodes_utf16be() {
        // "Hi" in UTF-16BE.
        let buf = [0x00, b'H', 0x00, b'i'];
        let mut r = BinReader::new(&buf);
        assert_eq!(r.read_utf16_be(2).unwrap(), "Hi");
    }
}

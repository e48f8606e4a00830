//! RPM header codec (tag/type/offset/count index + type-aligned data store).
//!
//! Transliterated field-for-field from the original `rpm_writer.py`'s
//! `RpmHeaderBuilder` (`add_int32`/`add_int16`/`add_string`/`add_string_array`/
//! `add_bin`/`add_i18n_string`, `build()`), plus the inverse parse this spec
//! adds for the reader side.
use std::collections::BTreeMap;

use crate::binreader::BinReader;
use crate::error::{Error, Result};

const HEADER_MAGIC: [u8; 3] = [0x8E, 0xAD, 0xE8];
const HEADER_VERSION: u8 = 1;

const RPM_INT16_TYPE: u32 = 3;
const RPM_INT32_TYPE: u32 = 4;
const RPM_INT64_TYPE: u32 = 5;
const RPM_STRING_TYPE: u32 = 6;
const RPM_BIN_TYPE: u32 = 7;
const RPM_STRING_ARRAY_TYPE: u32 = 8;
const RPM_I18NSTRING_TYPE: u32 = 9;

/// The per-tag payload, a sum type over every RPM value representation this
/// crate emits or parses. Exhaustively matched on both emission and parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Int16(Vec<u16>),
    Int32(Vec<u32>),
    Int64(Vec<u64>),
    String(String),
    StringArray(Vec<String>),
    I18NString(String),
    Bin(Vec<u8>),
}

impl HeaderValue {
    fn type_code(&self) -> u32 {
        match self {
            HeaderValue::Int16(_) => RPM_INT16_TYPE,
            HeaderValue::Int32(_) => RPM_INT32_TYPE,
            HeaderValue::Int64(_) => RPM_INT64_TYPE,
            HeaderValue::String(_) => RPM_STRING_TYPE,
            HeaderValue::Bin(_) => RPM_BIN_TYPE,
            HeaderValue::StringArray(_) => RPM_STRING_ARRAY_TYPE,
            HeaderValue::I18NString(_) => RPM_I18NSTRING_TYPE,
        }
    }

    fn count(&self) -> u32 {
        match self {
            HeaderValue::Int16(v) => v.len() as u32,
            HeaderValue::Int32(v) => v.len() as u32,
            HeaderValue::Int64(v) => v.len() as u32,
            HeaderValue::String(_) => 1,
            HeaderValue::I18NString(_) => 1,
            HeaderValue::StringArray(v) => v.len() as u32,
            HeaderValue::Bin(b) => b.len() as u32,
        }
    }
}

/// An ordered set of `(tag, HeaderValue)` entries plus the byte-addressed
/// data store they encode/decode against. Entries are sorted by tag ascending
/// on emission, as the format requires.
#[derive(Debug, Default)]
pub struct RpmHeaderSection {
    entries: BTreeMap<u32, HeaderValue>,
}

impl RpmHeaderSection {
    pub fn new() -> RpmHeaderSection {
        RpmHeaderSection::default()
    }

    pub fn add(&mut self, tag: u32, value: HeaderValue) {
        self.entries.insert(tag, value);
    }

    pub fn get(&self, tag: u32) -> Option<&HeaderValue> {
        self.entries.get(&tag)
    }

    /// Serialize to `(index_bytes ++ data_store_bytes)`, prefixed with the
    /// header magic/version/entry-count/data-len fields.
    pub fn build(&self) -> Vec<u8> {
        let mut data_store = Vec::new();
        let mut index = Vec::new();

        // BTreeMap already iterates in ascending tag order.
        for (tag, value) in &self.entries {
            match value {
                HeaderValue::Int16(_) => pad_to(&mut data_store, 2),
                HeaderValue::Int32(_) | HeaderValue::Int64(_) => pad_to(&mut data_store, 4),
                _ => (),
            }
            let offset = data_store.len() as u32;

            match value {
                HeaderValue::Int16(vals) => {
                    for v in vals {
                        data_store.extend_from_slice(&v.to_be_bytes());
                    }
                }
                HeaderValue::Int32(vals) => {
                    for v in vals {
                        data_store.extend_from_slice(&v.to_be_bytes());
                    }
                }
                HeaderValue::Int64(vals) => {
                    for v in vals {
                        data_store.extend_from_slice(&v.to_be_bytes());
                    }
                }
                HeaderValue::String(s) | HeaderValue::I18NString(s) => {
                    data_store.extend_from_slice(s.as_bytes());
                    data_store.push(0);
                }
                HeaderValue::StringArray(vals) => {
                    for s in vals {
                        data_store.extend_from_slice(s.as_bytes());
                        data_store.push(0);
                    }
                }
                HeaderValue::Bin(bytes) => {
                    data_store.extend_from_slice(bytes);
                }
            }

            index.extend_from_slice(&tag.to_be_bytes());
            index.extend_from_slice(&value.type_code().to_be_bytes());
            index.extend_from_slice(&offset.to_be_bytes());
            index.extend_from_slice(&value.count().to_be_bytes());
        }

        let mut out = Vec::new();
        out.extend_from_slice(&HEADER_MAGIC);
        out.push(HEADER_VERSION);
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());
        out.extend_from_slice(&(data_store.len() as u32).to_be_bytes());
        out.extend_from_slice(&index);
        out.extend_from_slice(&data_store);
        out
    }

    /// Parse a header section starting at the buffer's current position.
    /// Returns the section and the number of bytes consumed.
    pub fn parse(buf: &[u8]) -> Result<(RpmHeaderSection, usize)> {
        let mut r = BinReader::new(buf);
        let magic = r.read_bytes(3)?;
        if magic != HEADER_MAGIC {
            return Err(Error::BadMagic("rpm header: bad magic".to_string()));
        }
        let _version = r.read_u8()?;
        r.read_bytes(4)?; // reserved
        let n_entries = r.read_u32_be()?;
        let data_len = r.read_u32_be()?;

        let index_start = r.pos();
        let data_start = index_start + n_entries as usize * 16;
        let data_end = data_start + data_len as usize;
        if data_end > buf.len() {
            return Err(Error::Truncated("rpm header data store overruns buffer".to_string()));
        }
        let data_store = &buf[data_start..data_end];

        let mut section = RpmHeaderSection::new();
        for i in 0..n_entries {
            let entry_start = index_start + i as usize * 16;
            let mut er = BinReader::at(buf, entry_start);
            let tag = er.read_u32_be()?;
            let type_code = er.read_u32_be()?;
            let offset = er.read_u32_be()? as usize;
            let count = er.read_u32_be()? as usize;

            let value = decode_value(data_store, type_code, offset, count)?;
            section.add(tag, value);
        }

        Ok((section, data_end))
    }
}

fn pad_to(buf: &mut Vec<u8>, align: usize) {
    let rem = buf.len() % align;
    if rem != 0 {
        buf.resize(buf.len() + (align - rem), 0);
    }
}

fn decode_value(data: &[u8], type_code: u32, offset: usize, count: usize) -> Result<HeaderValue> {
    let mut r = BinReader::at(data, offset);
    match type_code {
        RPM_INT16_TYPE => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(r.read_u16_be()?);
            }
            Ok(HeaderValue::Int16(v))
        }
        RPM_INT32_TYPE => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(r.read_u32_be()?);
            }
            Ok(HeaderValue::Int32(v))
        }
        RPM_INT64_TYPE => {
            let mut v = Vec::with_capacity(count);
            for _ in 0..count {
                v.push(r.read_u64_be()?);
            }
            Ok(HeaderValue::Int64(v))
        }
        RPM_STRING_TYPE => Ok(HeaderValue::String(read_nul_string(data, offset)?)),
        RPM_I18NSTRING_TYPE => Ok(HeaderValue::I18NString(read_nul_string(data, offset)?)),
        RPM_STRING_ARRAY_TYPE => {
            let mut strings = Vec::with_capacity(count);
            let mut pos = offset;
            for _ in 0..count {
                let s = read_nul_string(data, pos)?;
                pos += s.len() + 1;
                strings.push(s);
            }
            Ok(HeaderValue::StringArray(strings))
        }
        RPM_BIN_TYPE => {
            let bytes = r.read_bytes(count)?;
            Ok(HeaderValue::Bin(bytes.to_vec()))
        }
        other => Err(Error::Decoding(format!("unknown rpm header type {}", other))),
    }
}

fn read_nul_string(data: &[u8], offset: usize) -> Result<String> {
    let end = data[offset..]
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| Error::Truncated("rpm header string missing NUL terminator".to_string()))?;
    std::str::from_utf8(&data[offset..offset + end])
        .map(|s| s.to_string())
        .map_err(|e| Error::Decoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_tags() {
        let mut section = RpmHeaderSection::new();
        section.add(1000, HeaderValue::String("pkginspect-test".to_string()));
        section.add(1009, HeaderValue::Int32(vec![1234]));
        section.add(1116, HeaderValue::Int32(vec![0, 1, 0]));
        section.add(1117, HeaderValue::StringArray(vec!["a.txt".to_string(), "b.txt".to_string()]));

        let bytes = section.build();
        let (parsed, consumed) = RpmHeaderSection::parse(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());

        assert_eq!(
            parsed.get(1000),
            Some(&HeaderValue::String("pkginspect-test".to_string()))
        );
        assert_eq!(parsed.get(1009), Some(&HeaderValue::Int32(vec![1234])));
        assert_eq!(
            parsed.get(1117),
            Some(&HeaderValue::StringArray(vec![
                "a.txt".to_string(),
                "b.txt".to_string()
            ]))
        );
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(matches!(
            RpmHeaderSection::parse(&[0u8; 20]),
            Err(Error::BadMagic(_))
        ));
    }
}

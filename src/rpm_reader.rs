//! RPM v3 reader: Lead -> signature -> main header -> compressed cpio payload.
//!
//! Grounded on the original `rpm_info.py`'s `show_summary`/`show_analyze`/
//! `show_headers`/`extract_header`/`list_contents` and its `TAG_NAMES` table.
use crate::binreader::BinReader;
use crate::compress::{decompress, Compression};
use crate::cpio::CpioReader;
use crate::error::{Error, Result};
use crate::fileinfo::FileInfo;
use crate::pipe::spawn_producer;
use crate::rpm_header::{HeaderValue, RpmHeaderSection};
use crate::rpm_tags;
use crate::tree_reader::{collect_sorted, TreeReader};

const LEAD_MAGIC: [u8; 4] = [0xED, 0xAB, 0xEE, 0xDB];
const LEAD_LEN: usize = 96;

/// Decoded 96-byte RPM Lead.
pub struct Lead {
    pub major: u8,
    pub minor: u8,
    pub package_type: u16,
    pub arch: u16,
    pub name: String,
    pub os: u16,
    pub signature_type: u16,
}

fn parse_lead(buf: &[u8]) -> Result<Lead> {
    if buf.len() < LEAD_LEN {
        return Err(Error::Truncated("rpm lead truncated".to_string()));
    }
    let mut r = BinReader::new(buf);
    let magic = r.read_bytes(4)?;
    if magic != LEAD_MAGIC {
        return Err(Error::BadMagic("rpm: bad lead magic".to_string()));
    }
    let major = r.read_u8()?;
    let minor = r.read_u8()?;
    let package_type = r.read_u16_be()?;
    let arch = r.read_u16_be()?;
    let name_bytes = r.read_bytes(66)?;
    let nul = name_bytes.iter().position(|b| *b == 0).unwrap_or(66);
    let name = std::str::from_utf8(&name_bytes[..nul])
        .map_err(|e| Error::Decoding(e.to_string()))?
        .to_string();
    let os = r.read_u16_be()?;
    let signature_type = r.read_u16_be()?;
    // 16 reserved bytes follow; not read.

    Ok(Lead {
        major,
        minor,
        package_type,
        arch,
        name,
        os,
        signature_type,
    })
}

fn align8(pos: usize) -> usize {
    (pos + 7) & !7
}

/// A fully parsed RPM: lead, signature, main header, and the still-compressed
/// payload bytes (decompressed lazily by `cpio_entries`/`list`).
pub struct RpmFile {
    pub lead: Lead,
    pub signature: RpmHeaderSection,
    pub header: RpmHeaderSection,
    payload: Vec<u8>,
}

impl RpmFile {
    pub fn parse(buf: &[u8]) -> Result<RpmFile> {
        let lead = parse_lead(buf)?;
        let mut pos = LEAD_LEN;

        let (signature, sig_end) = RpmHeaderSection::parse(&buf[pos..])?;
        pos += sig_end;
        pos = align8(pos);

        let (header, hdr_end) = RpmHeaderSection::parse(&buf[pos..])?;
        pos += hdr_end;

        let payload = buf[pos..].to_vec();

        Ok(RpmFile {
            lead,
            signature,
            header,
            payload,
        })
    }

    fn payload_compression(&self) -> Compression {
        match self.header.get(rpm_tags::PAYLOADCOMPRESSOR) {
            Some(HeaderValue::String(s)) => Compression::from_rpm_name(s),
            _ => Compression::None,
        }
    }

    pub fn string_tag(&self, tag: u32) -> Option<String> {
        match self.header.get(tag) {
            Some(HeaderValue::String(s)) | Some(HeaderValue::I18NString(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn int32_tag(&self, tag: u32) -> Option<u32> {
        match self.header.get(tag) {
            Some(HeaderValue::Int32(v)) => v.first().copied(),
            _ => None,
        }
    }

    /// Decompress the payload and parse it as a cpio stream, returning a
    /// sorted `FileInfo` list. Runs the decompressor on a producer thread
    /// feeding an in-process pipe (C20), matching the original CLI's
    /// threaded `--list` path.
    pub fn list(&self) -> Result<Vec<FileInfo>> {
        let codec = self.payload_compression();
        let raw = decompress(codec, &self.payload)?;
        let reader = spawn_producer(raw);
        let mut cpio = CpioReader::new(reader);
        collect_sorted(&mut cpio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_buffer() {
        assert!(matches!(RpmFile::parse(&[0u8; 10]), Err(Error::Truncated(_))));
    }

    #[test]
    fn rejects_bad_lead_magic() {
        let buf = vec![0u8; LEAD_LEN];
        assert!(matches!(RpmFile::parse(&buf), Err(Error::BadMagic(_))));
    }
}

//! XAR header + zlib TOC XML + payload heap walk, feeding the cpio reader.
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;

use crate::binreader::BinReader;
use crate::compress::{decompress, Compression};
use crate::cpio::read_all;
use crate::error::{Error, Result};
use crate::fileinfo::FileInfo;

const XAR_MAGIC: &[u8; 4] = b"xar!";

struct PayloadEntry {
    offset: u64,
    length: u64,
    size: Option<u64>,
    encoding: String,
}

fn parse_toc(toc_xml: &[u8]) -> Result<Vec<PayloadEntry>> {
    let mut reader = XmlReader::from_reader(toc_xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut entries = Vec::new();

    // State for the element currently being walked inside a <file>.
    let mut in_data = false;
    let mut cur_tag = String::new();
    let mut is_payload_file = false;
    let mut name_text = String::new();
    let mut offset: Option<u64> = None;
    let mut length: Option<u64> = None;
    let mut size: Option<u64> = None;
    let mut encoding = String::from("application/octet-stream");

    loop {
        match reader
            .read_event(&mut buf)
            .map_err(|e| Error::Decoding(format!("xar toc xml: {}", e)))?
        {
            Event::Start(ref e) => {
                let name = String::from_utf8_lossy(e.name()).to_string();
                if name == "data" {
                    in_data = true;
                }
                if name == "file" {
                    is_payload_file = false;
                    offset = None;
                    length = None;
                    size = None;
                    encoding = String::from("application/octet-stream");
                }
                if name == "encoding" {
                    if let Some(style) = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key == b"style")
                    {
                        encoding = String::from_utf8_lossy(&style.value).to_string();
                    }
                }
                cur_tag = name;
            }
            Event::Text(t) => {
                let text = t
                    .unescape_and_decode(&reader)
                    .map_err(|e| Error::Decoding(e.to_string()))?;
                match cur_tag.as_str() {
                    "name" if !in_data => name_text = text,
                    "offset" if in_data => offset = text.trim().parse().ok(),
                    "length" if in_data => length = text.trim().parse().ok(),
                    "size" if in_data => size = text.trim().parse().ok(),
                    _ => (),
                }
            }
            Event::End(ref e) => {
                let name = String::from_utf8_lossy(e.name()).to_string();
                if name == "data" {
                    in_data = false;
                }
                if name == "name" && name_text == "Payload" {
                    is_payload_file = true;
                }
                if name == "file" && is_payload_file {
                    if let (Some(off), Some(len)) = (offset, length) {
                        entries.push(PayloadEntry {
                            offset: off,
                            length: len,
                            size,
                            encoding: encoding.clone(),
                        });
                    }
                    is_payload_file = false;
                }
            }
            Event::Eof => break,
            _ => (),
        }
        buf.clear();
    }

    Ok(entries)
}

/// Parse a XAR container (`.pkg` or any other xar archive) and return the
/// `FileInfo` entries recovered from its gzipped-cpio Payload member.
pub fn read_xar(buf: &[u8]) -> Result<Vec<FileInfo>> {
    let mut r = BinReader::new(buf);
    let magic = r.read_bytes(4)?;
    if magic != XAR_MAGIC {
        return Err(Error::BadMagic("xar: missing xar! magic".to_string()));
    }
    let header_size = r.read_u16_be()? as u64;
    let _version = r.read_u16_be()?;
    let toc_compressed_len = r.read_u64_be()?;
    let toc_uncompressed_len = r.read_u64_be()?;
    let _cksum_algo = r.read_u32_be()?;

    let toc_start = header_size as usize;
    let toc_end = toc_start + toc_compressed_len as usize;
    if toc_end > buf.len() {
        return Err(Error::Truncated("xar toc overruns file".to_string()));
    }
    let toc_compressed = &buf[toc_start..toc_end];
    let toc_xml = decompress(Compression::Zlib, toc_compressed)?;
    if toc_xml.len() as u64 != toc_uncompressed_len {
        log::warn!(
            "xar toc length mismatch: expected {}, got {}",
            toc_uncompressed_len,
            toc_xml.len()
        );
    }

    let payload_entries = parse_toc(&toc_xml)?;
    let heap_start = header_size as usize + toc_compressed_len as usize;

    let mut out = Vec::new();
    for entry in payload_entries {
        let start = heap_start + entry.offset as usize;
        let end = start + entry.length as usize;
        if end > buf.len() {
            log::warn!("xar payload slice overruns file, skipping");
            continue;
        }
        let raw = &buf[start..end];
        let cpio_bytes = match entry.encoding.as_str() {
            "application/x-gzip" => decompress(Compression::Gzip, raw)?,
            "application/x-bzip2" => decompress(Compression::Bzip2, raw)?,
            _ => raw.to_vec(),
        };
        let entries = read_all(std::io::Cursor::new(cpio_bytes))?;
        out.extend(entries.into_iter().map(|(info, _)| info));
    }

    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let buf = b"nope".to_vec();
        assert!(matches!(read_xar(&buf), Err(Error::BadMagic(_))));
    }
}

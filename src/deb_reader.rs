//! ar framing for `.deb` packages: locates `data.tar{,.gz,.xz}` and dispatches
//! to the tar reader (C5) over that member's byte range.
use crate::error::{Error, Result};
use crate::fileinfo::FileInfo;
use crate::tar_reader::TarReader;
use crate::tree_reader::TreeReader;

const AR_MAGIC: &[u8] = b"!<arch>\n";
const MEMBER_HEADER_LEN: usize = 60;

struct ArMember {
    name: String,
    data: Vec<u8>,
}

fn parse_ar(buf: &[u8]) -> Result<Vec<ArMember>> {
    if !buf.starts_with(AR_MAGIC) {
        return Err(Error::BadMagic("ar: missing !<arch>\\n".to_string()));
    }
    let mut pos = AR_MAGIC.len();
    let mut members = Vec::new();
    while pos + MEMBER_HEADER_LEN <= buf.len() {
        let header = &buf[pos..pos + MEMBER_HEADER_LEN];
        let name = std::str::from_utf8(&header[0..16])
            .map_err(|e| Error::Decoding(e.to_string()))?
            .trim_end()
            .to_string();
        let size_str = std::str::from_utf8(&header[48..58])
            .map_err(|e| Error::Decoding(e.to_string()))?
            .trim_end();
        let size: usize = size_str
            .parse()
            .map_err(|_| Error::Decoding(format!("bad ar member size {:?}", size_str)))?;
        pos += MEMBER_HEADER_LEN;
        if pos + size > buf.len() {
            return Err(Error::Truncated("ar member overruns archive".to_string()));
        }
        let data = buf[pos..pos + size].to_vec();
        pos += size;
        // Members pad to even byte boundaries.
        if size % 2 == 1 {
            pos += 1;
        }
        members.push(ArMember { name, data });
    }
    Ok(members)
}

/// Reader over a `.deb` package: unwraps the ar container and streams the
/// inner `data.tar{,.gz,.xz}` member through the tar reader.
pub struct DebReader {
    inner: Box<dyn TreeReader>,
}

impl DebReader {
    pub fn open(buf: Vec<u8>) -> Result<DebReader> {
        let members = parse_ar(&buf)?;
        let data_member = members
            .into_iter()
            .find(|m| m.name.starts_with("data.tar"))
            .ok_or_else(|| Error::MissingField("data.tar member".to_string()))?;

        let tar_reader = TarReader::from_bytes_with_suffix(data_member.data, &data_member.name)?;
        Ok(DebReader {
            inner: Box::new(tar_reader),
        })
    }
}

impl TreeReader for DebReader {
    fn next(&mut self) -> Result<Option<FileInfo>> {
        self.inner.next()
    }

    fn is_done(&self) -> bool {
        self.inner.is_done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad_member(buf: &mut Vec<u8>, name: &str, data: &[u8]) {
        let mut header = vec![b' '; MEMBER_HEADER_LEN];
        header[0..name.len()].copy_from_slice(name.as_bytes());
        let size_str = data.len().to_string();
        header[48..48 + size_str.len()].copy_from_slice(size_str.as_bytes());
        header[58] = b'`';
        header[59] = b'\n';
        buf.extend_from_slice(&header);
        buf.extend_from_slice(data);
        if data.len() % 2 == 1 {
            buf.push(0);
        }
    }

    #[test]
    fn parses_ar_members() {
        let mut buf = AR_MAGIC.to_vec();
        pad_member(&mut buf, "debian-binary", b"2.0\n");
        pad_member(&mut buf, "data.tar", b"not really a tar but parsed lazily");
        let members = parse_ar(&buf).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "debian-binary");
        assert_eq!(members[1].name, "data.tar");
    }
}

//! Walk USTAR/PAX tar entries, yielding `FileInfo`.
//!
//! The `PosixHeader` layout, the ascii-octal/ascii-decimal parsers and the
//! PAX/GNU-longname handling below are carried over from a prior
//! integrity-indexing tool's tar parser; the terminal action changes from
//! "hash and push a bincode index record" to "yield a `FileInfo`".
use std::io::Read;
use std::mem;
use std::slice;
use std::str;

use crate::compress::{decompress_gzip, decompress_xz, Compression};
use crate::error::{Error, Result};
use crate::fileinfo::{FileInfo, S_IFDIR, S_IFLNK, S_IFREG};
use crate::tree_reader::TreeReader;

/// Tar header binary compatible with the Posix/USTAR specification.
#[repr(C)]
#[derive(Debug)]
struct PosixHeader {
    name: [u8; 100],
    mode: [u8; 8],
    uid: [u8; 8],
    gid: [u8; 8],
    size: [u8; 12],
    mtime: [u8; 12],
    chksum: [u8; 8],
    typeflag: u8,
    linkname: [u8; 100],
    magic: [u8; 6],
    version: [u8; 2],
    uname: [u8; 32],
    gname: [u8; 32],
    devmajor: [u8; 8],
    devminor: [u8; 8],
    prefix: [u8; 155],
    padding: [u8; 12],
}

const HEADER_SIZE: usize = mem::size_of::<PosixHeader>();

fn ascii_octal_to_u64(buf: &[u8]) -> Result<u64> {
    let mut n: u64 = 0;
    for c in buf {
        let ch = *c;
        if ch >= b'0' && ch <= b'7' {
            n = n * 8 + (ch - b'0') as u64;
        } else if ch == 0 || ch == b' ' {
            break;
        } else {
            return Err(Error::Decoding(format!("illegal octal character {}", ch)));
        }
    }
    Ok(n)
}

fn extend(dest: &mut Vec<u8>, src: &[u8]) {
    for ch in src.iter() {
        if *ch != 0 {
            dest.push(*ch);
        } else {
            break;
        }
    }
}

fn nul_terminated_string(buf: &[u8]) -> Result<String> {
    let mut v = Vec::new();
    extend(&mut v, buf);
    String::from_utf8(v).map_err(|e| Error::Decoding(e.to_string()))
}

/// USTAR checksum: the unsigned sum of every header byte, with the `chksum`
/// field itself treated as eight ASCII spaces while summing.
fn header_checksum_valid(header: &PosixHeader) -> Result<bool> {
    const CHKSUM_OFFSET: usize = 100 + 8 + 8 + 8 + 12 + 12; // name+mode+uid+gid+size+mtime
    const CHKSUM_LEN: usize = 8;

    let expected = ascii_octal_to_u64(&header.chksum)?;
    let raw = unsafe { slice::from_raw_parts(header as *const _ as *const u8, HEADER_SIZE) };
    let actual: u64 = raw
        .iter()
        .enumerate()
        .map(|(i, b)| {
            if (CHKSUM_OFFSET..CHKSUM_OFFSET + CHKSUM_LEN).contains(&i) {
                b' ' as u64
            } else {
                *b as u64
            }
        })
        .sum();
    Ok(actual == expected)
}

/// One decoded PAX record override, applied to the following entry.
#[derive(Default)]
struct PaxOverrides {
    path: Option<String>,
    linkpath: Option<String>,
}

/// Streaming reader over a (possibly gz/xz-framed) tar byte stream.
pub struct TarReader<R: Read> {
    reader: R,
    done: bool,
    pending_name: Option<String>,
    pending_link: Option<String>,
}

impl TarReader<std::io::Cursor<Vec<u8>>> {
    /// Build a reader from a raw file's bytes, applying the compression
    /// implied by its file name suffix.
    pub fn from_bytes_with_suffix(data: Vec<u8>, name: &str) -> Result<TarReader<std::io::Cursor<Vec<u8>>>> {
        let raw = match Compression::from_suffix(name) {
            Compression::Gzip => decompress_gzip(&data)?,
            Compression::Xz => decompress_xz(&data)?,
            _ => data,
        };
        Ok(TarReader {
            reader: std::io::Cursor::new(raw),
            done: false,
            pending_name: None,
            pending_link: None,
        })
    }
}

impl<R: Read> TarReader<R> {
    pub fn new(reader: R) -> TarReader<R> {
        TarReader {
            reader,
            done: false,
            pending_name: None,
            pending_link: None,
        }
    }

    fn read_header(&mut self) -> Result<Option<PosixHeader>> {
        let mut header: PosixHeader = unsafe { mem::zeroed() };
        unsafe {
            let raw_ptr = &mut header as *mut _ as *mut u8;
            let slice = slice::from_raw_parts_mut(raw_ptr, HEADER_SIZE);
            match self.reader.read_exact(slice) {
                Ok(_) => (),
                Err(_) => return Ok(None),
            }
        }
        // All-zero header marks end of archive.
        if header.name.iter().all(|b| *b == 0) && header.typeflag == 0 {
            return Ok(None);
        }
        Ok(Some(header))
    }

    fn read_padded(&mut self, size: u64) -> Result<Vec<u8>> {
        let rsize = ((size + 511) / 512) * 512;
        let mut buf = vec![0u8; rsize as usize];
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| Error::Truncated(e.to_string()))?;
        buf.truncate(size as usize);
        Ok(buf)
    }

    fn parse_pax(&mut self, size: u64) -> Result<PaxOverrides> {
        let buf = self.read_padded(size)?;
        let mut overrides = PaxOverrides::default();
        let mut p = 0usize;
        while p < buf.len() {
            let rec_start = p;
            while p < buf.len() && buf[p] != b' ' {
                p += 1;
            }
            if p >= buf.len() {
                break;
            }
            let len_str = str::from_utf8(&buf[rec_start..p])
                .map_err(|e| Error::Decoding(e.to_string()))?;
            let rec_len: usize = len_str
                .trim()
                .parse()
                .map_err(|_| Error::Decoding("bad pax record length".to_string()))?;
            let rec_end = rec_start + rec_len;
            if rec_end > buf.len() {
                return Err(Error::Truncated("pax record overruns buffer".to_string()));
            }
            let eq = buf[p..rec_end]
                .iter()
                .position(|b| *b == b'=')
                .ok_or_else(|| Error::Decoding("pax record missing '='".to_string()))?;
            let key_start = p + 1;
            let key_end = p + eq;
            let val_start = key_end + 1;
            // Value runs to just before the trailing newline.
            let val_end = rec_end - 1;
            let key = str::from_utf8(&buf[key_start..key_end])
                .map_err(|e| Error::Decoding(e.to_string()))?;
            let value = str::from_utf8(&buf[val_start..val_end])
                .map_err(|e| Error::Decoding(e.to_string()))?
                .to_string();
            match key {
                "path" => overrides.path = Some(value),
                "linkpath" => overrides.linkpath = Some(value),
                _ => (),
            }
            p = rec_end;
        }
        Ok(overrides)
    }
}

impl<R: Read> TreeReader for TarReader<R> {
    fn next(&mut self) -> Result<Option<FileInfo>> {
        loop {
            if self.done {
                return Ok(None);
            }
            let header = match self.read_header()? {
                Some(h) => h,
                None => {
                    self.done = true;
                    return Ok(None);
                }
            };

            if !header_checksum_valid(&header)? {
                log::warn!(
                    "tar: bad header checksum for {:?}, skipping entry",
                    nul_terminated_string(&header.name).unwrap_or_default()
                );
                let size = ascii_octal_to_u64(&header.size).unwrap_or(0);
                if size > 0 {
                    let _ = self.read_padded(size)?;
                }
                continue;
            }

            let size = ascii_octal_to_u64(&header.size)?;

            match header.typeflag {
                // PAX extended header: decode and apply to the next entry only.
                b'x' => {
                    let overrides = self.parse_pax(size)?;
                    self.pending_name = overrides.path;
                    self.pending_link = overrides.linkpath;
                    continue;
                }
                // GNU long name/link extensions.
                b'L' => {
                    let buf = self.read_padded(size)?;
                    self.pending_name = Some(
                        str::from_utf8(&buf)
                            .map_err(|e| Error::Decoding(e.to_string()))?
                            .trim_end_matches('\0')
                            .to_string(),
                    );
                    continue;
                }
                b'K' => {
                    let buf = self.read_padded(size)?;
                    self.pending_link = Some(
                        str::from_utf8(&buf)
                            .map_err(|e| Error::Decoding(e.to_string()))?
                            .trim_end_matches('\0')
                            .to_string(),
                    );
                    continue;
                }
                // Global pax header: skip, no effect on following entry.
                b'g' => {
                    self.parse_pax(size)?;
                    continue;
                }
                b'0' | 0 | b'1' | b'2' | b'5' => {
                    let raw_name = self
                        .pending_name
                        .take()
                        .map(Ok)
                        .unwrap_or_else(|| {
                            let mut buf = Vec::new();
                            if header.prefix[0] != 0 {
                                extend(&mut buf, &header.prefix);
                                buf.push(b'/');
                            }
                            extend(&mut buf, &header.name);
                            String::from_utf8(buf).map_err(|e| Error::Decoding(e.to_string()))
                        })?;
                    let path = FileInfo::strip_leading_dot_slash(&raw_name).to_string();

                    let mode = ascii_octal_to_u64(&header.mode)? as u32;
                    let uid = ascii_octal_to_u64(&header.uid)? as u32;
                    let gid = ascii_octal_to_u64(&header.gid)? as u32;

                    let linkname = self
                        .pending_link
                        .take()
                        .map(Ok)
                        .unwrap_or_else(|| nul_terminated_string(&header.linkname))?;

                    let is_dir = header.typeflag == b'5';
                    let is_symlink = header.typeflag == b'2';

                    let content_size = if is_dir || is_symlink { 0 } else { size };

                    // Regular/hardlink/unknown-as-regular entries carry content
                    // that must still be consumed from the stream even if we
                    // don't keep the bytes.
                    if !is_dir && !is_symlink && size > 0 {
                        let _ = self.read_padded(size)?;
                    }

                    let entry = if is_dir {
                        FileInfo {
                            path,
                            size: 0,
                            mode: (mode & !S_IFDIR) | S_IFDIR,
                            uid,
                            gid,
                            is_dir: true,
                            is_symlink: false,
                            symlink_target: None,
                        }
                    } else if is_symlink {
                        FileInfo {
                            path,
                            size: 0,
                            mode: (mode & !S_IFLNK) | S_IFLNK,
                            uid,
                            gid,
                            is_dir: false,
                            is_symlink: true,
                            symlink_target: Some(linkname),
                        }
                    } else {
                        FileInfo {
                            path,
                            size: content_size,
                            mode: (mode & !S_IFREG) | S_IFREG,
                            uid,
                            gid,
                            is_dir: false,
                            is_symlink: false,
                            symlink_target: None,
                        }
                    };
                    return Ok(Some(entry));
                }
                _ => {
                    // Unrecognized typeflag: skip its content and continue,
                    // rather than aborting the whole stream.
                    if size > 0 {
                        let _ = self.read_padded(size)?;
                    }
                    continue;
                }
            }
        }
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_header(
        buf: &mut Vec<u8>,
        name: &str,
        typeflag: u8,
        size: u64,
        linkname: &str,
    ) {
        let mut h = vec![0u8; HEADER_SIZE];
        h[0..name.len()].copy_from_slice(name.as_bytes());
        let mode = format!("{:07o}\0", 0o644);
        h[100..100 + mode.len()].copy_from_slice(mode.as_bytes());
        let uid = format!("{:07o}\0", 0);
        h[108..108 + uid.len()].copy_from_slice(uid.as_bytes());
        let gid = format!("{:07o}\0", 0);
        h[116..116 + gid.len()].copy_from_slice(gid.as_bytes());
        let size_str = format!("{:011o}\0", size);
        h[124..124 + size_str.len()].copy_from_slice(size_str.as_bytes());
        h[156] = typeflag;
        h[157..157 + linkname.len()].copy_from_slice(linkname.as_bytes());

        // chksum field (offset 148, len 8) counts as ASCII spaces while summing.
        for b in &mut h[148..156] {
            *b = b' ';
        }
        let sum: u64 = h.iter().map(|b| *b as u64).sum();
        let chksum = format!("{:06o}\0 ", sum);
        h[148..148 + chksum.len()].copy_from_slice(chksum.as_bytes());

        buf.extend_from_slice(&h);
    }

    fn pad_to_512(buf: &mut Vec<u8>, content: &[u8]) {
        buf.extend_from_slice(content);
        let rsize = ((content.len() + 511) / 512) * 512;
        buf.resize(buf.len() + (rsize - content.len()), 0);
    }

    #[test]
    fn reads_regular_file_and_dir() {
        let mut buf = Vec::new();
        write_header(&mut buf, "./hello.txt", b'0', 5, "");
        pad_to_512(&mut buf, b"howdy");
        write_header(&mut buf, "subdir/", b'5', 0, "");
        buf.resize(buf.len() + 512, 0);
        // Two zero blocks terminate the archive.
        buf.resize(buf.len() + 1024, 0);

        let mut r = TarReader::new(Cursor::new(buf));
        let f1 = r.next().unwrap().unwrap();
        assert_eq!(f1.path, "hello.txt");
        assert_eq!(f1.size, 5);
        assert!(!f1.is_dir);

        let f2 = r.next().unwrap().unwrap();
        assert_eq!(f2.path, "subdir/");
        assert!(f2.is_dir);
        assert_eq!(f2.size, 0);

        assert!(r.next().unwrap().is_none());
    }

    #[test]
    fn paths_never_begin_with_dot_slash() {
        let mut buf = Vec::new();
        write_header(&mut buf, "./a.txt", b'0', 0, "");
        buf.resize(buf.len() + 1024, 0);
        let mut r = TarReader::new(Cursor::new(buf));
        let f = r.next().unwrap().unwrap();
        assert!(!f.path.starts_with("./"));
        assert!(!f.path.starts_with('/'));
    }

    #[test]
    fn symlink_carries_target() {
        let mut buf = Vec::new();
        write_header(&mut buf, "link", b'2', 0, "hello.txt");
        buf.resize(buf.len() + 1024, 0);
        let mut r = TarReader::new(Cursor::new(buf));
        let f = r.next().unwrap().unwrap();
        assert!(f.is_symlink);
        assert_eq!(f.symlink_target.as_deref(), Some("hello.txt"));
        assert_eq!(f.size, 0);
    }

    #[test]
    fn bad_checksum_entry_is_skipped_but_others_still_read() {
        let mut buf = Vec::new();
        write_header(&mut buf, "bad.txt", b'0', 0, "");
        // Corrupt a name byte after the checksum was computed, so the stored
        // checksum no longer matches.
        buf[0] = b'X';
        write_header(&mut buf, "good.txt", b'0', 0, "");
        buf.resize(buf.len() + 1024, 0);

        let mut r = TarReader::new(Cursor::new(buf));
        let f = r.next().unwrap().unwrap();
        assert_eq!(f.path, "good.txt");
        assert!(r.next().unwrap().is_none());
    }
}

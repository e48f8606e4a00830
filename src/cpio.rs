//! SVR4 "newc" cpio reader and writer.
//!
//! The writer mirrors the original `cpio_writer.py`'s `CpioWriter` class
//! field-for-field: the 110-byte ASCII-hex header, the 4-byte padding after
//! name and after content, and the `TRAILER!!!` sentinel.
use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::fileinfo::{FileInfo, S_IFDIR, S_IFLNK, S_IFREG};
use crate::tree_reader::TreeReader;

const MAGIC: &[u8; 6] = b"070701";
const TRAILER: &str = "TRAILER!!!";

fn pad4(n: usize) -> usize {
    (4 - (n % 4)) % 4
}

/// One parsed cpio "newc" header plus its (already-consumed) path.
struct RawEntry {
    mode: u32,
    uid: u32,
    gid: u32,
    filesize: u64,
    path: String,
    content: Vec<u8>,
}

/// Streaming reader over an in-memory SVR4 newc cpio byte buffer.
pub struct CpioReader<R: Read> {
    reader: R,
    done: bool,
}

impl<R: Read> CpioReader<R> {
    pub fn new(reader: R) -> CpioReader<R> {
        CpioReader { reader, done: false }
    }

    fn read_hex_field(buf: &[u8]) -> Result<u64> {
        let s = std::str::from_utf8(buf).map_err(|e| Error::Decoding(e.to_string()))?;
        u64::from_str_radix(s, 16).map_err(|e| Error::Decoding(e.to_string()))
    }

    fn read_exact_n(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.reader
            .read_exact(&mut buf)
            .map_err(|_| Error::Truncated(format!("expected {} bytes", n)))?;
        Ok(buf)
    }

    fn read_entry(&mut self) -> Result<Option<RawEntry>> {
        let magic = self.read_exact_n(6)?;
        if &magic[..] != &MAGIC[..] {
            return Err(Error::BadMagic(format!("{:?}", magic)));
        }

        // inode, mode, uid, gid, nlink, mtime, filesize, devmajor, devminor,
        // rdevmajor, rdevminor, namesize, chksum — 13 8-char hex fields.
        let fields: Vec<u64> = (0..13)
            .map(|_| {
                let f = self.read_exact_n(8)?;
                Self::read_hex_field(&f)
            })
            .collect::<Result<Vec<_>>>()?;

        let mode = fields[1] as u32;
        let uid = fields[2] as u32;
        let gid = fields[3] as u32;
        let filesize = fields[6];
        let namesize = fields[11] as usize;

        let name_bytes = self.read_exact_n(namesize)?;
        // namesize includes the trailing NUL.
        let path = std::str::from_utf8(&name_bytes[..namesize.saturating_sub(1)])
            .map_err(|e| Error::Decoding(e.to_string()))?
            .to_string();

        // Pad from start of entry (header is 110 bytes: 6 magic + 13*8 fields).
        let header_and_name = 6 + 13 * 8 + namesize;
        let pad = pad4(header_and_name);
        if pad > 0 {
            self.read_exact_n(pad)?;
        }

        if path == TRAILER {
            return Ok(None);
        }

        let content = if filesize > 0 {
            self.read_exact_n(filesize as usize)?
        } else {
            Vec::new()
        };
        let pad = pad4(filesize as usize);
        if pad > 0 {
            self.read_exact_n(pad)?;
        }

        Ok(Some(RawEntry {
            mode,
            uid,
            gid,
            filesize,
            path,
            content,
        }))
    }
}

impl<R: Read> TreeReader for CpioReader<R> {
    fn next(&mut self) -> Result<Option<FileInfo>> {
        if self.done {
            return Ok(None);
        }
        let raw = match self.read_entry()? {
            Some(r) => r,
            None => {
                self.done = true;
                return Ok(None);
            }
        };

        let is_dir = raw.mode & crate::fileinfo::S_IFMT == S_IFDIR;
        let is_symlink = raw.mode & crate::fileinfo::S_IFMT == S_IFLNK;

        let entry = if is_symlink {
            let target = String::from_utf8(raw.content).map_err(|e| Error::Decoding(e.to_string()))?;
            FileInfo {
                path: raw.path,
                size: 0,
                mode: raw.mode,
                uid: raw.uid,
                gid: raw.gid,
                is_dir: false,
                is_symlink: true,
                symlink_target: Some(target),
            }
        } else {
            FileInfo {
                path: raw.path,
                size: if is_dir { 0 } else { raw.filesize },
                mode: raw.mode,
                uid: raw.uid,
                gid: raw.gid,
                is_dir,
                is_symlink: false,
                symlink_target: None,
            }
        };
        Ok(Some(entry))
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

/// Read the content bytes of a regular file, alongside a `CpioReader` scan.
///
/// The streaming `TreeReader` interface discards content; callers that need
/// bytes (e.g. the xar/pkg reader materializing a symlink target, or tests)
/// should use `read_all` instead and pick entries out by path.
pub fn read_all<R: Read>(reader: R) -> Result<Vec<(FileInfo, Vec<u8>)>> {
    let mut r = CpioReaderWithContent { inner: CpioReader::new(reader) };
    r.collect()
}

struct CpioReaderWithContent<R: Read> {
    inner: CpioReader<R>,
}

impl<R: Read> CpioReaderWithContent<R> {
    fn collect(&mut self) -> Result<Vec<(FileInfo, Vec<u8>)>> {
        let mut out = Vec::new();
        loop {
            match self.inner.read_entry()? {
                Some(raw) => {
                    let is_dir = raw.mode & crate::fileinfo::S_IFMT == S_IFDIR;
                    let is_symlink = raw.mode & crate::fileinfo::S_IFMT == S_IFLNK;
                    let content = raw.content.clone();
                    let entry = if is_symlink {
                        FileInfo {
                            path: raw.path,
                            size: 0,
                            mode: raw.mode,
                            uid: raw.uid,
                            gid: raw.gid,
                            is_dir: false,
                            is_symlink: true,
                            symlink_target: Some(
                                String::from_utf8(content.clone())
                                    .map_err(|e| Error::Decoding(e.to_string()))?,
                            ),
                        }
                    } else {
                        FileInfo {
                            path: raw.path,
                            size: if is_dir { 0 } else { raw.filesize },
                            mode: raw.mode,
                            uid: raw.uid,
                            gid: raw.gid,
                            is_dir,
                            is_symlink: false,
                            symlink_target: None,
                        }
                    };
                    out.push((entry, content));
                }
                None => break,
            }
        }
        Ok(out)
    }
}

/// Writer for the SVR4 newc cpio format. Auto-increments inode numbers from 1.
pub struct CpioWriter<W: Write> {
    writer: W,
    next_inode: u32,
    finished: bool,
}

impl<W: Write> CpioWriter<W> {
    pub fn new(writer: W) -> CpioWriter<W> {
        CpioWriter {
            writer,
            next_inode: 1,
            finished: false,
        }
    }

    fn write_header(
        &mut self,
        mode: u32,
        uid: u32,
        gid: u32,
        nlink: u32,
        filesize: u64,
        name: &str,
    ) -> Result<()> {
        let inode = self.next_inode;
        self.next_inode += 1;
        let namesize = name.len() + 1; // include trailing NUL

        self.writer.write_all(MAGIC)?;
        for field in [
            inode as u64,
            mode as u64,
            uid as u64,
            gid as u64,
            nlink as u64,
            0u64, // mtime
            filesize,
            0u64, // devmajor
            0u64, // devminor
            0u64, // rdevmajor
            0u64, // rdevminor
            namesize as u64,
            0u64, // chksum
        ] {
            write!(self.writer, "{:08X}", field)?;
        }
        self.writer.write_all(name.as_bytes())?;
        self.writer.write_all(&[0u8])?;

        let header_and_name = 6 + 13 * 8 + namesize;
        let pad = pad4(header_and_name);
        if pad > 0 {
            self.writer.write_all(&vec![0u8; pad])?;
        }
        Ok(())
    }

    fn write_content(&mut self, content: &[u8]) -> Result<()> {
        self.writer.write_all(content)?;
        let pad = pad4(content.len());
        if pad > 0 {
            self.writer.write_all(&vec![0u8; pad])?;
        }
        Ok(())
    }

    pub fn add_directory(&mut self, path: &str, mode: u32, uid: u32, gid: u32) -> Result<()> {
        let mode = (mode & !crate::fileinfo::S_IFMT) | S_IFDIR;
        self.write_header(mode, uid, gid, 2, 0, path)
    }

    pub fn add_file(
        &mut self,
        path: &str,
        content: &[u8],
        mode: u32,
        uid: u32,
        gid: u32,
    ) -> Result<()> {
        let mode = (mode & !crate::fileinfo::S_IFMT) | S_IFREG;
        self.write_header(mode, uid, gid, 1, content.len() as u64, path)?;
        self.write_content(content)
    }

    pub fn add_symlink(
        &mut self,
        path: &str,
        target: &str,
        mode: u32,
        uid: u32,
        gid: u32,
    ) -> Result<()> {
        let mode = (mode & !crate::fileinfo::S_IFMT) | S_IFLNK;
        self.write_header(mode, uid, gid, 1, target.len() as u64, path)?;
        self.write_content(target.as_bytes())
    }

    pub fn finish(mut self) -> Result<W> {
        self.write_header(0, 0, 0, 1, 0, TRAILER)?;
        self.finished = true;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_file_dir_and_symlink() {
        let mut w = CpioWriter::new(Cursor::new(Vec::new()));
        w.add_directory("subdir", 0o755, 1, 2).unwrap();
        w.add_file("subdir/hello.txt", b"howdy", 0o644, 1, 2).unwrap();
        w.add_symlink("link", "subdir/hello.txt", 0o777, 1, 2).unwrap();
        let cursor = w.finish().unwrap();
        let bytes = cursor.into_inner();

        let mut r = CpioReader::new(Cursor::new(bytes));
        let dir = r.next().unwrap().unwrap();
        assert!(dir.is_dir);
        assert_eq!(dir.path, "subdir");

        let file = r.next().unwrap().unwrap();
        assert_eq!(file.path, "subdir/hello.txt");
        assert_eq!(file.size, 5);
        assert_eq!(file.uid, 1);

        let link = r.next().unwrap().unwrap();
        assert!(link.is_symlink);
        assert_eq!(link.symlink_target.as_deref(), Some("subdir/hello.txt"));

        assert!(r.next().unwrap().is_none());
    }
}

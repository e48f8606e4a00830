//! JSON saved-tree codec: a flat array of `FileInfo` wire objects.
//!
//! Supersedes the teacher's `Index::to_file`/`from_file` bincode pair: same
//! "serde-derived struct, one `to_file`/`from_file` function pair" shape, a
//! different wire format and schema (a JSON array of flat `FileInfo`s, not a
//! bincode `Index` of `Inode`s carrying hash state).
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fileinfo::{FileInfo, S_IFDIR, S_IFLNK, S_IFMT, S_IFREG};
use crate::tree_reader::TreeReader;

/// On-wire shape for one entry, matching the §6 schema exactly: `mode` is an
/// octal string without a `0o` prefix, `uid`/`gid` default to 0 when absent,
/// and exactly one of `is_dir`/`is_symlink`/(neither, with `size`) is set.
#[derive(Debug, Serialize, Deserialize)]
struct WireEntry {
    path: String,
    mode: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    uid: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    gid: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_dir: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_symlink: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

fn to_wire(f: &FileInfo) -> WireEntry {
    WireEntry {
        path: f.path.clone(),
        mode: format!("{:o}", f.mode),
        uid: f.uid,
        gid: f.gid,
        is_dir: f.is_dir,
        is_symlink: f.is_symlink,
        target: f.symlink_target.clone(),
        size: if f.is_dir || f.is_symlink {
            None
        } else {
            Some(f.size)
        },
    }
}

fn from_wire(w: WireEntry) -> Result<FileInfo> {
    let parsed_mode =
        u32::from_str_radix(&w.mode, 8).map_err(|e| Error::Decoding(format!("bad mode {:?}: {}", w.mode, e)))?;
    let type_bits = if w.is_dir {
        S_IFDIR
    } else if w.is_symlink {
        S_IFLNK
    } else {
        S_IFREG
    };
    let mode = (parsed_mode & !S_IFMT) | type_bits;

    Ok(FileInfo {
        path: w.path,
        size: if w.is_dir || w.is_symlink { 0 } else { w.size.unwrap_or(0) },
        mode,
        uid: w.uid,
        gid: w.gid,
        is_dir: w.is_dir,
        is_symlink: w.is_symlink,
        symlink_target: w.target,
    })
}

/// Write a sorted `FileInfo` list to `path` as a JSON array.
pub fn save(path: &Path, entries: &[FileInfo]) -> Result<()> {
    let wire: Vec<WireEntry> = entries.iter().map(to_wire).collect();
    let json = serde_json::to_string_pretty(&wire).map_err(|e| Error::Decoding(e.to_string()))?;
    fs::write(path, json)?;
    Ok(())
}

/// Load a saved tree back into a `FileInfo` list.
pub fn load(path: &Path) -> Result<Vec<FileInfo>> {
    let raw = fs::read_to_string(path)?;
    let wire: Vec<WireEntry> = serde_json::from_str(&raw).map_err(|e| Error::Decoding(e.to_string()))?;
    wire.into_iter().map(from_wire).collect()
}

/// Replays a loaded (already-sorted) snapshot through the `TreeReader` contract.
pub struct SavedTreeReader {
    items: VecDeque<FileInfo>,
}

impl SavedTreeReader {
    pub fn new(entries: Vec<FileInfo>) -> SavedTreeReader {
        SavedTreeReader {
            items: entries.into(),
        }
    }

    pub fn open(path: &Path) -> Result<SavedTreeReader> {
        Ok(SavedTreeReader::new(load(path)?))
    }
}

impl TreeReader for SavedTreeReader {
    fn next(&mut self) -> Result<Option<FileInfo>> {
        Ok(self.items.pop_front())
    }

    fn is_done(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn round_trips_mixed_entries() {
        let entries = vec![
            FileInfo::new_dir("subdir", 0o755, 0, 0),
            FileInfo::new_file("subdir/a.txt", 12, 0o644, 1, 2),
            FileInfo::new_symlink("link", "subdir/a.txt", 0o777, 0, 0),
        ];

        let tmp = NamedTempFile::new().unwrap();
        save(tmp.path(), &entries).unwrap();
        let loaded = load(tmp.path()).unwrap();

        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[1].path, "subdir/a.txt");
        assert_eq!(loaded[1].size, 12);
        assert_eq!(loaded[1].uid, 1);
        assert!(loaded[2].is_symlink);
        assert_eq!(loaded[2].symlink_target.as_deref(), Some("subdir/a.txt"));
    }

    #[test]
    fn uid_gid_default_to_zero_when_absent() {
        let json = r#"[{"path":"a","mode":"644","size":3}]"#;
        let tmp = NamedTempFile::new().unwrap();
        fs::write(tmp.path(), json).unwrap();
        let loaded = load(tmp.path()).unwrap();
        assert_eq!(loaded[0].uid, 0);
        assert_eq!(loaded[0].gid, 0);
    }
}

//! Canonical entry type flowing through every tree reader.
use serde::{Deserialize, Serialize};

/// POSIX file-type bits within `mode` (`S_IFMT` mask).
pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFLNK: u32 = 0o120000;

/// A single entry in a package/archive/filesystem tree.
///
/// See the saved-tree JSON schema for the wire encoding of this type; this
/// struct is the in-memory shape every reader (tar, cpio, deb, pkg, dmg, rpm,
/// saved) normalizes into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    /// POSIX-style forward-slash path, no leading `./` or `/`.
    pub path: String,

    /// Payload byte length. Zero for directories and symlinks.
    pub size: u64,

    /// Full POSIX mode including file-type bits.
    pub mode: u32,

    pub uid: u32,
    pub gid: u32,

    pub is_dir: bool,
    pub is_symlink: bool,

    /// Link destination as stored. Present iff `is_symlink`.
    pub symlink_target: Option<String>,
}

impl FileInfo {
    pub fn new_dir(path: impl Into<String>, mode: u32, uid: u32, gid: u32) -> FileInfo {
        FileInfo {
            path: path.into(),
            size: 0,
            mode: mode | S_IFDIR,
            uid,
            gid,
            is_dir: true,
            is_symlink: false,
            symlink_target: None,
        }
    }

    pub fn new_file(
        path: impl Into<String>,
        size: u64,
        mode: u32,
        uid: u32,
        gid: u32,
    ) -> FileInfo {
        FileInfo {
            path: path.into(),
            size,
            mode: mode | S_IFREG,
            uid,
            gid,
            is_dir: false,
            is_symlink: false,
            symlink_target: None,
        }
    }

    pub fn new_symlink(
        path: impl Into<String>,
        target: impl Into<String>,
        mode: u32,
        uid: u32,
        gid: u32,
    ) -> FileInfo {
        FileInfo {
            path: path.into(),
            size: 0,
            mode: mode | S_IFLNK,
            uid,
            gid,
            is_dir: false,
            is_symlink: true,
            symlink_target: Some(target.into()),
        }
    }

    /// Strip a single leading `./`, matching tar's path normalization rule.
    pub fn strip_leading_dot_slash(path: &str) -> &str {
        path.strip_prefix("./").unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_has_zero_size_and_is_not_symlink() {
        let f = FileInfo::new_dir("a", 0o755, 0, 0);
        assert_eq!(f.size, 0);
        assert!(f.is_dir);
        assert!(!f.is_symlink);
    }

    #[test]
    fn symlink_has_target() {
        let f = FileInfo::new_symlink("a", "b", 0o777, 0, 0);
        assert!(f.is_symlink);
        assert_eq!(f.symlink_target.as_deref(), Some("b"));
    }

    #[test]
    fn strips_leading_dot_slash_once() {
        assert_eq!(FileInfo::strip_leading_dot_slash("./a/./b"), "a/./b");
        assert_eq!(FileInfo::strip_leading_dot_slash("a/b"), "a/b");
    }
}

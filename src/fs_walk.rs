//! Directory-walk helper: recursively lists a real filesystem directory as
//! `rpm_writer::Entry` values, in the same vein as `tar_reader`'s archive walk
//! but reading live files instead of archive bytes. Used by `rpm-build`.
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use crate::error::Result;
use crate::rpm_writer::{Entry, EntryKind};

fn walk_into(root: &Path, dir: &Path, prefix: &str, out: &mut Vec<Entry>) -> Result<()> {
    let mut children: Vec<_> = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    children.sort_by_key(|e| e.file_name());

    for child in children {
        let path = child.path();
        let rel = if prefix.is_empty() {
            child.file_name().to_string_lossy().into_owned()
        } else {
            format!("{}/{}", prefix, child.file_name().to_string_lossy())
        };
        let meta = fs::symlink_metadata(&path)?;
        let mode = meta.permissions().mode();
        let uid = meta.uid();
        let gid = meta.gid();

        if meta.file_type().is_symlink() {
            let target = fs::read_link(&path)?.to_string_lossy().into_owned();
            out.push(Entry {
                path: rel,
                mode,
                uid,
                gid,
                kind: EntryKind::Symlink { target },
            });
        } else if meta.is_dir() {
            out.push(Entry {
                path: rel.clone(),
                mode,
                uid,
                gid,
                kind: EntryKind::Directory,
            });
            walk_into(root, &path, &rel, out)?;
        } else {
            let content = fs::read(&path)?;
            out.push(Entry {
                path: rel,
                mode,
                uid,
                gid,
                kind: EntryKind::File { content },
            });
        }
    }
    Ok(())
}

/// Recursively walk `root`, returning every regular file/directory/symlink
/// underneath it as an `Entry`, sorted by directory-entry name at each level.
pub fn walk_directory(root: &Path) -> Result<Vec<Entry>> {
    let mut out = Vec::new();
    walk_into(root, root, "", &mut out)?;
    Ok(out)
}

//! The lazy `next()`/`is_done()` capability every container reader implements.
use crate::error::Result;
use crate::fileinfo::FileInfo;

/// A pull-based stream of `FileInfo` entries.
///
/// Modeled as a capability rather than a base class (§9 of the design): each
/// concrete reader (tar, cpio, deb, xar, dmg, rpm, saved) implements this
/// directly, and composition (deb-wraps-tar, dmg-wraps-hfs+pkg) is done by
/// ownership of an inner reader, not inheritance.
pub trait TreeReader {
    fn next(&mut self) -> Result<Option<FileInfo>>;
    fn is_done(&self) -> bool;
}

/// Drain a `TreeReader` into a `Vec`, for callers (comparison engine, saved
/// snapshots) that need an eagerly materialized, sorted view.
pub fn collect_sorted<R: TreeReader + ?Sized>(reader: &mut R) -> Result<Vec<FileInfo>> {
    let mut out = Vec::new();
    while let Some(entry) = reader.next()? {
        out.push(entry);
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecReader {
        items: std::collections::VecDeque<FileInfo>,
    }

    impl TreeReader for VecReader {
        fn next(&mut self) -> Result<Option<FileInfo>> {
            Ok(self.items.pop_front())
        }
        fn is_done(&self) -> bool {
            self.items.is_empty()
        }
    }

    #[test]
    fn collect_sorted_orders_by_path() {
        let mut r = VecReader {
            items: vec![
                FileInfo::new_dir("b", 0o755, 0, 0),
                FileInfo::new_dir("a", 0o755, 0, 0),
            ]
            .into(),
        };
        let out = collect_sorted(&mut r).unwrap();
        assert_eq!(out[0].path, "a");
        assert_eq!(out[1].path, "b");
    }
}

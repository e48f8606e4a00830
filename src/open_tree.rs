//! Format-sniffing front door: dispatches a file path to the right reader by
//! extension and drains it into a sorted `FileInfo` list, the shape `compare`
//! needs on both sides.
use std::path::Path;

use crate::compress::{decompress_gzip, decompress_xz};
use crate::deb_reader::DebReader;
use crate::dmg_reader::read_dmg;
use crate::error::{Error, Result};
use crate::fileinfo::FileInfo;
use crate::rpm_reader::RpmFile;
use crate::saved_tree;
use crate::tar_reader::TarReader;
use crate::tree_reader::{collect_sorted, TreeReader};
use crate::xar;

/// Open any supported container by its path's extension and return a sorted
/// `FileInfo` list.
pub fn open_tree(path: &Path) -> Result<Vec<FileInfo>> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    if name.ends_with(".json") {
        return saved_tree::load(path);
    }

    let buf = std::fs::read(path)?;

    if name.ends_with(".deb") {
        let mut reader = DebReader::open(buf)?;
        return collect_sorted(&mut reader);
    }
    if name.ends_with(".rpm") {
        let rpm = RpmFile::parse(&buf)?;
        return rpm.list();
    }
    if name.ends_with(".pkg") {
        return xar::read_xar(&buf);
    }
    if name.ends_with(".dmg") {
        return read_dmg(&buf);
    }
    if name.ends_with(".tar") {
        let mut reader: TarReader<std::io::Cursor<Vec<u8>>> = TarReader::new(std::io::Cursor::new(buf));
        return collect_sorted(&mut reader);
    }
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let raw = decompress_gzip(&buf)?;
        let mut reader: TarReader<std::io::Cursor<Vec<u8>>> = TarReader::new(std::io::Cursor::new(raw));
        return collect_sorted(&mut reader);
    }
    if name.ends_with(".tar.xz") {
        let raw = decompress_xz(&buf)?;
        let mut reader: TarReader<std::io::Cursor<Vec<u8>>> = TarReader::new(std::io::Cursor::new(raw));
        return collect_sorted(&mut reader);
    }

    Err(Error::InvalidArgument(format!(
        "unrecognized container extension for {:?}",
        path
    )))
}

#[allow(dead_code)]
fn _assert_tree_reader_object_safe(_: &mut dyn TreeReader) {}

//! `.dmg` package reader: composes the UDIF decoder (C9) and the HFS+ walker
//! (C10), recursing into embedded `.pkg` members via the XAR reader (C8).
use crate::error::Result;
use crate::fileinfo::FileInfo;
use crate::hfsplus::HfsPlusReader;
use crate::udif;
use crate::xar;

/// Decode a `.dmg` image into a sorted `FileInfo` list. Entries whose path
/// ends in `.pkg` are additionally read as XAR containers (one level deep,
/// per §9's Open Question): their contents are listed under an `@PKG@/`
/// prefix alongside the original `.pkg` leaf entry. A `.pkg` that fails to
/// parse as XAR is left as a plain leaf and the outer enumeration continues.
pub fn read_dmg(buf: &[u8]) -> Result<Vec<FileInfo>> {
    let hfs_image = udif::decode_hfs_image(buf)?;
    let hfs = HfsPlusReader::open(hfs_image)?;
    let entries = hfs.list()?;

    let mut out = Vec::new();
    for entry in entries {
        let is_pkg = !entry.is_dir && !entry.is_symlink && entry.path.ends_with(".pkg");
        if is_pkg {
            match hfs.read_file_by_path(&entry.path) {
                Ok(Some(bytes)) if bytes.starts_with(b"xar!") => match xar::read_xar(&bytes) {
                    Ok(inner) => {
                        out.extend(inner.into_iter().map(|mut f| {
                            f.path = format!("@PKG@/{}", f.path);
                            f
                        }));
                    }
                    Err(e) => log::warn!("dmg: embedded pkg {} failed to parse: {}", entry.path, e),
                },
                Ok(_) => (),
                Err(e) => log::warn!("dmg: reading embedded pkg {} failed: {}", entry.path, e),
            }
        }
        out.push(entry);
    }

    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

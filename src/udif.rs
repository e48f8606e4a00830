//! UDIF `.dmg` container: koly trailer, XML blkx plist, per-chunk decompression.
use crate::binreader::BinReader;
use crate::compress::{decompress, Compression};
use crate::error::{Error, Result};

const KOLY_MAGIC: u32 = 0x6B6F6C79;
const MISH_MAGIC: u32 = 0x6D697368;
const KOLY_TRAILER_LEN: usize = 512;

/// One decoded `mish` block-descriptor chunk.
struct Chunk {
    chunk_type: u32,
    sector_number: u64,
    sector_count: u64,
    compressed_offset: u64,
    compressed_length: u64,
}

struct MishBlock {
    sector_count: u64,
    data_offset: u64,
    chunks: Vec<Chunk>,
}

fn parse_mish(data: &[u8]) -> Result<MishBlock> {
    let mut r = BinReader::new(data);
    let magic = r.read_u32_be()?;
    if magic != MISH_MAGIC {
        return Err(Error::BadMagic("mish: bad magic".to_string()));
    }
    r.seek(8);
    let _first_sector = r.read_u64_be()?;
    let sector_count = r.read_u64_be()?;
    r.seek(24);
    let data_offset = r.read_u64_be()?;
    r.seek(200);
    let num_chunks = r.read_u32_be()?;

    let mut chunks = Vec::new();
    let mut pos = 204;
    for _ in 0..num_chunks {
        if pos + 40 > data.len() {
            break;
        }
        let mut cr = BinReader::at(data, pos);
        let chunk_type = cr.read_u32_be()?;
        let _comment = cr.read_u32_be()?;
        let sector_number = cr.read_u64_be()?;
        let chunk_sector_count = cr.read_u64_be()?;
        let compressed_offset = cr.read_u64_be()?;
        let compressed_length = cr.read_u64_be()?;
        chunks.push(Chunk {
            chunk_type,
            sector_number,
            sector_count: chunk_sector_count,
            compressed_offset,
            compressed_length,
        });
        pos += 40;
    }

    Ok(MishBlock { sector_count, data_offset, chunks })
}

fn compression_for_chunk_type(t: u32) -> Option<Compression> {
    match t {
        0x00000001 => Some(Compression::None),
        0x80000005 => Some(Compression::Zlib),
        0x80000006 => Some(Compression::Bzip2),
        0x80000007 => Some(Compression::Lzfse),
        0x80000008 => Some(Compression::Xz),
        _ => None,
    }
}

/// Decompress the HFS+ partition described by `mish` into a flat sector image.
fn decode_partition(file: &[u8], mish: &MishBlock) -> Result<Vec<u8>> {
    let max_sector = mish
        .chunks
        .iter()
        .map(|c| c.sector_number + c.sector_count)
        .max()
        .unwrap_or(0);
    let mut image = vec![0u8; (max_sector * 512) as usize];

    for chunk in &mish.chunks {
        match chunk.chunk_type {
            0x00000000 | 0x00000002 | 0x7FFFFFFE | 0xFFFFFFFF => continue,
            0x80000004 => {
                log::warn!("udif: ADC compression unsupported, skipping chunk");
                continue;
            }
            t => {
                let codec = match compression_for_chunk_type(t) {
                    Some(c) => c,
                    None => {
                        log::warn!("udif: unknown chunk type {:#x}, skipping", t);
                        continue;
                    }
                };
                let start = (mish.data_offset + chunk.compressed_offset) as usize;
                let end = start + chunk.compressed_length as usize;
                if end > file.len() {
                    log::warn!("udif: chunk overruns file, skipping");
                    continue;
                }
                let raw = &file[start..end];
                let plain = match decompress(codec, raw) {
                    Ok(p) => p,
                    Err(e) => {
                        log::warn!("udif: chunk decompression failed: {}", e);
                        continue;
                    }
                };
                let dest_start = (chunk.sector_number * 512) as usize;
                let dest_end = dest_start + plain.len();
                if dest_end > image.len() {
                    log::warn!("udif: decompressed chunk overruns image, truncating");
                    let avail = image.len() - dest_start;
                    image[dest_start..].copy_from_slice(&plain[..avail]);
                } else {
                    image[dest_start..dest_end].copy_from_slice(&plain);
                }
            }
        }
    }

    Ok(image)
}

/// One partition entry parsed out of the `resource-fork.blkx` plist array.
struct PartitionEntry {
    name: String,
    mish: MishBlock,
}

fn parse_blkx_plist(xml: &[u8]) -> Result<Vec<PartitionEntry>> {
    let value: plist::Value =
        plist::from_bytes(xml).map_err(|e| Error::Decoding(format!("blkx plist: {}", e)))?;
    let dict = value
        .as_dictionary()
        .ok_or_else(|| Error::MissingField("plist root dictionary".to_string()))?;
    let resource_fork = dict
        .get("resource-fork")
        .and_then(|v| v.as_dictionary())
        .ok_or_else(|| Error::MissingField("resource-fork".to_string()))?;
    let blkx = resource_fork
        .get("blkx")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::MissingField("blkx array".to_string()))?;

    let mut out = Vec::new();
    for entry in blkx {
        let d = match entry.as_dictionary() {
            Some(d) => d,
            None => continue,
        };
        let name = d
            .get("Name")
            .and_then(|v| v.as_string())
            .unwrap_or("")
            .to_string();
        let data = match d.get("Data").and_then(|v| v.as_data()) {
            Some(b) => b,
            None => continue,
        };
        let mish = parse_mish(data)?;
        out.push(PartitionEntry { name, mish });
    }
    Ok(out)
}

/// Select the HFS+ partition: first whose name mentions `Apple_HFS`/`Apple_HFSX`,
/// else the entry with the largest `mish` header `sector_count` (ties broken by
/// first-seen order; `Iterator::max_by_key` returns the *last* maximum on ties,
/// so the fallback is a manual fold instead).
fn select_hfs_partition(entries: &[PartitionEntry]) -> Result<&PartitionEntry> {
    if let Some(e) = entries
        .iter()
        .find(|e| e.name.contains("Apple_HFS") || e.name.contains("Apple_HFSX"))
    {
        return Ok(e);
    }
    let mut best: Option<&PartitionEntry> = None;
    for e in entries {
        best = match best {
            Some(b) if b.mish.sector_count >= e.mish.sector_count => Some(b),
            _ => Some(e),
        };
    }
    best.ok_or_else(|| Error::MissingField("no blkx partitions found".to_string()))
}

/// Parse the UDIF trailer and decode the selected HFS+ partition's raw sector image.
pub fn decode_hfs_image(file: &[u8]) -> Result<Vec<u8>> {
    if file.len() < KOLY_TRAILER_LEN {
        return Err(Error::Truncated("file shorter than koly trailer".to_string()));
    }
    let trailer = &file[file.len() - KOLY_TRAILER_LEN..];
    let mut r = BinReader::new(trailer);
    let magic = r.read_u32_be()?;
    if magic != KOLY_MAGIC {
        return Err(Error::BadMagic("udif: missing koly magic".to_string()));
    }
    r.seek(216);
    let xml_offset = r.read_u64_be()?;
    let xml_length = r.read_u64_be()?;

    let xml_start = xml_offset as usize;
    let xml_end = xml_start + xml_length as usize;
    if xml_end > file.len() {
        return Err(Error::Truncated("udif xml plist overruns file".to_string()));
    }
    let xml = &file[xml_start..xml_end];

    let partitions = parse_blkx_plist(xml)?;
    let selected = select_hfs_partition(&partitions)?;
    decode_partition(file, &selected.mish)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_file() {
        assert!(matches!(
            decode_hfs_image(&[0u8; 10]),
            Err(Error::Truncated(_))
        ));
    }

    #[test]
    fn rejects_bad_koly_magic() {
        let buf = vec![0u8; 512];
        assert!(matches!(decode_hfs_image(&buf), Err(Error::BadMagic(_))));
    }
}

//! Uniform decompress-to-bytes wrapper over the codecs the container formats use.
use std::io::Read;

use bzip2::read::BzDecoder;
use flate2::read::{GzDecoder, ZlibDecoder};
use xz2::read::XzDecoder;

use crate::error::{Error, Result};

/// Compression codec selected by a container's own framing (file suffix,
/// RPM `PAYLOADCOMPRESSOR` tag, UDIF chunk type, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zlib,
    Bzip2,
    Xz,
    /// Called out in the container format but not implemented by any crate
    /// in reach; callers must treat this as `Error::Unsupported`.
    Lzfse,
}

impl Compression {
    pub fn from_suffix(name: &str) -> Compression {
        if name.ends_with(".gz") {
            Compression::Gzip
        } else if name.ends_with(".xz") {
            Compression::Xz
        } else {
            Compression::None
        }
    }

    pub fn from_rpm_name(name: &str) -> Compression {
        match name {
            "gzip" => Compression::Gzip,
            "xz" => Compression::Xz,
            "bzip2" => Compression::Bzip2,
            _ => Compression::None,
        }
    }
}

/// Decompress `data` fully into memory per `codec`.
pub fn decompress(codec: Compression, data: &[u8]) -> Result<Vec<u8>> {
    match codec {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => decompress_gzip(data),
        Compression::Zlib => decompress_zlib(data),
        Compression::Bzip2 => decompress_bzip2(data),
        Compression::Xz => decompress_xz(data),
        Compression::Lzfse => Err(Error::Unsupported("lzfse decoding".to_string())),
    }
}

pub fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::Decompression(format!("gzip: {}", e)))?;
    Ok(out)
}

pub fn decompress_zlib(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::Decompression(format!("zlib: {}", e)))?;
    Ok(out)
}

pub fn decompress_bzip2(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    BzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::Decompression(format!("bzip2: {}", e)))?;
    Ok(out)
}

pub fn decompress_xz(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    XzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::Decompression(format!("xz: {}", e)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression as GzLevel;
    use std::io::Write;

    #[test]
    fn round_trips_gzip() {
        let mut enc = GzEncoder::new(Vec::new(), GzLevel::default());
        enc.write_all(b"hello world").unwrap();
        let compressed = enc.finish().unwrap();
        let out = decompress(Compression::Gzip, &compressed).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn lzfse_is_unsupported() {
        assert!(matches!(
            decompress(Compression::Lzfse, &[]),
            Err(Error::Unsupported(_))
        ));
    }
}

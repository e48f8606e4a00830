//! Container-agnostic error taxonomy shared by every reader/writer.
use thiserror::Error;

/// The kind of failure that occurred while parsing or synthesizing a container.
///
/// Readers surface these directly; `main.rs` wraps them in `anyhow` at the CLI
/// boundary the same way the teacher crate wraps `std::io::Error` with
/// `with_context`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("bad magic: {0}")]
    BadMagic(String),

    #[error("truncated: {0}")]
    Truncated(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("decoding failed: {0}")]
    Decoding(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

/// Error type for the storage substrate and its collaborators.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O failure while reading, writing or renaming a store file.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// An on-disk FST is missing, truncated, or has an invalid header.
    #[error("corrupt index: {detail}")]
    CorruptIndex { detail: String },
    /// Attempted to build an FST from a non strictly-ascending key sequence.
    #[error("FST build requires strictly ascending keys")]
    InvalidBuild,
    /// A lower-level FST construction or parse error not otherwise classified.
    #[error("fst error: {0}")]
    Fst(#[from] fst::Error),
    /// Fetching a URL failed.
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// Parsing RSS or HTML content failed.
    #[error("parse failed: {0}")]
    Parse(String),
}

/// Result type for the storage substrate and its collaborators.
pub type Result<T> = std::result::Result<T, Error>;

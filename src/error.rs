use thiserror::Error;

/// The result type returned by every fallible Urbis operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Discriminated failure kinds surfaced at the public API.
#[derive(Debug, Error)]
pub enum Error {
    /// Programmer error: null/invalid handle, out-of-range index, or
    /// degenerate geometry passed to a strict constructor.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),

    /// Memory pressure / an id space is exhausted.
    #[error("allocation failed: {0}")]
    Alloc(&'static str),

    /// Persistent-store read/write or seek failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted file was rejected at open: structurally broken.
    #[error("corrupt file: {0}")]
    Corrupt(&'static str),

    /// A persisted file's format version is newer than this build supports.
    #[error("unsupported file version: found {found}, max supported {max}")]
    Version { found: u32, max: u32 },

    /// The named id does not exist.
    #[error("not found: {0}")]
    NotFound(u64),

    /// A page or track cannot accept more objects/pages.
    #[error("full: {0}")]
    Full(&'static str),

    /// A query requires a built index but `build()` has not run since the
    /// last mutation.
    #[error("index not built since last mutation")]
    NotBuilt,

    /// Parser-boundary failure: malformed GeoJSON/WKT structure.
    #[error("parse error: {0}")]
    Parse(String),

    /// Parser-boundary failure: a recognized-but-unhandled top-level type.
    #[error("unsupported input: {0}")]
    Unsupported(String),

    /// Parser-boundary failure: invalid token stream (WKT).
    #[error("syntax error: {0}")]
    Syntax(String),
}

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which of the two markers an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Start,
    End,
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerKind::Start => f.write_str("start"),
            MarkerKind::End => f.write_str("end"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to allocate {size} bytes of memory for {path}")]
    Alloc { path: PathBuf, size: usize },

    #[error("tried to read {expected} bytes from {path}, but only got {actual}")]
    ShortRead {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("tried to write {expected} bytes to {path}, but only wrote {actual}")]
    ShortWrite {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("reading {which} marker at offset {offset} would put us past end of image ({len} bytes)")]
    TruncatedMarker {
        which: MarkerKind,
        offset: usize,
        len: usize,
    },

    #[error("failed to find {which} marker \"{marker}\"")]
    MarkerNotFound { which: MarkerKind, marker: String },

    #[error("replacement is {len} bytes but the region only holds {capacity}")]
    ReplacementTooLarge { len: usize, capacity: usize },

    #[error("replacement contains a NUL byte at offset {offset}")]
    EmbeddedNul { offset: usize },

    #[error("invalid region [{start}, {end}) in image of length {len}")]
    SpanOutOfBounds { start: usize, end: usize, len: usize },

    #[error("current region text does not match: expected {expected}, found {found:?}")]
    VerificationFailed { expected: String, found: String },
}

impl PatchError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PatchError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// True for failures that originate in the filesystem rather than the image contents.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            PatchError::Io { .. }
                | PatchError::Alloc { .. }
                | PatchError::ShortRead { .. }
                | PatchError::ShortWrite { .. }
        )
    }
}

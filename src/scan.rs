//! Single-pass marker scan.
//!
//! The region lives between a start marker and an end marker. The start
//! marker is followed by one separator byte that is not part of the region;
//! the region ends at the end marker's first byte.

use crate::error::{MarkerKind, PatchError};
use std::ops::Range;

pub const DEFAULT_START_MARKER: &str = "mark.start=1";
pub const DEFAULT_END_MARKER: &str = "mark.end=1";

/// Bytes skipped between the start marker and the region.
const SEPARATOR_LEN: usize = 1;

/// The pair of literal byte patterns that delimit the region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    start: Vec<u8>,
    end: Vec<u8>,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_MARKER.as_bytes().to_vec(),
            end: DEFAULT_END_MARKER.as_bytes().to_vec(),
        }
    }
}

impl Markers {
    /// Both patterns must be non-empty. Callers taking user input validate
    /// further (see `config::schema`).
    pub fn new(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Option<Self> {
        let (start, end) = (start.into(), end.into());
        if start.is_empty() || end.is_empty() {
            return None;
        }
        Some(Self { start, end })
    }

    pub fn start(&self) -> &[u8] {
        &self.start
    }

    pub fn end(&self) -> &[u8] {
        &self.end
    }

    fn pattern(&self, which: MarkerKind) -> &[u8] {
        match which {
            MarkerKind::Start => &self.start,
            MarkerKind::End => &self.end,
        }
    }

    fn not_found(&self, which: MarkerKind) -> PatchError {
        PatchError::MarkerNotFound {
            which,
            marker: String::from_utf8_lossy(self.pattern(which)).into_owned(),
        }
    }
}

/// Half-open byte range `[start, end)` of the region inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerSpan {
    pub start: usize,
    pub end: usize,
}

impl MarkerSpan {
    /// Capacity of the region in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub(crate) fn check(&self, image_len: usize) -> Result<(), PatchError> {
        if self.start > self.end || self.end > image_len {
            return Err(PatchError::SpanOutOfBounds {
                start: self.start,
                end: self.end,
                len: image_len,
            });
        }
        Ok(())
    }
}

/// Locate the region in one forward pass over `image`.
///
/// The first occurrence of each marker wins. The end marker is only looked
/// for once the start marker has been found, so an end marker that precedes
/// the start marker is ignored. A candidate first byte too close to the end
/// of the image to hold the whole pattern is a [`PatchError::TruncatedMarker`].
pub fn scan(image: &[u8], markers: &Markers) -> Result<MarkerSpan, PatchError> {
    let mut start = None;
    let mut i = 0;

    while i < image.len() {
        let which = if start.is_none() {
            MarkerKind::Start
        } else {
            MarkerKind::End
        };
        let pattern = markers.pattern(which);

        if image[i] != pattern[0] {
            i += 1;
            continue;
        }

        if i + pattern.len() > image.len() {
            return Err(PatchError::TruncatedMarker {
                which,
                offset: i,
                len: image.len(),
            });
        }

        if &image[i..i + pattern.len()] != pattern {
            i += 1;
            continue;
        }

        match which {
            MarkerKind::Start => {
                let region_start = (i + pattern.len() + SEPARATOR_LEN).min(image.len());
                start = Some(region_start);
                // The end marker may begin right where the region does.
                i = region_start;
            }
            MarkerKind::End => {
                let start = start.unwrap_or(i);
                return Ok(MarkerSpan { start, end: i });
            }
        }
    }

    Err(markers.not_found(match start {
        None => MarkerKind::Start,
        Some(_) => MarkerKind::End,
    }))
}

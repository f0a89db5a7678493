//! Region Patcher: rewrite a marker-delimited text field inside a binary image
//!
//! Firmware and kernel images often reserve a fixed-size text field (a boot
//! command line, for instance) between two literal markers. This crate finds
//! that field in a single forward scan and reads or overwrites it without
//! changing the image's length.
//!
//! # Architecture
//!
//! [`Image::load`] reads the whole file. [`scan`] finds the [`MarkerSpan`]
//! between the start and end markers. [`extract_text`] reads the span as a
//! NUL-terminated string and [`patch_text`] blanks it with spaces, copies the
//! new text in and writes the image back.
//!
//! # Safety
//!
//! - Replacement text longer than the span is rejected before anything is touched
//! - Atomic file writes by default (tempfile + fsync + rename)
//! - Optional before-text verification
//! - Idempotent operations
//!
//! # Example
//!
//! ```no_run
//! use region_patcher::{extract_text, patch_text, scan, Image, Markers, OpenMode, PatchOptions};
//!
//! # fn main() -> Result<(), region_patcher::PatchError> {
//! let mut image = Image::load("v4_5_0.krn", OpenMode::ReadWrite)?;
//! let span = scan(image.bytes(), &Markers::default())?;
//! println!("current: {}", extract_text(image.bytes(), span)?);
//!
//! let result = patch_text(&mut image, span, "root=/dev/sda1 rootwait", &PatchOptions::default())?;
//! println!("{result:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod image;
pub mod region;
pub mod scan;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, PatcherConfig};
pub use error::{MarkerKind, PatchError};
pub use image::{Image, OpenMode, WriteMode};
pub use region::{
    extract_text, logical_text, padded, patch_text, text_hash, PatchOptions, PatchResult,
    Verification,
};
pub use scan::{scan, MarkerSpan, Markers};

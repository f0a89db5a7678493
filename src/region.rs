use crate::error::PatchError;
use crate::image::{Image, WriteMode};
use crate::scan::MarkerSpan;
use xxhash_rust::xxh3::xxh3_64;

/// Zeroed bytes allocated past the region when copying it out, so the copy is
/// always NUL-terminated even when the region holds no NUL.
const TEXT_HEADROOM: usize = 8;

/// Byte the region is blanked with before new text is copied in.
pub const PAD_BYTE: u8 = b' ';

/// Verification strategy for the region's current text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of the expected text
    Hash(u64),
}

impl Verification {
    /// Check if the provided text matches the verification criteria.
    ///
    /// Trailing pad bytes are ignored on both sides.
    pub fn matches(&self, text: &str) -> bool {
        let text = logical_text(text);
        match self {
            Verification::ExactMatch(expected) => text == logical_text(expected),
            Verification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Parse a hex xxh3 digest, with or without a `0x` prefix.
    pub fn parse_hash(input: &str) -> Result<Self, std::num::ParseIntError> {
        let digits = input
            .trim()
            .strip_prefix("0x")
            .or_else(|| input.trim().strip_prefix("0X"))
            .unwrap_or(input.trim());
        u64::from_str_radix(digits, 16).map(Verification::Hash)
    }

    fn describe(&self) -> String {
        match self {
            Verification::ExactMatch(text) => format!("{text:?}"),
            Verification::Hash(hash) => format!("xxh3 {hash:016x}"),
        }
    }
}

/// Region text without the blank padding left by an earlier patch.
pub fn logical_text(text: &str) -> &str {
    text.trim_end_matches(PAD_BYTE as char)
}

/// xxh3 digest of a region's logical text, in the form `--expect-hash` accepts.
pub fn text_hash(text: &str) -> String {
    format!("{:016x}", xxh3_64(logical_text(text).as_bytes()))
}

/// Options controlling how [`patch_text`] commits its change.
#[derive(Debug, Clone, Default)]
pub struct PatchOptions {
    pub write_mode: WriteMode,
    /// Put the file's original mtime back after writing.
    pub preserve_mtime: bool,
    /// Patch the in-memory image only.
    pub dry_run: bool,
    pub verify: Option<Verification>,
}

/// Result of patching a region.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "PatchResult should be checked for applied/already-applied"]
pub enum PatchResult {
    /// The image was rewritten on disk
    Applied { bytes_written: usize },
    /// The region already held the new text; nothing was written
    AlreadyApplied,
    /// The in-memory image was patched but not written
    DryRun,
}

/// Copy the region out as text.
///
/// The first NUL ends the text. Bytes that are not valid UTF-8 are replaced.
pub fn extract_text(image: &[u8], span: MarkerSpan) -> Result<String, PatchError> {
    span.check(image.len())?;

    let mut buf = vec![0u8; span.len() + TEXT_HEADROOM];
    buf[..span.len()].copy_from_slice(&image[span.range()]);

    let text_len = buf.iter().position(|&b| b == 0).unwrap_or(span.len());
    Ok(String::from_utf8_lossy(&buf[..text_len]).into_owned())
}

/// Bytes the region holds after writing `new_text` into a region of `capacity` bytes.
pub fn padded(new_text: &[u8], capacity: usize) -> Result<Vec<u8>, PatchError> {
    if new_text.len() > capacity {
        return Err(PatchError::ReplacementTooLarge {
            len: new_text.len(),
            capacity,
        });
    }
    if let Some(offset) = new_text.iter().position(|&b| b == 0) {
        return Err(PatchError::EmbeddedNul { offset });
    }

    let mut bytes = vec![PAD_BYTE; capacity];
    bytes[..new_text.len()].copy_from_slice(new_text);
    Ok(bytes)
}

/// Overwrite the region with `new_text`, blank-padded, and write the image back.
///
/// The image length never changes. Nothing is modified if the text does not
/// fit, contains a NUL, or fails verification. The end marker that closes the
/// region is left intact so the image can be patched again.
pub fn patch_text(
    image: &mut Image,
    span: MarkerSpan,
    new_text: &str,
    options: &PatchOptions,
) -> Result<PatchResult, PatchError> {
    let replacement = padded(new_text.as_bytes(), span.len())?;

    if let Some(verify) = &options.verify {
        let current = extract_text(image.bytes(), span)?;
        if !verify.matches(&current) {
            return Err(PatchError::VerificationFailed {
                expected: verify.describe(),
                found: current,
            });
        }
    }

    let region = image.region_mut(span)?;
    if region == replacement.as_slice() {
        return Ok(PatchResult::AlreadyApplied);
    }
    region.copy_from_slice(&replacement);

    if options.dry_run {
        return Ok(PatchResult::DryRun);
    }

    image.store(options.write_mode)?;
    if options.preserve_mtime {
        image.restore_mtime()?;
    }

    Ok(PatchResult::Applied {
        bytes_written: image.len(),
    })
}

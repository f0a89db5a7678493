use region_patcher::{
    extract_text, patch_text, scan, Image, MarkerKind, Markers, OpenMode, PatchError,
    PatchOptions, PatchResult,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SAMPLE: &[u8] = b"\x00\x00mark.start=1\x00OLDARGS\x00\x00\x00mark.end=1\x00\x00";

fn write_image(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// A larger image: header, a 64-byte reserved field, and trailing code bytes.
fn kernel_with_field(args: &str) -> Vec<u8> {
    let mut image = vec![0x7f, b'E', b'L', b'F', 2, 1, 1, 0];
    image.extend((0u8..200).map(|b| b.wrapping_mul(3) | 1).filter(|b| *b != b'm'));
    image.extend_from_slice(b"mark.start=1\x00");
    let mut field = args.as_bytes().to_vec();
    field.resize(64, 0);
    image.extend_from_slice(&field);
    image.extend_from_slice(b"mark.end=1\x00");
    image.extend(std::iter::repeat(0x90).take(128));
    image
}

fn read_text(path: &Path) -> Result<String, PatchError> {
    let image = Image::load(path, OpenMode::ReadOnly)?;
    let span = scan(image.bytes(), &Markers::default())?;
    extract_text(image.bytes(), span)
}

fn replace_text(path: &Path, text: &str) -> Result<PatchResult, PatchError> {
    let mut image = Image::load(path, OpenMode::ReadWrite)?;
    let span = scan(image.bytes(), &Markers::default())?;
    patch_text(&mut image, span, text, &PatchOptions::default())
}

#[test]
fn test_sample_read_patch_read() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "sample.krn", SAMPLE);

    assert_eq!(read_text(&path).unwrap(), "OLDARGS");

    let result = replace_text(&path, "NEW").unwrap();
    assert!(matches!(result, PatchResult::Applied { .. }));

    let on_disk = fs::read(&path).unwrap();
    assert_eq!(on_disk.len(), SAMPLE.len());
    assert_eq!(read_text(&path).unwrap().trim_end(), "NEW");
}

#[test]
fn test_kernel_cmdline_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "v4_5_0.krn", &kernel_with_field("root=/dev/sda1 rootwait"));
    let original = fs::read(&path).unwrap();

    let cmdline = "root=/dev/sda1 video=gcnfb:tv=auto,nostalgic rootwait loglevel=4";
    assert!(cmdline.len() <= 64);
    let _ = replace_text(&path, cmdline).unwrap();

    let patched = fs::read(&path).unwrap();
    assert_eq!(patched.len(), original.len());

    let span = scan(&patched, &Markers::default()).unwrap();
    assert_eq!(span.len(), 64);
    let text = extract_text(&patched, span).unwrap();
    assert_eq!(text.len(), 64);
    assert!(text.starts_with(cmdline));
    assert!(text[cmdline.len()..].bytes().all(|b| b == b' '));

    // Everything outside the region is untouched
    assert_eq!(&patched[..span.start], &original[..span.start]);
    assert_eq!(&patched[span.end..], &original[span.end..]);
}

#[test]
fn test_shorter_text_blanks_previous_content() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "kernel.krn", &kernel_with_field("console=ttyS0 loglevel=7"));

    let _ = replace_text(&path, "quiet").unwrap();

    let text = read_text(&path).unwrap();
    assert_eq!(text.trim_end(), "quiet");
    assert!(!text.contains("console"));
}

#[test]
fn test_too_large_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "sample.krn", SAMPLE);

    let err = replace_text(&path, "this will never fit in ten bytes").unwrap_err();
    assert!(matches!(
        err,
        PatchError::ReplacementTooLarge { capacity: 10, .. }
    ));
    assert_eq!(fs::read(&path).unwrap(), SAMPLE);
}

#[test]
fn test_truncated_image() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "truncated.krn", b"\x00\x00\x00\x00mark.star");

    let err = read_text(&path).unwrap_err();
    assert!(matches!(
        err,
        PatchError::TruncatedMarker {
            which: MarkerKind::Start,
            ..
        }
    ));

    let err = replace_text(&path, "NEW").unwrap_err();
    assert!(matches!(err, PatchError::TruncatedMarker { .. }));
    assert_eq!(fs::read(&path).unwrap(), b"\x00\x00\x00\x00mark.star");
}

#[test]
fn test_zero_length_file() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "empty.krn", b"");

    let err = read_text(&path).unwrap_err();
    assert!(matches!(
        err,
        PatchError::MarkerNotFound {
            which: MarkerKind::Start,
            ..
        }
    ));
}

#[test]
fn test_missing_end_marker() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "noend.krn", b"\x00mark.start=1\x00args\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00");

    let err = replace_text(&path, "x").unwrap_err();
    assert!(matches!(
        err,
        PatchError::MarkerNotFound {
            which: MarkerKind::End,
            ..
        }
    ));
    assert_eq!(err.to_string(), "failed to find end marker \"mark.end=1\"");
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = read_text(&dir.path().join("nope.krn")).unwrap_err();
    assert!(err.is_io());
}

#[test]
fn test_repatching_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write_image(&dir, "sample.krn", SAMPLE);

    assert!(matches!(
        replace_text(&path, "NEW").unwrap(),
        PatchResult::Applied { .. }
    ));
    let after_first = fs::read(&path).unwrap();

    assert_eq!(replace_text(&path, "NEW").unwrap(), PatchResult::AlreadyApplied);
    assert_eq!(fs::read(&path).unwrap(), after_first);

    assert!(matches!(
        replace_text(&path, "OTHER").unwrap(),
        PatchResult::Applied { .. }
    ));
    assert_eq!(read_text(&path).unwrap().trim_end(), "OTHER");
}

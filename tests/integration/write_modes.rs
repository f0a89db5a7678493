use filetime::FileTime;
use region_patcher::{
    extract_text, patch_text, scan, Image, Markers, OpenMode, PatchOptions, PatchResult,
    Verification, WriteMode,
};
use std::fs;
use tempfile::TempDir;

const SAMPLE: &[u8] = b"\x00\x00mark.start=1\x00OLDARGS\x00\x00\x00mark.end=1\x00\x00";

fn patch_with(path: &std::path::Path, text: &str, options: &PatchOptions) -> PatchResult {
    let mut image = Image::load(path, OpenMode::ReadWrite).unwrap();
    let span = scan(image.bytes(), &Markers::default()).unwrap();
    patch_text(&mut image, span, text, options).unwrap()
}

#[test]
fn test_in_place_write() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kernel.krn");
    fs::write(&path, SAMPLE).unwrap();

    let options = PatchOptions {
        write_mode: WriteMode::InPlace,
        ..PatchOptions::default()
    };
    let _ = patch_with(&path, "NEW", &options);

    let on_disk = fs::read(&path).unwrap();
    assert_eq!(on_disk.len(), SAMPLE.len());
    let span = scan(&on_disk, &Markers::default()).unwrap();
    assert_eq!(extract_text(&on_disk, span).unwrap().trim_end(), "NEW");
}

#[test]
#[cfg(unix)]
fn test_in_place_write_keeps_hard_links() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kernel.krn");
    let link = dir.path().join("boot.krn");
    fs::write(&path, SAMPLE).unwrap();
    fs::hard_link(&path, &link).unwrap();

    let options = PatchOptions {
        write_mode: WriteMode::InPlace,
        ..PatchOptions::default()
    };
    let _ = patch_with(&path, "LINKED", &options);

    // Same inode, so the other name sees the patch too
    assert_eq!(fs::read(&link).unwrap(), fs::read(&path).unwrap());
}

#[test]
#[cfg(unix)]
fn test_atomic_write_replaces_inode() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kernel.krn");
    let link = dir.path().join("boot.krn");
    fs::write(&path, SAMPLE).unwrap();
    fs::hard_link(&path, &link).unwrap();

    let _ = patch_with(&path, "ATOMIC", &PatchOptions::default());

    assert_eq!(fs::read(&link).unwrap(), SAMPLE);
    assert_ne!(fs::read(&path).unwrap(), SAMPLE);
}

#[test]
#[cfg(unix)]
fn test_atomic_write_through_symlink() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("vmlinuz-4.5");
    let link = dir.path().join("vmlinuz");
    fs::write(&target, SAMPLE).unwrap();
    std::os::unix::fs::symlink(&target, &link).unwrap();

    let _ = patch_with(&link, "NEW", &PatchOptions::default());

    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert_eq!(fs::read_link(&link).unwrap(), target);

    let on_disk = fs::read(&target).unwrap();
    assert_eq!(on_disk.len(), SAMPLE.len());
    let span = scan(&on_disk, &Markers::default()).unwrap();
    assert_eq!(extract_text(&on_disk, span).unwrap().trim_end(), "NEW");
    assert_eq!(fs::read(&link).unwrap(), on_disk);
}

#[test]
fn test_preserve_mtime() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kernel.krn");
    fs::write(&path, SAMPLE).unwrap();
    let stamp = FileTime::from_unix_time(1_500_000_000, 0);
    filetime::set_file_mtime(&path, stamp).unwrap();

    let options = PatchOptions {
        preserve_mtime: true,
        ..PatchOptions::default()
    };
    let _ = patch_with(&path, "NEW", &options);

    let metadata = fs::metadata(&path).unwrap();
    assert_eq!(FileTime::from_last_modification_time(&metadata), stamp);
}

#[test]
fn test_verified_patch_by_hash() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kernel.krn");
    fs::write(&path, SAMPLE).unwrap();

    let hash = region_patcher::text_hash("OLDARGS");
    let options = PatchOptions {
        verify: Some(Verification::parse_hash(&hash).unwrap()),
        ..PatchOptions::default()
    };
    assert!(matches!(
        patch_with(&path, "NEW", &options),
        PatchResult::Applied { .. }
    ));

    // The text changed, so the same expectation now fails
    let mut image = Image::load(&path, OpenMode::ReadWrite).unwrap();
    let span = scan(image.bytes(), &Markers::default()).unwrap();
    let err = patch_text(&mut image, span, "OTHER", &options).unwrap_err();
    assert!(matches!(
        err,
        region_patcher::PatchError::VerificationFailed { .. }
    ));
}

//! Loading an image file into memory and writing it back.
//!
//! An [`Image`] owns both the byte buffer and the file handle it was read
//! from; dropping it releases both on every path, including early error
//! returns.

use crate::error::PatchError;
use crate::scan::MarkerSpan;
use filetime::FileTime;
use serde::Deserialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// How the image file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

impl OpenMode {
    fn describe(self) -> &'static str {
        match self {
            OpenMode::ReadOnly => "open read-only",
            OpenMode::ReadWrite => "open read-write",
        }
    }
}

/// How a patched image is written back to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// Temp file in the same directory, fsync, rename over the target.
    #[default]
    Atomic,
    /// Overwrite the open file from offset 0. A crash mid-write leaves a torn image.
    InPlace,
}

/// In-memory copy of an image file's full contents.
#[derive(Debug)]
pub struct Image {
    path: PathBuf,
    bytes: Vec<u8>,
    /// `None` after an atomic store replaced the file it pointed at.
    file: Option<File>,
    mode: OpenMode,
    mtime: FileTime,
}

impl Image {
    /// Open `path` and read it completely.
    ///
    /// A read that returns fewer bytes than the file's reported size is an
    /// error, never a truncated image.
    pub fn load(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self, PatchError> {
        let path = path.as_ref();
        let mut file = open(path, mode)?;

        let metadata = file
            .metadata()
            .map_err(|e| PatchError::io("stat", path, e))?;
        let size = usize::try_from(metadata.len()).map_err(|_| PatchError::Alloc {
            path: path.to_path_buf(),
            size: usize::MAX,
        })?;

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|_| PatchError::Alloc {
                path: path.to_path_buf(),
                size,
            })?;
        bytes.resize(size, 0);

        let actual = read_full(&mut file, &mut bytes).map_err(|e| PatchError::io("read", path, e))?;
        if actual != size {
            return Err(PatchError::ShortRead {
                path: path.to_path_buf(),
                expected: size,
                actual,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            file: Some(file),
            mode,
            mtime: FileTime::from_last_modification_time(&metadata),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Raw bytes of `span`.
    pub fn region(&self, span: MarkerSpan) -> Result<&[u8], PatchError> {
        span.check(self.len())?;
        Ok(&self.bytes[span.range()])
    }

    pub(crate) fn region_mut(&mut self, span: MarkerSpan) -> Result<&mut [u8], PatchError> {
        span.check(self.len())?;
        Ok(&mut self.bytes[span.range()])
    }

    /// Write the whole buffer back over the file. The length never changes.
    pub fn store(&mut self, mode: WriteMode) -> Result<(), PatchError> {
        if self.mode != OpenMode::ReadWrite {
            return Err(PatchError::io(
                "write",
                &self.path,
                io::Error::new(io::ErrorKind::PermissionDenied, "image was opened read-only"),
            ));
        }

        match mode {
            WriteMode::InPlace => self.write_in_place(),
            WriteMode::Atomic => {
                // Rename over the link target, not the link itself.
                let target = fs::canonicalize(&self.path)
                    .map_err(|e| PatchError::io("resolve", &self.path, e))?;
                atomic_write(&target, &self.bytes)?;
                // The old handle points at the replaced inode; reopened on next in-place store.
                self.file = None;
                Ok(())
            }
        }
    }

    /// Restore the modification time the file had when it was loaded.
    pub fn restore_mtime(&self) -> Result<(), PatchError> {
        filetime::set_file_mtime(&self.path, self.mtime)
            .map_err(|e| PatchError::io("set mtime on", &self.path, e))
    }

    fn write_in_place(&mut self) -> Result<(), PatchError> {
        let path = &self.path;
        let file = match &mut self.file {
            Some(file) => file,
            slot => slot.insert(open(path, self.mode)?),
        };
        file.seek(SeekFrom::Start(0))
            .map_err(|e| PatchError::io("seek", path, e))?;

        let written = write_full(file, &self.bytes).map_err(|e| PatchError::io("write", path, e))?;
        if written != self.bytes.len() {
            return Err(PatchError::ShortWrite {
                path: path.clone(),
                expected: self.bytes.len(),
                actual: written,
            });
        }

        file.sync_all()
            .map_err(|e| PatchError::io("sync", path, e))
    }
}

fn open(path: &Path, mode: OpenMode) -> Result<File, PatchError> {
    let result = match mode {
        OpenMode::ReadOnly => File::open(path),
        OpenMode::ReadWrite => OpenOptions::new().read(true).write(true).open(path),
    };
    result.map_err(|e| PatchError::io(mode.describe(), path, e))
}

/// Read until `buf` is full or EOF; returns the byte count actually read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Write until `buf` is drained or the writer stops accepting bytes.
fn write_full(writer: &mut impl Write, buf: &[u8]) -> io::Result<usize> {
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]) {
            Ok(0) => break,
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(written)
}

/// Atomic file write: tempfile + fsync + rename.
///
/// The temp file takes over the original's permissions before it replaces it.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), PatchError> {
    // Create tempfile in same directory to ensure same filesystem
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let permissions = fs::metadata(path)
        .map_err(|e| PatchError::io("stat", path, e))?
        .permissions();

    let mut temp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| PatchError::io("create temp file for", path, e))?;

    let written = write_full(temp.as_file_mut(), content).map_err(|e| PatchError::io("write", temp.path(), e))?;
    if written != content.len() {
        return Err(PatchError::ShortWrite {
            path: temp.path().to_path_buf(),
            expected: content.len(),
            actual: written,
        });
    }

    temp.as_file()
        .set_permissions(permissions)
        .map_err(|e| PatchError::io("set permissions on", temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| PatchError::io("sync", temp.path(), e))?;

    temp.persist(path)
        .map_err(|e| PatchError::io("replace", path, e.error))?;

    Ok(())
}

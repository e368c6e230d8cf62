//! Filesystem capability abstraction (DESIGN NOTES §9, SPEC_FULL.md §4.6).
//!
//! Every worker operates through `&dyn Fs` instead of calling `std::fs`
//! directly, so Mover/Uploader/Purger/Scanner decision logic can be unit
//! tested against an in-memory tree without touching disk.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

mod mem;
mod os;

pub use mem::MemFs;
pub use os::OsFs;

/// Metadata `Fs` implementations must be able to report for a path.
#[derive(Debug, Clone, Copy)]
pub struct FileMeta {
    pub len: u64,
    pub modified: SystemTime,
    pub is_file: bool,
    pub is_dir: bool,
}

/// A single entry returned from `Fs::read_dir`.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub path: PathBuf,
    pub meta: FileMeta,
}

/// Bag of filesystem operations the core depends on, real or simulated.
pub trait Fs: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn metadata(&self, path: &Path) -> io::Result<FileMeta>;
    /// Resolve symlinks and `..` the way `std::fs::canonicalize` does, used
    /// by the Mover to validate a path is really inside `source`.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Same-device atomic rename. Implementations that can't tell devices
    /// apart (e.g. `MemFs`) always treat this as available.
    fn same_device(&self, a: &Path, b: &Path) -> io::Result<bool>;
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;
    fn create_append(&self, path: &Path) -> io::Result<()>;
    fn write_new(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// Move `from` to `to`, preferring an OS rename and falling back to
/// copy-then-delete when the two paths live on different devices. Shared by
/// the Mover (source → worker) and the Uploader (worker → uploaded/dead_letter)
/// per spec.md §4.3 step 4 / §4.4.
pub fn rename_or_copy(fs: &dyn Fs, from: &Path, to: &Path) -> io::Result<()> {
    let same_device = fs.same_device(from, to).unwrap_or(false);
    if same_device {
        match fs.rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    } else {
        match fs.copy(from, to) {
            Ok(_) => fs.remove_file(from).or_else(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    Ok(())
                } else {
                    Err(e)
                }
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Find a free destination name for `filename` inside `dest_dir`, trying
/// `stem.ext`, `stem-1.ext`, `stem-2.ext`, ... up to `limit` (spec.md §4.3
/// step 3). Returns `None` if every candidate up to the limit is taken.
pub fn find_available_destination(
    fs: &dyn Fs,
    dest_dir: &Path,
    filename: &Path,
    limit: usize,
) -> Option<PathBuf> {
    let stem = filename.file_stem().unwrap_or_default().to_string_lossy().to_string();
    let ext = filename.extension().map(|e| e.to_string_lossy().to_string());

    let candidate = dest_dir.join(filename);
    if !fs.exists(&candidate) {
        return Some(candidate);
    }

    for n in 1..=limit {
        let name = match &ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        let candidate = dest_dir.join(name);
        if !fs.exists(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Lock-guarded byte buffer registered under a path, used by `MemFs`'s
/// `open_read` to hand back an owned reader without borrowing the tree.
pub(crate) struct Cursor {
    data: Vec<u8>,
    pos: usize,
}

impl Read for Cursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Cursor {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

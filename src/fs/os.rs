//! Real, OS-backed `Fs` implementation.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use super::{DirEntry, FileMeta, Fs};

#[derive(Debug, Default, Clone, Copy)]
pub struct OsFs;

impl OsFs {
    pub fn new() -> Self {
        Self
    }
}

fn meta_from(m: fs::Metadata) -> FileMeta {
    FileMeta {
        len: m.len(),
        modified: m.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
        is_file: m.is_file(),
        is_dir: m.is_dir(),
    }
}

impl Fs for OsFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        fs::metadata(path).map(meta_from)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let meta = match entry.metadata() {
                Ok(m) => meta_from(m),
                Err(_) => continue,
            };
            out.push(DirEntry {
                path: entry.path(),
                meta,
            });
        }
        Ok(out)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn same_device(&self, a: &Path, b: &Path) -> io::Result<bool> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let a_dev = a
                .parent()
                .map(fs::metadata)
                .transpose()?
                .map(|m| m.dev());
            let b_dev = b
                .parent()
                .map(fs::metadata)
                .transpose()?
                .map(|m| m.dev());
            Ok(a_dev.is_some() && a_dev == b_dev)
        }
        #[cfg(not(unix))]
        {
            let _ = (a, b);
            Ok(true)
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        fs::copy(from, to)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(fs::File::open(path)?))
    }

    fn create_append(&self, path: &Path) -> io::Result<()> {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(())
    }

    fn write_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }
}

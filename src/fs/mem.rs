//! In-memory `Fs` implementation used by unit tests.

use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use super::{Cursor, DirEntry, FileMeta, Fs};

#[derive(Debug, Clone)]
struct Node {
    data: Vec<u8>,
    modified: SystemTime,
    is_dir: bool,
}

/// A small in-memory filesystem tree, keyed by normalized path. Good enough
/// to drive the Mover/Uploader/Scanner/Purger decision logic without a temp
/// directory; see `examples/original_source` unit tests for the behavior
/// this mirrors (a fake `FS` capability object).
#[derive(Default)]
pub struct MemFs {
    nodes: Mutex<HashMap<PathBuf, Node>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mkdir(&self, path: &Path) {
        self.nodes.lock().unwrap().insert(
            path.to_path_buf(),
            Node {
                data: Vec::new(),
                modified: SystemTime::now(),
                is_dir: true,
            },
        );
    }

    pub fn write_file(&self, path: &Path, data: &[u8], modified: SystemTime) {
        self.nodes.lock().unwrap().insert(
            path.to_path_buf(),
            Node {
                data: data.to_vec(),
                modified,
                is_dir: false,
            },
        );
    }

    pub fn set_modified(&self, path: &Path, modified: SystemTime) {
        if let Some(node) = self.nodes.lock().unwrap().get_mut(path) {
            node.modified = modified;
        }
    }

    pub fn read_file(&self, path: &Path) -> Option<Vec<u8>> {
        self.nodes.lock().unwrap().get(path).map(|n| n.data.clone())
    }
}

impl Fs for MemFs {
    fn exists(&self, path: &Path) -> bool {
        self.nodes.lock().unwrap().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.nodes
            .lock()
            .unwrap()
            .get(path)
            .map(|n| n.is_dir)
            .unwrap_or(false)
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let nodes = self.nodes.lock().unwrap();
        let node = nodes
            .get(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not found"))?;
        Ok(FileMeta {
            len: node.data.len() as u64,
            modified: node.modified,
            is_file: !node.is_dir,
            is_dir: node.is_dir,
        })
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        if self.exists(path) {
            Ok(path.to_path_buf())
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "not found"))
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let nodes = self.nodes.lock().unwrap();
        let mut out = Vec::new();
        for (candidate, node) in nodes.iter() {
            if candidate.parent() == Some(path) {
                out.push(DirEntry {
                    path: candidate.clone(),
                    meta: FileMeta {
                        len: node.data.len() as u64,
                        modified: node.modified,
                        is_file: !node.is_dir,
                        is_dir: node.is_dir,
                    },
                });
            }
        }
        Ok(out)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut cur = PathBuf::new();
        for component in path.components() {
            cur.push(component);
            self.nodes.lock().unwrap().entry(cur.clone()).or_insert(Node {
                data: Vec::new(),
                modified: SystemTime::now(),
                is_dir: true,
            });
        }
        Ok(())
    }

    fn same_device(&self, _a: &Path, _b: &Path) -> io::Result<bool> {
        Ok(true)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes
            .remove(from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not found"))?;
        nodes.insert(to.to_path_buf(), node);
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes
            .get(from)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not found"))?
            .clone();
        let len = node.data.len() as u64;
        nodes.insert(to.to_path_buf(), node);
        Ok(len)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.nodes
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not found"))
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        let data = self
            .nodes
            .lock()
            .unwrap()
            .get(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not found"))?
            .data
            .clone();
        Ok(Box::new(Cursor::new(data)))
    }

    fn create_append(&self, path: &Path) -> io::Result<()> {
        self.nodes
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_insert(Node {
                data: Vec::new(),
                modified: SystemTime::now(),
                is_dir: false,
            });
        Ok(())
    }

    fn write_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.nodes.lock().unwrap().insert(
            path.to_path_buf(),
            Node {
                data: contents.to_vec(),
                modified: SystemTime::now(),
                is_dir: false,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let fs = MemFs::new();
        fs.write_file(Path::new("/a/b.txt"), b"hello", SystemTime::now());
        assert!(fs.exists(Path::new("/a/b.txt")));
        let mut reader = fs.open_read(Path::new("/a/b.txt")).unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello");
    }

    #[test]
    fn rename_moves_node() {
        let fs = MemFs::new();
        fs.write_file(Path::new("/a/b.txt"), b"x", SystemTime::now());
        fs.rename(Path::new("/a/b.txt"), Path::new("/c/b.txt")).unwrap();
        assert!(!fs.exists(Path::new("/a/b.txt")));
        assert!(fs.exists(Path::new("/c/b.txt")));
    }
}

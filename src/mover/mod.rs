//! Mover worker: relocates dequeued paths from `source` into `worker`
//! (spec.md §4.3).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use tracing::{error, warn};

use crate::error::MoverError;
use crate::fs::{find_available_destination, rename_or_copy, Fs};
use crate::queue::MoveQueue;
use crate::shutdown::ShutdownSignal;

const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(500);
const COLLISION_LIMIT: usize = 1000;

pub struct Mover {
    fs: Arc<dyn Fs>,
    queue: MoveQueue,
    shutdown: ShutdownSignal,
    source_dir: PathBuf,
    worker_dir: PathBuf,
}

impl Mover {
    pub fn new(
        fs: Arc<dyn Fs>,
        queue: MoveQueue,
        shutdown: ShutdownSignal,
        source_dir: PathBuf,
        worker_dir: PathBuf,
    ) -> Self {
        Self {
            fs,
            queue,
            shutdown,
            source_dir,
            worker_dir,
        }
    }

    pub fn run(&self) {
        while !self.shutdown.is_triggered() {
            match self.queue.try_get(DEQUEUE_TIMEOUT) {
                Ok(path) => self.handle_one(&path),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    /// Handle a single dequeued path synchronously; `run` is the polling loop
    /// that calls this, and integration tests drive it directly.
    pub fn handle_one(&self, path: &Path) {
        if let Err(reason) = self.validate(path) {
            warn!(path = %path.display(), %reason, "mover dropping path");
            return;
        }

        let filename = match path.file_name() {
            Some(name) => PathBuf::from(name),
            None => {
                warn!(path = %path.display(), "mover dropping path: no filename");
                return;
            }
        };

        let dest = match find_available_destination(
            self.fs.as_ref(),
            &self.worker_dir,
            &filename,
            COLLISION_LIMIT,
        ) {
            Some(dest) => dest,
            None => {
                error!(
                    path = %path.display(),
                    limit = COLLISION_LIMIT,
                    "mover exhausted destination collision search, dropping path"
                );
                return;
            }
        };

        match rename_or_copy(self.fs.as_ref(), path, &dest) {
            Ok(()) => {}
            Err(e) => {
                error!(path = %path.display(), dest = %dest.display(), error = %e, "mover failed to relocate path");
            }
        }
    }

    /// Path must resolve inside `source_dir`, exist, and be a regular file.
    fn validate(&self, path: &Path) -> Result<(), MoverError> {
        let canonical = self
            .fs
            .canonicalize(path)
            .map_err(|_| MoverError::Vanished)?;
        let canonical_source = self
            .fs
            .canonicalize(&self.source_dir)
            .map_err(MoverError::Io)?;
        if canonical.parent() != Some(canonical_source.as_path()) {
            return Err(MoverError::PathOutsideSource(path.display().to_string()));
        }
        let meta = self.fs.metadata(&canonical).map_err(MoverError::Io)?;
        if !meta.is_file {
            return Err(MoverError::NotRegularFile(path.display().to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;
    use std::time::SystemTime;

    fn setup() -> (Arc<MemFs>, PathBuf, PathBuf) {
        let fs = Arc::new(MemFs::new());
        let source = PathBuf::from("/data/source");
        let worker = PathBuf::from("/data/worker");
        fs.mkdir(&source);
        fs.mkdir(&worker);
        (fs, source, worker)
    }

    #[test]
    fn moves_file_into_worker_directory() {
        let (fs, source, worker) = setup();
        fs.write_file(&source.join("a.pcap"), b"data", SystemTime::now());

        let queue = MoveQueue::bounded(8);
        let mover = Mover::new(
            fs.clone(),
            queue.clone(),
            ShutdownSignal::new(),
            source.clone(),
            worker.clone(),
        );
        queue.put(source.join("a.pcap")).unwrap();
        mover.handle_one(&source.join("a.pcap"));

        assert!(!fs.exists(&source.join("a.pcap")));
        assert!(fs.exists(&worker.join("a.pcap")));
    }

    #[test]
    fn resolves_name_collision_with_numeric_suffix() {
        let (fs, source, worker) = setup();
        fs.write_file(&source.join("a.pcap"), b"new", SystemTime::now());
        fs.write_file(&worker.join("a.pcap"), b"old", SystemTime::now());

        let queue = MoveQueue::bounded(8);
        let mover = Mover::new(fs.clone(), queue, ShutdownSignal::new(), source.clone(), worker.clone());
        mover.handle_one(&source.join("a.pcap"));

        assert!(fs.exists(&worker.join("a-1.pcap")));
        assert_eq!(fs.read_file(&worker.join("a.pcap")).unwrap(), b"old");
    }

    #[test]
    fn drops_path_outside_source_directory() {
        let (fs, source, worker) = setup();
        fs.mkdir(&PathBuf::from("/data/other"));
        fs.write_file(&PathBuf::from("/data/other/evil.pcap"), b"x", SystemTime::now());

        let queue = MoveQueue::bounded(8);
        let mover = Mover::new(fs.clone(), queue, ShutdownSignal::new(), source, worker.clone());
        mover.handle_one(&PathBuf::from("/data/other/evil.pcap"));

        assert!(!fs.exists(&worker.join("evil.pcap")));
    }

    #[test]
    fn missing_file_is_dropped_without_panic() {
        let (fs, source, worker) = setup();
        let queue = MoveQueue::bounded(8);
        let mover = Mover::new(fs, queue, ShutdownSignal::new(), source.clone(), worker);
        mover.handle_one(&source.join("ghost.pcap"));
    }
}

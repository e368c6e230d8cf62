//! Bounded work queues shared between workers (spec.md §5).
//!
//! Backed by `crossbeam-channel` rather than an async `mpsc`: every worker in
//! this design is a blocking OS thread, so a synchronous bounded channel is
//! the natural fit. `recv_timeout` doubles as the shutdown poll point.

use std::path::PathBuf;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendError, Sender};

use crate::types::TailerEvent;

/// Filepaths handed from Tailer/Scanner to the Mover, and from the Mover on
/// to nothing further (the Uploader discovers work by scanning `worker/`).
#[derive(Clone)]
pub struct MoveQueue {
    tx: Sender<PathBuf>,
    rx: Receiver<PathBuf>,
}

impl MoveQueue {
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx }
    }

    /// Blocks until there's room or the queue is disconnected.
    pub fn put(&self, path: PathBuf) -> Result<(), SendError<PathBuf>> {
        self.tx.send(path)
    }

    pub fn try_get(&self, timeout: Duration) -> Result<PathBuf, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Raw filesystem-change notifications from the watcher thread to the
/// single-threaded Tailer consumer (spec.md §4.1).
#[derive(Clone)]
pub struct TailerEventQueue {
    tx: Sender<TailerEvent>,
    rx: Receiver<TailerEvent>,
}

impl TailerEventQueue {
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx }
    }

    pub fn put(&self, event: TailerEvent) -> Result<(), SendError<TailerEvent>> {
        self.tx.send(event)
    }

    pub fn try_get(&self, timeout: Duration) -> Result<TailerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_queue_roundtrips() {
        let q = MoveQueue::bounded(4);
        q.put(PathBuf::from("/a/b.csv")).unwrap();
        assert_eq!(q.len(), 1);
        let got = q.try_get(Duration::from_millis(10)).unwrap();
        assert_eq!(got, PathBuf::from("/a/b.csv"));
    }

    #[test]
    fn move_queue_times_out_when_empty() {
        let q = MoveQueue::bounded(4);
        assert!(matches!(
            q.try_get(Duration::from_millis(10)),
            Err(RecvTimeoutError::Timeout)
        ));
    }
}

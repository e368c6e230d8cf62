//! Tailer worker: turns an append-only CSV manifest into MoveQueue entries
//! (spec.md §4.1).
//!
//! Split into a watcher thread (raw `notify` events, no debouncing — the
//! full Created/Modified/Deleted/Moved granularity is load-bearing here,
//! see SPEC_FULL.md §4.1) and a single-threaded consumer that owns all
//! mutable tail state.

pub mod parser;

use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{error, warn};

use crate::error::TailerError;
use crate::fs::Fs;
use crate::queue::{MoveQueue, TailerEventQueue};
use crate::shutdown::ShutdownSignal;
use crate::types::{PerFileTailState, TailerEvent};

const WATCH_POLL: Duration = Duration::from_millis(200);
const EVENT_POLL: Duration = Duration::from_millis(500);

/// Spawn the watcher thread; events flow into `events` until `shutdown` is
/// triggered. Only events on direct children of `csv_dir` matching
/// `extension` are forwarded.
pub fn spawn_watcher(
    csv_dir: PathBuf,
    extension: String,
    events: TailerEventQueue,
    shutdown: ShutdownSignal,
) -> Result<thread::JoinHandle<()>, TailerError> {
    if !csv_dir.exists() {
        return Err(TailerError::PathNotFound(csv_dir.display().to_string()));
    }

    let (tx, rx) = std_mpsc::channel();
    let mut watcher: RecommendedWatcher =
        notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
    watcher.watch(&csv_dir, RecursiveMode::NonRecursive)?;

    Ok(thread::spawn(move || {
        let _watcher = watcher; // keep alive for the thread's lifetime
        while !shutdown.is_triggered() {
            match rx.recv_timeout(WATCH_POLL) {
                Ok(Ok(event)) => {
                    for tevent in translate(&event, &csv_dir, &extension) {
                        if events.put(tevent).is_err() {
                            return;
                        }
                    }
                }
                Ok(Err(e)) => warn!(error = %e, "tailer watch error"),
                Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std_mpsc::RecvTimeoutError::Disconnected) => return,
            }
        }
    }))
}

fn matches(path: &Path, dir: &Path, extension: &str) -> bool {
    path.parent() == Some(dir)
        && path
            .extension()
            .map(|e| e.eq_ignore_ascii_case(extension))
            .unwrap_or(false)
}

fn translate(event: &notify::Event, dir: &Path, extension: &str) -> Vec<TailerEvent> {
    let mut out = Vec::new();
    match &event.kind {
        EventKind::Create(_) => {
            for path in &event.paths {
                if matches(path, dir, extension) {
                    out.push(TailerEvent::Created(path.clone()));
                }
            }
        }
        EventKind::Modify(notify::event::ModifyKind::Name(_)) if event.paths.len() == 2 => {
            let src = &event.paths[0];
            let dst = &event.paths[1];
            out.push(TailerEvent::Moved {
                src: src.clone(),
                dst: dst.clone(),
            });
        }
        EventKind::Modify(_) => {
            for path in &event.paths {
                if matches(path, dir, extension) {
                    out.push(TailerEvent::Modified(path.clone()));
                }
            }
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                if matches(path, dir, extension) {
                    out.push(TailerEvent::Deleted(path.clone()));
                }
            }
        }
        _ => {}
    }
    out
}

pub struct Tailer {
    fs: Arc<dyn Fs>,
    move_queue: MoveQueue,
    csv_dir: PathBuf,
    extension: String,
    state: PerFileTailState,
}

impl Tailer {
    pub fn new(fs: Arc<dyn Fs>, move_queue: MoveQueue, csv_dir: PathBuf, extension: String) -> Self {
        Self {
            fs,
            move_queue,
            csv_dir,
            extension,
            state: PerFileTailState::new(),
        }
    }

    /// List all matching files already present in the csv directory and
    /// begin tracking each at end-of-file.
    pub fn boot_scan(&mut self) {
        let entries = match self.fs.read_dir(&self.csv_dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!(dir = %self.csv_dir.display(), error = %e, "tailer boot scan failed");
                return;
            }
        };
        for entry in entries {
            if matches(&entry.path, &self.csv_dir, &self.extension) {
                self.handle_event(TailerEvent::InitialFound(entry.path));
            }
        }
    }

    pub fn run(&mut self, events: &TailerEventQueue, shutdown: &ShutdownSignal) {
        while !shutdown.is_triggered() {
            match events.try_get(EVENT_POLL) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn handle_event(&mut self, event: TailerEvent) {
        match event {
            TailerEvent::InitialFound(path) | TailerEvent::Created(path) => {
                self.begin_tracking_at_eof(&path);
            }
            TailerEvent::Modified(path) => self.handle_modified(&path),
            TailerEvent::Deleted(path) => {
                self.state.untrack(&path);
            }
            TailerEvent::Moved { src, dst } => {
                self.state.untrack(&src);
                if matches(&dst, &self.csv_dir, &self.extension) {
                    self.begin_tracking_at_eof(&dst);
                }
            }
        }
    }

    fn begin_tracking_at_eof(&mut self, path: &Path) {
        match self.fs.metadata(path) {
            Ok(meta) if meta.is_file => {
                self.state.track_at(path.to_path_buf(), meta.len);
            }
            _ => {
                // missing or un-statable: nothing to track yet, a later
                // Modified event will late-sync it.
            }
        }
    }

    fn handle_modified(&mut self, path: &Path) {
        let meta = match self.fs.metadata(path) {
            Ok(meta) => meta,
            Err(_) => return,
        };

        if !self.state.is_tracked(path) {
            // late-sync: no backfill of history we never saw.
            self.state.track_at(path.to_path_buf(), meta.len);
            return;
        }

        // is_tracked just confirmed this key exists.
        let position = *self.state.file_positions.get(path).expect("tracked path has a position");
        if meta.len == position {
            return;
        }
        if meta.len < position {
            self.state.file_positions.insert(path.to_path_buf(), meta.len);
            self.state.file_buffers.insert(path.to_path_buf(), Vec::new());
            return;
        }

        let mut reader = match self.fs.open_read(path) {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "tailer failed to open file for delta read");
                return;
            }
        };

        use std::io::Read;
        // Skip up to the last-read position, then read the delta.
        let mut skip_buf = vec![0u8; position as usize];
        if let Err(e) = reader.read_exact(&mut skip_buf) {
            warn!(path = %path.display(), error = %e, "tailer failed to seek to tracked position");
            return;
        }
        let mut delta = Vec::new();
        if let Err(e) = reader.read_to_end(&mut delta) {
            warn!(path = %path.display(), error = %e, "tailer failed to read delta");
            return;
        }

        let new_position = position + delta.len() as u64;

        let mut buffer = self.state.file_buffers.remove(path).unwrap_or_default();
        buffer.extend_from_slice(&delta);

        let text = String::from_utf8_lossy(&buffer).into_owned();
        let mut lines: Vec<&str> = text.split('\n').collect();
        let trailing = lines.pop().unwrap_or("").to_string();

        for line in lines {
            if line.is_empty() {
                continue;
            }
            match parser::parse_line(line) {
                Ok(parsed) => {
                    if self.move_queue.put(PathBuf::from(parsed.filepath)).is_err() {
                        warn!("move queue disconnected, tailer stopping enqueue");
                    }
                }
                Err(reason) => warn!(line, %reason, "tailer rejected malformed manifest line"),
            }
        }

        self.state.file_positions.insert(path.to_path_buf(), new_position);
        self.state
            .file_buffers
            .insert(path.to_path_buf(), trailing.into_bytes());
    }
}

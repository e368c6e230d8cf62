//! Core data model shared across workers (spec.md §3).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};

/// One tracked entry in the Scanner's source-directory table.
///
/// Owned exclusively by the Scanner thread; nothing else reads or writes it
/// (spec.md §3 "Ownership and lifecycle").
#[derive(Debug, Clone)]
pub struct FileStateRecord {
    pub path: PathBuf,
    pub size: u64,
    pub mtime_wall: DateTime<Utc>,
    /// Monotonic timestamp when this path was first observed. Never changes
    /// after creation.
    pub first_seen_mono: Instant,
    pub prev_scan_size: u64,
    pub prev_scan_mtime_wall: DateTime<Utc>,
}

impl FileStateRecord {
    pub fn new(path: PathBuf, size: u64, mtime_wall: DateTime<Utc>, now_mono: Instant) -> Self {
        Self {
            path,
            size,
            mtime_wall,
            first_seen_mono: now_mono,
            prev_scan_size: size,
            prev_scan_mtime_wall: mtime_wall,
        }
    }

    /// size or mtime differs from the previous scan.
    pub fn active_since_last_scan(&self) -> bool {
        self.size != self.prev_scan_size || self.mtime_wall != self.prev_scan_mtime_wall
    }
}

/// A filesystem event surfaced by the Tailer's csv-directory watch
/// (spec.md §3 "TailerEvent", DESIGN NOTES §9: sum type over isinstance family).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailerEvent {
    InitialFound(PathBuf),
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Moved { src: PathBuf, dst: PathBuf },
}

/// Per-file tail state owned by the Tailer's consumer thread
/// (spec.md §3 "PerFileTailState").
#[derive(Debug, Default)]
pub struct PerFileTailState {
    pub file_positions: HashMap<PathBuf, u64>,
    pub file_buffers: HashMap<PathBuf, Vec<u8>>,
}

impl PerFileTailState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_at(&mut self, path: PathBuf, position: u64) {
        self.file_positions.insert(path.clone(), position);
        self.file_buffers.insert(path, Vec::new());
    }

    pub fn untrack(&mut self, path: &std::path::Path) {
        self.file_positions.remove(path);
        self.file_buffers.remove(path);
    }

    pub fn is_tracked(&self, path: &std::path::Path) -> bool {
        self.file_positions.contains_key(path)
    }
}

/// A single successfully-parsed manifest line (spec.md §3 "ParsedManifestLine").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedManifestLine {
    pub timestamp: i64,
    pub filepath: String,
    pub sha256: String,
}

/// Outcome of a single file's upload attempt loop (spec.md §4.4).
#[derive(Debug)]
pub enum UploadOutcome {
    /// Uploaded successfully and relocated to `uploaded`.
    Succeeded,
    /// A final, non-retryable classification was reached (4xx, non-retryable
    /// exception, OS error opening/reading the file).
    TerminalFailure { reason: String },
    /// Source vanished before or during the attempt; decisive, do not retry.
    AbortedVanished,
    /// Shutdown requested mid-backoff; non-decisive, file stays in `worker`.
    AbortedShutdown,
    /// Move to `uploaded`/`dead_letter` failed after a decisive outcome;
    /// file stays in `worker` and is added to the critical-failure skip set.
    CriticalMoveFailure,
}

/// `(mtime, size, path)` entries the Purger sorts ascending by mtime
/// (spec.md §3 "PurgerFileEntry").
#[derive(Debug, Clone)]
pub struct PurgerFileEntry {
    pub mtime: DateTime<Utc>,
    pub size: u64,
    pub path: PathBuf,
}

//! Purger worker: keeps `worker` + `uploaded` under the configured disk
//! budget (spec.md §4.5).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::PurgerError;
use crate::fs::Fs;
use crate::shutdown::ShutdownSignal;
use crate::types::PurgerFileEntry;

pub struct PurgerConfig {
    pub worker_dir: PathBuf,
    pub uploaded_dir: PathBuf,
    pub extension: String,
    pub poll_interval: Duration,
    pub target_disk_usage_percent: f64,
    pub total_disk_capacity_bytes: u64,
}

pub struct Purger {
    fs: Arc<dyn Fs>,
    cfg: PurgerConfig,
}

impl Purger {
    pub fn new(fs: Arc<dyn Fs>, cfg: PurgerConfig) -> Self {
        Self { fs, cfg }
    }

    pub fn run(&self, shutdown: &ShutdownSignal) {
        loop {
            if shutdown.wait_timeout(self.cfg.poll_interval) {
                return;
            }
            self.cycle();
        }
    }

    pub fn cycle(&self) {
        let worker = self.scan_sorted(&self.cfg.worker_dir);
        let uploaded = self.scan_sorted(&self.cfg.uploaded_dir);

        let (mut worker, mut uploaded) = match (worker, uploaded) {
            (Err(_), Err(_)) => {
                error!(
                    error = %PurgerError::BothScansFailed {
                        worker: self.cfg.worker_dir.display().to_string(),
                        uploaded: self.cfg.uploaded_dir.display().to_string(),
                    },
                    "purger cycle aborted, both scans failed"
                );
                return;
            }
            (worker, uploaded) => (worker.unwrap_or_default(), uploaded.unwrap_or_default()),
        };
        worker.sort_by_key(|e| e.mtime);
        uploaded.sort_by_key(|e| e.mtime);

        let total_worker: u64 = worker.iter().map(|e| e.size).sum();
        let total_uploaded: u64 = uploaded.iter().map(|e| e.size).sum();
        let current_total = total_worker + total_uploaded;

        let target_keep =
            (self.cfg.target_disk_usage_percent * self.cfg.total_disk_capacity_bytes as f64) as u64;
        let must_delete = current_total.saturating_sub(target_keep);

        if must_delete == 0 {
            info!(
                current_total = %humanize_bytes(current_total),
                target_keep = %humanize_bytes(target_keep),
                "disk usage within target"
            );
            return;
        }

        let keep_in_uploaded = total_uploaded.saturating_sub(must_delete);
        let deleted_from_uploaded = self.delete_until(&uploaded, keep_in_uploaded);

        let remaining_must_delete = must_delete.saturating_sub(deleted_from_uploaded);
        let mut deleted_from_worker = 0u64;
        if remaining_must_delete > 0 {
            let keep_in_worker = total_worker.saturating_sub(remaining_must_delete);
            deleted_from_worker = self.delete_until(&worker, keep_in_worker);
        }

        let freed = deleted_from_uploaded + deleted_from_worker;
        if freed < must_delete {
            warn!(
                deficit = %humanize_bytes(must_delete - freed),
                "purger could not reach target disk usage this cycle"
            );
        }
    }

    fn scan_sorted(&self, dir: &std::path::Path) -> std::io::Result<Vec<PurgerFileEntry>> {
        let entries = self.fs.read_dir(dir)?;
        let mut out = Vec::new();
        for entry in entries {
            if entry
                .path
                .extension()
                .map(|e| e.eq_ignore_ascii_case(&self.cfg.extension))
                .unwrap_or(false)
            {
                out.push(PurgerFileEntry {
                    mtime: chrono::DateTime::<chrono::Utc>::from(entry.meta.modified),
                    size: entry.meta.len,
                    path: entry.path,
                });
            }
        }
        Ok(out)
    }

    /// Delete oldest-first from `entries` until their combined remaining
    /// size is at or below `keep`. Returns total bytes actually freed.
    fn delete_until(&self, entries: &[PurgerFileEntry], keep: u64) -> u64 {
        let mut remaining: u64 = entries.iter().map(|e| e.size).sum();
        let mut freed = 0u64;
        for entry in entries {
            if remaining <= keep {
                break;
            }
            match self.fs.remove_file(&entry.path) {
                Ok(()) => {
                    freed += entry.size;
                    remaining = remaining.saturating_sub(entry.size);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    freed += entry.size;
                    remaining = remaining.saturating_sub(entry.size);
                }
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "purger failed to delete file");
                }
            }
        }
        freed
    }
}

/// Matches the binary-unit, two-decimal-place formatting of the original
/// purger's size reporting (bytes below 1 KiB are reported as a bare count).
pub fn humanize_bytes(size_bytes: u64) -> String {
    if size_bytes < 1024 {
        return format!("{size_bytes} bytes");
    }
    let mut size = size_bytes as f64;
    for unit in ["KB", "MB", "GB", "TB"] {
        size /= 1024.0;
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
    }
    format!("{size:.2} PB")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;
    use std::time::{Duration as StdDuration, SystemTime};

    #[test]
    fn humanize_matches_expected_units() {
        assert_eq!(humanize_bytes(512), "512 bytes");
        assert_eq!(humanize_bytes(1536), "1.50 KB");
        assert_eq!(humanize_bytes(1024 * 1024 * 3), "3.00 MB");
    }

    fn setup() -> (Arc<MemFs>, PathBuf, PathBuf) {
        let fs = Arc::new(MemFs::new());
        let worker = PathBuf::from("/worker");
        let uploaded = PathBuf::from("/uploaded");
        fs.mkdir(&worker);
        fs.mkdir(&uploaded);
        (fs, worker, uploaded)
    }

    fn cfg(worker: PathBuf, uploaded: PathBuf, capacity: u64, target_pct: f64) -> PurgerConfig {
        PurgerConfig {
            worker_dir: worker,
            uploaded_dir: uploaded,
            extension: "pcap".to_string(),
            poll_interval: Duration::from_secs(1),
            target_disk_usage_percent: target_pct,
            total_disk_capacity_bytes: capacity,
        }
    }

    #[test]
    fn no_deletion_when_within_target() {
        let (fs, worker, uploaded) = setup();
        fs.write_file(&worker.join("a.pcap"), &[0u8; 10], SystemTime::now());
        let purger = Purger::new(fs.clone(), cfg(worker.clone(), uploaded, 1_000_000, 0.9));
        purger.cycle();
        assert!(fs.exists(&worker.join("a.pcap")));
    }

    #[test]
    fn deletes_from_uploaded_before_worker() {
        let (fs, worker, uploaded) = setup();
        let old = SystemTime::now() - StdDuration::from_secs(100);
        let newer = SystemTime::now();
        fs.write_file(&uploaded.join("old.pcap"), &[0u8; 100], old);
        fs.write_file(&worker.join("keep.pcap"), &[0u8; 100], newer);

        let purger = Purger::new(fs.clone(), cfg(worker.clone(), uploaded.clone(), 150, 1.0));
        purger.cycle();

        assert!(!fs.exists(&uploaded.join("old.pcap")));
        assert!(fs.exists(&worker.join("keep.pcap")));
    }

    #[test]
    fn deletes_from_worker_when_uploaded_insufficient() {
        let (fs, worker, uploaded) = setup();
        let old = SystemTime::now() - StdDuration::from_secs(100);
        fs.write_file(&worker.join("old.pcap"), &[0u8; 200], old);

        let purger = Purger::new(fs.clone(), cfg(worker.clone(), uploaded, 50, 1.0));
        purger.cycle();

        assert!(!fs.exists(&worker.join("old.pcap")));
    }
}

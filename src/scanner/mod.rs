//! Scanner worker: completeness-independent safety net over the source
//! directory (spec.md §4.2).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::error::ScannerError;
use crate::fs::Fs;
use crate::queue::MoveQueue;
use crate::shutdown::ShutdownSignal;
use crate::types::FileStateRecord;

pub struct ScannerConfig {
    pub source_dir: PathBuf,
    pub csv_restart_dir: PathBuf,
    pub extension: String,
    pub scan_interval: Duration,
    pub stuck_active_timeout: Duration,
    pub lost_timeout: Duration,
}

pub struct Scanner {
    fs: Arc<dyn Fs>,
    queue: MoveQueue,
    cfg: ScannerConfig,
    table: HashMap<PathBuf, FileStateRecord>,
    previously_lost: HashSet<PathBuf>,
    previously_stuck_active: HashSet<PathBuf>,
    previously_signaled_stuck_apps: HashSet<String>,
}

impl Scanner {
    pub fn new(fs: Arc<dyn Fs>, queue: MoveQueue, cfg: ScannerConfig) -> Self {
        Self {
            fs,
            queue,
            cfg,
            table: HashMap::new(),
            previously_lost: HashSet::new(),
            previously_stuck_active: HashSet::new(),
            previously_signaled_stuck_apps: HashSet::new(),
        }
    }

    pub fn run(&mut self, shutdown: &ShutdownSignal) {
        while !shutdown.is_triggered() {
            if let Err(e) = self.cycle() {
                error!(error = %e, "scanner cycle failed fatally, tripping shutdown");
                shutdown.trigger();
                return;
            }
            shutdown.wait_timeout(self.cfg.scan_interval);
        }
    }

    pub fn cycle(&mut self) -> Result<(), ScannerError> {
        let now_mono = Instant::now();
        let now_wall = Utc::now();

        let entries = self.fs.read_dir(&self.cfg.source_dir).map_err(|source| {
            ScannerError::EnumerationFailed {
                path: self.cfg.source_dir.display().to_string(),
                source,
            }
        })?;

        let mut observed = HashSet::new();
        for entry in entries {
            if !matches_ext(&entry.path, &self.cfg.extension) {
                continue;
            }
            let meta = match self.fs.metadata(&entry.path) {
                Ok(m) => m,
                Err(_) => continue,
            };
            observed.insert(entry.path.clone());
            let mtime_wall = system_time_to_utc(meta.modified);

            self.table
                .entry(entry.path.clone())
                .and_modify(|rec| {
                    rec.prev_scan_size = rec.size;
                    rec.prev_scan_mtime_wall = rec.mtime_wall;
                    rec.size = meta.len;
                    rec.mtime_wall = mtime_wall;
                })
                .or_insert_with(|| FileStateRecord::new(entry.path.clone(), meta.len, mtime_wall, now_mono));
        }

        self.table.retain(|path, _| observed.contains(path));

        let mut lost = HashSet::new();
        let mut currently_stuck_active = HashSet::new();
        for (path, rec) in self.table.iter() {
            let active = rec.active_since_last_scan();
            let present_too_long =
                now_mono.duration_since(rec.first_seen_mono) > self.cfg.stuck_active_timeout;
            let is_lost = (now_wall - rec.mtime_wall)
                .to_std()
                .map(|d| d > self.cfg.lost_timeout)
                .unwrap_or(false);

            if is_lost {
                lost.insert(path.clone());
            }
            if active && present_too_long {
                currently_stuck_active.insert(path.clone());
            }
        }

        let newly_lost: Vec<PathBuf> = lost.difference(&self.previously_lost).cloned().collect();
        let newly_stuck_active: Vec<PathBuf> = currently_stuck_active
            .difference(&self.previously_stuck_active)
            .cloned()
            .collect();

        for path in &newly_lost {
            if self.queue.put(path.clone()).is_err() {
                warn!(path = %path.display(), "scanner could not enqueue lost file, move queue disconnected");
            }
        }
        for path in &newly_stuck_active {
            tracing::error!(path = %path.display(), "file stuck active past timeout");
        }

        self.signal_stuck_apps(&currently_stuck_active);

        self.previously_lost = lost;
        self.previously_stuck_active = currently_stuck_active;

        Ok(())
    }

    fn signal_stuck_apps(&mut self, currently_stuck_active: &HashSet<PathBuf>) {
        let mut apps = HashSet::new();
        for path in currently_stuck_active {
            match app_name(path) {
                Some(name) => {
                    apps.insert(name);
                }
                None => warn!(path = %path.display(), "stuck file name does not match app-prefix pattern"),
            }
        }

        for app in apps.difference(&self.previously_signaled_stuck_apps) {
            let restart_path = self.cfg.csv_restart_dir.join(format!("{app}.restart"));
            if let Err(e) = self.fs.create_append(&restart_path) {
                warn!(app, error = %e, "failed to create restart signal file");
            } else {
                info!(app, "restart signal created for stuck application");
            }
        }

        self.previously_signaled_stuck_apps = apps;
    }
}

fn system_time_to_utc(t: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

fn matches_ext(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

fn app_name(path: &Path) -> Option<String> {
    let filename = path.file_name()?.to_str()?;
    let idx = filename.find('-')?;
    if idx == 0 {
        return None;
    }
    Some(filename[..idx].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;
    use std::time::SystemTime;

    fn cfg(dir: PathBuf, restart_dir: PathBuf) -> ScannerConfig {
        ScannerConfig {
            source_dir: dir,
            csv_restart_dir: restart_dir,
            extension: "pcap".to_string(),
            scan_interval: Duration::from_secs(1),
            stuck_active_timeout: Duration::from_secs(100),
            lost_timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn app_name_extracts_prefix_before_first_dash() {
        assert_eq!(
            app_name(Path::new("myapp-123.pcap")),
            Some("myapp".to_string())
        );
        assert_eq!(app_name(Path::new("noappname.pcap")), None);
        assert_eq!(app_name(Path::new("-leadingdash.pcap")), None);
    }

    #[test]
    fn first_cycle_tracks_new_files_without_flagging_lost() {
        let fs = Arc::new(MemFs::new());
        let dir = PathBuf::from("/src");
        let restart = PathBuf::from("/restart");
        fs.mkdir(&dir);
        fs.mkdir(&restart);
        fs.write_file(&dir.join("app-1.pcap"), b"data", SystemTime::now());

        let queue = MoveQueue::bounded(8);
        let mut scanner = Scanner::new(fs, queue.clone(), cfg(dir, restart));
        scanner.cycle().unwrap();

        assert!(queue.try_get(Duration::from_millis(10)).is_err());
        assert_eq!(scanner.table.len(), 1);
    }

    #[test]
    fn removed_file_drops_from_table_without_enqueue() {
        let fs = Arc::new(MemFs::new());
        let dir = PathBuf::from("/src");
        let restart = PathBuf::from("/restart");
        fs.mkdir(&dir);
        fs.mkdir(&restart);
        fs.write_file(&dir.join("app-1.pcap"), b"data", SystemTime::now());

        let queue = MoveQueue::bounded(8);
        let mut scanner = Scanner::new(fs.clone(), queue.clone(), cfg(dir.clone(), restart));
        scanner.cycle().unwrap();

        fs.remove_file(&dir.join("app-1.pcap")).unwrap();
        scanner.cycle().unwrap();

        assert!(scanner.table.is_empty());
        assert!(queue.try_get(Duration::from_millis(10)).is_err());
    }
}

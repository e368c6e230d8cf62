//! Builds every worker from a validated `Config` and runs them as
//! cooperating OS threads until the shutdown signal fires (spec.md §5).

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::{secs, Config};
use crate::fs::{Fs, OsFs};
use crate::http::{HttpClient, ReqwestClient};
use crate::mover::Mover;
use crate::purger::{Purger, PurgerConfig};
use crate::queue::{MoveQueue, TailerEventQueue};
use crate::scanner::{Scanner, ScannerConfig};
use crate::shutdown::ShutdownSignal;
use crate::tailer::{self, Tailer};
use crate::uploader::{Uploader, UploaderConfig};

const JOIN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Supervisor {
    shutdown: ShutdownSignal,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Supervisor {
    pub fn start(config: &Config, shutdown: ShutdownSignal) -> anyhow::Result<Self> {
        let fs: Arc<dyn Fs> = Arc::new(OsFs::new());
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new(config.uploader.verify_ssl)?);

        for dir in [
            &config.directories.csv_dir,
            &config.directories.csv_restart_dir,
            &config.directories.source_dir,
            &config.directories.worker_dir,
            &config.directories.uploaded_dir,
            &config.directories.dead_letter_dir,
        ] {
            fs.create_dir_all(dir)?;
        }

        let move_queue = MoveQueue::bounded(4096);
        let event_queue = TailerEventQueue::bounded(config.tailer.event_queue_capacity);

        let mut handles = Vec::new();

        let watcher_handle = tailer::spawn_watcher(
            config.directories.csv_dir.clone(),
            config.files.csv_extension.clone(),
            event_queue.clone(),
            shutdown.clone(),
        )?;
        handles.push(("tailer-watcher", watcher_handle));

        {
            let fs = fs.clone();
            let move_queue = move_queue.clone();
            let event_queue = event_queue.clone();
            let shutdown = shutdown.clone();
            let csv_dir = config.directories.csv_dir.clone();
            let csv_extension = config.files.csv_extension.clone();
            handles.push((
                "tailer-consumer",
                thread::spawn(move || {
                    let mut tailer = Tailer::new(fs, move_queue, csv_dir, csv_extension);
                    tailer.boot_scan();
                    tailer.run(&event_queue, &shutdown);
                }),
            ));
        }

        {
            let fs = fs.clone();
            let move_queue = move_queue.clone();
            let shutdown = shutdown.clone();
            let cfg = ScannerConfig {
                source_dir: config.directories.source_dir.clone(),
                csv_restart_dir: config.directories.csv_restart_dir.clone(),
                extension: config.files.pcap_extension.clone(),
                scan_interval: secs(config.scanner.scan_interval_seconds),
                stuck_active_timeout: secs(config.scanner.stuck_active_timeout_seconds),
                lost_timeout: secs(config.scanner.lost_timeout_seconds),
            };
            handles.push((
                "scanner",
                thread::spawn(move || {
                    let mut scanner = Scanner::new(fs, move_queue, cfg);
                    scanner.run(&shutdown);
                }),
            ));
        }

        {
            let fs = fs.clone();
            let move_queue = move_queue.clone();
            let shutdown = shutdown.clone();
            let source_dir = config.directories.source_dir.clone();
            let worker_dir = config.directories.worker_dir.clone();
            handles.push((
                "mover",
                thread::spawn(move || {
                    let mover = Mover::new(fs, move_queue, shutdown, source_dir, worker_dir);
                    mover.run();
                }),
            ));
        }

        {
            let fs = fs.clone();
            let http = http.clone();
            let shutdown = shutdown.clone();
            let cfg = UploaderConfig {
                worker_dir: config.directories.worker_dir.clone(),
                uploaded_dir: config.directories.uploaded_dir.clone(),
                dead_letter_dir: config.directories.dead_letter_dir.clone(),
                extension: config.files.pcap_extension.clone(),
                remote_url: config.uploader.remote_host_url.clone(),
                request_timeout: secs(config.uploader.request_timeout_seconds),
                poll_interval: secs(config.uploader.poll_interval_seconds),
                initial_backoff: secs(config.uploader.initial_backoff_seconds),
                max_backoff: secs(config.uploader.max_backoff_seconds),
                heartbeat_interval: secs(config.uploader.heartbeat_target_interval_s),
            };
            handles.push((
                "uploader",
                thread::spawn(move || {
                    let mut uploader = Uploader::new(fs, http, cfg);
                    uploader.run(&shutdown);
                }),
            ));
        }

        {
            let fs = fs.clone();
            let shutdown = shutdown.clone();
            let cfg = PurgerConfig {
                worker_dir: config.directories.worker_dir.clone(),
                uploaded_dir: config.directories.uploaded_dir.clone(),
                extension: config.files.pcap_extension.clone(),
                poll_interval: secs(config.purger.poll_interval_seconds),
                target_disk_usage_percent: config.purger.target_disk_usage_percent,
                total_disk_capacity_bytes: config.purger.total_disk_capacity_bytes,
            };
            handles.push((
                "purger",
                thread::spawn(move || {
                    let purger = Purger::new(fs, cfg);
                    purger.run(&shutdown);
                }),
            ));
        }

        info!(worker_count = handles.len(), "supervisor started all workers");

        Ok(Self { shutdown, handles })
    }

    /// Block until shutdown is triggered (externally, or by a worker health
    /// check failure), then join every worker with a bounded timeout.
    pub fn wait_for_shutdown(self) {
        while !self.shutdown.is_triggered() {
            if self.handles.iter().any(|(_, h)| h.is_finished()) {
                warn!("a worker exited unexpectedly, tripping shutdown");
                self.shutdown.trigger();
                break;
            }
            thread::sleep(Duration::from_millis(200));
        }
        self.join_all();
    }

    fn join_all(self) {
        let deadline = std::time::Instant::now() + JOIN_TIMEOUT;
        for (name, handle) in self.handles {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                warn!(worker = name, "join timeout exceeded, abandoning worker");
                continue;
            }
            // std::thread::JoinHandle has no timed join; we best-effort join
            // and accept the process exit will reap any stragglers, per
            // spec.md §5 cancellation semantics.
            if let Err(_e) = handle.join() {
                error!(worker = name, "worker thread panicked");
            }
        }
    }
}

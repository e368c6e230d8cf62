//! Uploader worker: ships every file in `worker` to the remote endpoint
//! exactly once from the remote's perspective, then relocates it to
//! `uploaded` or `dead_letter` (spec.md §4.4).

pub mod audit;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::fs::{find_available_destination, rename_or_copy, Fs};
use crate::http::HttpClient;
use crate::shutdown::ShutdownSignal;
use crate::types::UploadOutcome;
use audit::{emit, AuditEvent, AuditRecord};

const COLLISION_LIMIT: usize = 1000;

pub struct UploaderConfig {
    pub worker_dir: PathBuf,
    pub uploaded_dir: PathBuf,
    pub dead_letter_dir: PathBuf,
    pub extension: String,
    pub remote_url: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub heartbeat_interval: Duration,
}

pub struct Uploader {
    fs: Arc<dyn Fs>,
    http: Arc<dyn HttpClient>,
    cfg: UploaderConfig,
    critically_failed_files: HashSet<PathBuf>,
    idle_cycles: u64,
    was_empty: bool,
}

impl Uploader {
    pub fn new(fs: Arc<dyn Fs>, http: Arc<dyn HttpClient>, cfg: UploaderConfig) -> Self {
        Self {
            fs,
            http,
            cfg,
            critically_failed_files: HashSet::new(),
            idle_cycles: 0,
            was_empty: false,
        }
    }

    pub fn run(&mut self, shutdown: &ShutdownSignal) {
        loop {
            if shutdown.wait_timeout(self.cfg.poll_interval) {
                return;
            }
            self.scan_cycle(shutdown);
        }
    }

    fn heartbeat_cycles(&self) -> u64 {
        let poll_secs = self.cfg.poll_interval.as_secs_f64().max(0.001);
        let heartbeat_secs = self.cfg.heartbeat_interval.as_secs_f64();
        (heartbeat_secs / poll_secs).ceil() as u64
    }

    pub fn scan_cycle(&mut self, shutdown: &ShutdownSignal) {
        let mut entries = match self.fs.read_dir(&self.cfg.worker_dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "uploader failed to enumerate worker directory");
                return;
            }
        };
        entries.retain(|e| {
            e.path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(&self.cfg.extension))
                .unwrap_or(false)
                && !self.critically_failed_files.contains(&e.path)
        });
        entries.sort_by_key(|e| e.meta.modified);

        if entries.is_empty() {
            self.report_empty_cycle();
            return;
        }
        self.report_nonempty_cycle();

        for entry in entries {
            if shutdown.is_triggered() {
                break;
            }
            self.send_one(&entry.path, shutdown);
        }
    }

    fn report_empty_cycle(&mut self) {
        let cadence = self.heartbeat_cycles().max(1);
        if !self.was_empty {
            debug!(worker_dir = %self.cfg.worker_dir.display(), "no files found, idle streak starting");
        } else if self.idle_cycles % cadence == 0 {
            debug!(
                cycles = self.idle_cycles,
                "no files found for {} consecutive cycles", self.idle_cycles
            );
        }
        if self.idle_cycles % cadence == 0 {
            info!(worker_dir = %self.cfg.worker_dir.display(), "uploader heartbeat: watching for files");
        }
        self.was_empty = true;
        self.idle_cycles += 1;
    }

    fn report_nonempty_cycle(&mut self) {
        if self.was_empty {
            debug!("files found again, idle streak ended");
        }
        self.was_empty = false;
        self.idle_cycles = 0;
    }

    fn send_one(&mut self, path: &Path, shutdown: &ShutdownSignal) {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let outcome = self.attempt_send(path, &filename, shutdown);

        let outcome = match outcome {
            UploadOutcome::Succeeded => self.relocate(
                path,
                &filename,
                &self.cfg.uploaded_dir.clone(),
                AuditEvent::MoveToUploadedFailed,
                UploadOutcome::Succeeded,
            ),
            UploadOutcome::TerminalFailure { reason } => self.relocate(
                path,
                &filename,
                &self.cfg.dead_letter_dir.clone(),
                AuditEvent::MoveToDeadLetterFailed,
                UploadOutcome::TerminalFailure { reason },
            ),
            other => other,
        };

        if matches!(outcome, UploadOutcome::CriticalMoveFailure) {
            warn!(path = %path.display(), "file stuck in worker after critical move failure");
        }
    }

    /// Relocates `path` into `dest_dir` after a decisive upload outcome.
    /// Returns `on_success` unchanged, or `CriticalMoveFailure` if the move
    /// itself could not complete (the file stays in `worker`).
    fn relocate(
        &mut self,
        path: &Path,
        filename: &str,
        dest_dir: &Path,
        failure_event: AuditEvent,
        on_success: UploadOutcome,
    ) -> UploadOutcome {
        let dest = match find_available_destination(self.fs.as_ref(), dest_dir, Path::new(filename), COLLISION_LIMIT) {
            Some(dest) => dest,
            None => {
                error!(path = %path.display(), "no free destination name, marking critically failed");
                self.critically_failed_files.insert(path.to_path_buf());
                return UploadOutcome::CriticalMoveFailure;
            }
        };
        if let Err(e) = rename_or_copy(self.fs.as_ref(), path, &dest) {
            error!(path = %path.display(), dest = %dest.display(), error = %e, "critical: failed to relocate file after decisive outcome");
            emit(
                failure_event,
                AuditRecord {
                    filename,
                    failure_detail: Some(&e.to_string()),
                    ..Default::default()
                },
            );
            self.critically_failed_files.insert(path.to_path_buf());
            return UploadOutcome::CriticalMoveFailure;
        }
        on_success
    }

    /// The Sender state machine: `Preparing -> Attempting -> decisive outcome`.
    fn attempt_send(&self, path: &Path, filename: &str, shutdown: &ShutdownSignal) -> UploadOutcome {
        if !self.fs.exists(path) {
            emit(AuditEvent::Vanished, AuditRecord { filename, ..Default::default() });
            return UploadOutcome::AbortedVanished;
        }
        let size = self.fs.metadata(path).ok().map(|m| m.len);

        let mut attempt: u32 = 1;
        let mut backoff = self.cfg.initial_backoff;

        loop {
            if !self.fs.exists(path) {
                emit(AuditEvent::Vanished, AuditRecord { filename, attempt_number: attempt, ..Default::default() });
                return UploadOutcome::AbortedVanished;
            }

            let start = Instant::now();
            emit(
                AuditEvent::AttemptStart,
                AuditRecord { filename, size, destination_url: Some(&self.cfg.remote_url), attempt_number: attempt, ..Default::default() },
            );

            let reader = match self.fs.open_read(path) {
                Ok(r) => r,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    emit(AuditEvent::Vanished, AuditRecord { filename, attempt_number: attempt, ..Default::default() });
                    return UploadOutcome::AbortedVanished;
                }
                Err(e) => {
                    emit(
                        AuditEvent::TerminalFailure,
                        AuditRecord {
                            filename,
                            attempt_number: attempt,
                            failure_category: Some("os_error"),
                            failure_detail: Some(&e.to_string()),
                            ..Default::default()
                        },
                    );
                    return UploadOutcome::TerminalFailure { reason: format!("OS error: {e}") };
                }
            };

            let result = self.http.post_file(&self.cfg.remote_url, filename, reader, self.cfg.request_timeout);
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(response) if (200..300).contains(&response.status) => {
                    emit(
                        AuditEvent::Succeeded,
                        AuditRecord { filename, size, attempt_number: attempt, duration_ms, status_code: Some(response.status), ..Default::default() },
                    );
                    return UploadOutcome::Succeeded;
                }
                Ok(response) if (500..600).contains(&response.status) => {
                    emit(
                        AuditEvent::RetryableFailure,
                        AuditRecord {
                            filename,
                            attempt_number: attempt,
                            duration_ms,
                            status_code: Some(response.status),
                            response_snippet: Some(&response.body_snippet),
                            failure_category: Some("http_server_error"),
                            ..Default::default()
                        },
                    );
                }
                Ok(response) => {
                    emit(
                        AuditEvent::TerminalFailure,
                        AuditRecord {
                            filename,
                            attempt_number: attempt,
                            duration_ms,
                            status_code: Some(response.status),
                            response_snippet: Some(&response.body_snippet),
                            failure_category: Some("http_terminal_status"),
                            ..Default::default()
                        },
                    );
                    return UploadOutcome::TerminalFailure { reason: format!("terminal status {}", response.status) };
                }
                Err(crate::error::UploadError::Network(e)) if e.is_timeout() || e.is_connect() => {
                    emit(
                        AuditEvent::RetryableFailure,
                        AuditRecord {
                            filename,
                            attempt_number: attempt,
                            duration_ms,
                            failure_category: Some("network_error"),
                            failure_detail: Some(&e.to_string()),
                            exception_type: Some("network"),
                            ..Default::default()
                        },
                    );
                }
                Err(e) => {
                    // Non-network client exceptions (redirect-policy, request-build
                    // errors, etc.) don't get better on retry; dead-letter them.
                    emit(
                        AuditEvent::TerminalFailure,
                        AuditRecord {
                            filename,
                            attempt_number: attempt,
                            duration_ms,
                            failure_category: Some("non_network_error"),
                            failure_detail: Some(&e.to_string()),
                            ..Default::default()
                        },
                    );
                    return UploadOutcome::TerminalFailure { reason: format!("non-retryable error: {e}") };
                }
            }

            if shutdown.wait_timeout(backoff) {
                emit(AuditEvent::ShutdownDuringBackoff, AuditRecord { filename, attempt_number: attempt, ..Default::default() });
                return UploadOutcome::AbortedShutdown;
            }
            attempt += 1;
            backoff = (backoff * 2).min(self.cfg.max_backoff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;
    use crate::http::mock::{ScriptedClient, ScriptedResult};
    use std::time::SystemTime;

    fn cfg(worker: PathBuf, uploaded: PathBuf, dead_letter: PathBuf) -> UploaderConfig {
        UploaderConfig {
            worker_dir: worker,
            uploaded_dir: uploaded,
            dead_letter_dir: dead_letter,
            extension: "pcap".to_string(),
            remote_url: "https://ingest.example.test/upload".to_string(),
            request_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            heartbeat_interval: Duration::from_secs(60),
        }
    }

    fn setup() -> (Arc<MemFs>, PathBuf, PathBuf, PathBuf) {
        let fs = Arc::new(MemFs::new());
        let worker = PathBuf::from("/worker");
        let uploaded = PathBuf::from("/uploaded");
        let dead_letter = PathBuf::from("/dead_letter");
        fs.mkdir(&worker);
        fs.mkdir(&uploaded);
        fs.mkdir(&dead_letter);
        (fs, worker, uploaded, dead_letter)
    }

    #[test]
    fn successful_upload_relocates_to_uploaded() {
        let (fs, worker, uploaded, dead_letter) = setup();
        fs.write_file(&worker.join("a.pcap"), b"data", SystemTime::now());
        let http = Arc::new(ScriptedClient::new(vec![ScriptedResult::Status(200)]));
        let mut uploader = Uploader::new(fs.clone(), http, cfg(worker.clone(), uploaded.clone(), dead_letter));

        let shutdown = ShutdownSignal::new();
        uploader.send_one(&worker.join("a.pcap"), &shutdown);

        assert!(!fs.exists(&worker.join("a.pcap")));
        assert!(fs.exists(&uploaded.join("a.pcap")));
    }

    #[test]
    fn terminal_status_relocates_to_dead_letter() {
        let (fs, worker, uploaded, dead_letter) = setup();
        fs.write_file(&worker.join("a.pcap"), b"data", SystemTime::now());
        let http = Arc::new(ScriptedClient::new(vec![ScriptedResult::Status(404)]));
        let mut uploader = Uploader::new(fs.clone(), http, cfg(worker.clone(), uploaded, dead_letter.clone()));

        let shutdown = ShutdownSignal::new();
        uploader.send_one(&worker.join("a.pcap"), &shutdown);

        assert!(fs.exists(&dead_letter.join("a.pcap")));
    }

    #[test]
    fn retries_server_error_then_succeeds() {
        let (fs, worker, uploaded, dead_letter) = setup();
        fs.write_file(&worker.join("a.pcap"), b"data", SystemTime::now());
        let http = Arc::new(ScriptedClient::new(vec![
            ScriptedResult::Status(503),
            ScriptedResult::Status(200),
        ]));
        let mut uploader = Uploader::new(fs.clone(), http, cfg(worker.clone(), uploaded.clone(), dead_letter));

        let shutdown = ShutdownSignal::new();
        uploader.send_one(&worker.join("a.pcap"), &shutdown);

        assert!(fs.exists(&uploaded.join("a.pcap")));
    }

    #[test]
    fn non_network_exception_dead_letters_without_retry() {
        let (fs, worker, uploaded, dead_letter) = setup();
        fs.write_file(&worker.join("a.pcap"), b"data", SystemTime::now());
        let http = Arc::new(ScriptedClient::new(vec![ScriptedResult::NonNetworkError]));
        let mut uploader = Uploader::new(fs.clone(), http.clone(), cfg(worker.clone(), uploaded, dead_letter.clone()));

        let shutdown = ShutdownSignal::new();
        uploader.send_one(&worker.join("a.pcap"), &shutdown);

        assert!(fs.exists(&dead_letter.join("a.pcap")));
        assert_eq!(http.calls.lock().unwrap().len(), 1, "non-network exceptions must not be retried");
    }

    #[test]
    fn vanished_source_is_aborted_without_relocation() {
        let (fs, worker, uploaded, dead_letter) = setup();
        let http = Arc::new(ScriptedClient::new(vec![]));
        let mut uploader = Uploader::new(fs.clone(), http, cfg(worker.clone(), uploaded.clone(), dead_letter.clone()));

        let shutdown = ShutdownSignal::new();
        uploader.send_one(&worker.join("ghost.pcap"), &shutdown);

        assert!(!fs.exists(&uploaded.join("ghost.pcap")));
        assert!(!fs.exists(&dead_letter.join("ghost.pcap")));
    }
}

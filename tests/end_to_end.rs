//! End-to-end scenarios S1, S2, S3, S5, S6 (spec.md §8) driven against the
//! real `OsFs` over a temp directory tree. S4 (retry-then-success) is
//! already covered at the Sender-state-machine level by `uploader`'s unit
//! tests against `MemFs`, so it isn't repeated here.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use filetime::{set_file_mtime, FileTime};
use tempfile::TempDir;

use pcapshipd::fs::OsFs;
use pcapshipd::http::mock::{ScriptedClient, ScriptedResult};
use pcapshipd::mover::Mover;
use pcapshipd::queue::MoveQueue;
use pcapshipd::scanner::{Scanner, ScannerConfig};
use pcapshipd::shutdown::ShutdownSignal;
use pcapshipd::tailer::parser;
use pcapshipd::uploader::{Uploader, UploaderConfig};

struct Layout {
    _root: TempDir,
    source: PathBuf,
    worker: PathBuf,
    uploaded: PathBuf,
    dead_letter: PathBuf,
    csv_restart: PathBuf,
}

fn layout() -> Layout {
    let root = TempDir::new().unwrap();
    let source = root.path().join("source");
    let worker = root.path().join("worker");
    let uploaded = root.path().join("uploaded");
    let dead_letter = root.path().join("dead_letter");
    let csv_restart = root.path().join("csv_restart");
    for dir in [&source, &worker, &uploaded, &dead_letter, &csv_restart] {
        fs::create_dir_all(dir).unwrap();
    }
    Layout {
        _root: root,
        source,
        worker,
        uploaded,
        dead_letter,
        csv_restart,
    }
}

fn uploader_cfg(l: &Layout) -> UploaderConfig {
    UploaderConfig {
        worker_dir: l.worker.clone(),
        uploaded_dir: l.uploaded.clone(),
        dead_letter_dir: l.dead_letter.clone(),
        extension: "pcap".to_string(),
        remote_url: "https://ingest.example.test/upload".to_string(),
        request_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(10),
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
        heartbeat_interval: Duration::from_secs(60),
    }
}

/// S1: a file referenced by a valid manifest line moves source -> worker ->
/// uploaded, and its bytes are unchanged end to end.
#[test]
fn s1_full_pipeline_moves_file_to_uploaded_unchanged() {
    let l = layout();
    let fs_os = Arc::new(OsFs::new());
    let payload = b"0123456789abc"; // 13 bytes, matches spec.md's example size
    let source_path = l.source.join("APP1-ts1.pcap");
    fs::write(&source_path, payload).unwrap();

    let line = format!("1678886400,{},{}", source_path.display(), "a".repeat(64));
    let parsed = parser::parse_line(&line).expect("manifest line parses");
    assert_eq!(parsed.filepath, source_path.display().to_string());

    let move_queue = MoveQueue::bounded(8);
    let mover = Mover::new(
        fs_os.clone(),
        move_queue,
        ShutdownSignal::new(),
        l.source.clone(),
        l.worker.clone(),
    );
    mover.handle_one(&PathBuf::from(parsed.filepath));

    assert!(!source_path.exists());
    let worker_path = l.worker.join("APP1-ts1.pcap");
    assert!(worker_path.exists());

    let http = Arc::new(ScriptedClient::new(vec![ScriptedResult::Status(200)]));
    let mut uploader = Uploader::new(fs_os.clone(), http, uploader_cfg(&l));
    let shutdown = ShutdownSignal::new();
    uploader.scan_cycle(&shutdown);

    let uploaded_path = l.uploaded.join("APP1-ts1.pcap");
    assert!(uploaded_path.exists());
    assert_eq!(fs::read(&uploaded_path).unwrap(), payload);
    assert!(!worker_path.exists());
}

/// S2: a file with no manifest entry and a stale mtime is classified LOST by
/// the Scanner and enqueued for the Mover.
#[test]
fn s2_scanner_flags_and_enqueues_lost_file() {
    let l = layout();
    let fs_os = Arc::new(OsFs::new());
    let path = l.source.join("lost_and_found_01.pcap");
    fs::write(&path, b"data").unwrap();
    set_file_mtime(&path, FileTime::from_system_time(SystemTime::now() - Duration::from_millis(600))).unwrap();

    let queue = MoveQueue::bounded(8);
    let cfg = ScannerConfig {
        source_dir: l.source.clone(),
        csv_restart_dir: l.csv_restart.clone(),
        extension: "pcap".to_string(),
        scan_interval: Duration::from_millis(200),
        stuck_active_timeout: Duration::from_secs(10),
        lost_timeout: Duration::from_millis(300),
    };
    let mut scanner = Scanner::new(fs_os, queue.clone(), cfg);
    scanner.cycle().unwrap();

    let enqueued = queue.try_get(Duration::from_millis(50)).expect("lost file enqueued");
    assert_eq!(enqueued, path);
}

/// S3: a file whose mtime keeps advancing is flagged stuck-active (and a
/// restart signal file is created) while updates continue, then is treated
/// as lost once updates stop and `lost_timeout` elapses.
#[test]
fn s3_stuck_active_then_lost_after_updates_stop() {
    let l = layout();
    let fs_os = Arc::new(OsFs::new());
    let path = l.source.join("stuck-then-lost-01.pcap");
    fs::write(&path, b"data").unwrap();

    let queue = MoveQueue::bounded(8);
    let cfg = ScannerConfig {
        source_dir: l.source.clone(),
        csv_restart_dir: l.csv_restart.clone(),
        extension: "pcap".to_string(),
        scan_interval: Duration::from_millis(50),
        stuck_active_timeout: Duration::from_millis(150),
        lost_timeout: Duration::from_millis(100),
    };
    let mut scanner = Scanner::new(fs_os, queue.clone(), cfg);

    // Keep nudging the mtime forward across several cycles to simulate an
    // app still actively writing.
    for _ in 0..6 {
        set_file_mtime(&path, FileTime::from_system_time(SystemTime::now())).unwrap();
        scanner.cycle().unwrap();
        std::thread::sleep(Duration::from_millis(60));
    }

    assert!(queue.try_get(Duration::from_millis(10)).is_err(), "still active, must not be moved yet");
    assert!(l.csv_restart.join("stuck.restart").exists());

    // Updates stop; once `lost_timeout` passes relative to the last mtime
    // the file is classified lost and enqueued.
    std::thread::sleep(Duration::from_millis(250));
    scanner.cycle().unwrap();

    let enqueued = queue.try_get(Duration::from_millis(50)).expect("file eventually lost");
    assert_eq!(enqueued, path);
}

/// S5: the Purger empties `uploaded` before touching `worker`.
#[test]
fn s5_purger_drains_uploaded_before_worker() {
    use pcapshipd::purger::{Purger, PurgerConfig};

    let l = layout();
    let fs_os = Arc::new(OsFs::new());

    let worker_file = l.worker.join("A.pcap");
    let uploaded_file = l.uploaded.join("B.pcap");
    fs::write(&worker_file, vec![0u8; 10]).unwrap();
    fs::write(&uploaded_file, vec![0u8; 1000]).unwrap();
    set_file_mtime(&worker_file, FileTime::from_system_time(SystemTime::now() - Duration::from_secs(10))).unwrap();
    set_file_mtime(&uploaded_file, FileTime::from_system_time(SystemTime::now())).unwrap();

    let purger = Purger::new(
        fs_os,
        PurgerConfig {
            worker_dir: l.worker.clone(),
            uploaded_dir: l.uploaded.clone(),
            extension: "pcap".to_string(),
            poll_interval: Duration::from_secs(1),
            target_disk_usage_percent: 0.25,
            total_disk_capacity_bytes: 2000,
        },
    );
    purger.cycle();

    assert!(!uploaded_file.exists(), "uploaded file deleted first");
    assert!(worker_file.exists(), "worker file retained");
    let remaining: u64 = fs::metadata(&worker_file).map(|m| m.len()).unwrap_or(0);
    assert!(remaining <= 500);
}

/// S6: a terminal (4xx) response relocates the file to `dead_letter` after a
/// single attempt, with no retries.
#[test]
fn s6_terminal_status_moves_to_dead_letter_after_one_attempt() {
    let l = layout();
    let fs_os = Arc::new(OsFs::new());
    let source_path = l.worker.join("bad.pcap");
    fs::write(&source_path, b"data").unwrap();

    let http = Arc::new(ScriptedClient::new(vec![ScriptedResult::Status(400)]));
    let mut uploader = Uploader::new(fs_os, http.clone(), uploader_cfg(&l));
    let shutdown = ShutdownSignal::new();
    uploader.scan_cycle(&shutdown);

    assert!(l.dead_letter.join("bad.pcap").exists());
    assert!(!l.worker.join("bad.pcap").exists());
    assert_eq!(http.calls.lock().unwrap().len(), 1, "exactly one POST, no retries on terminal status");
}

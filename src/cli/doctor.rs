//! Doctor command - startup self-check promoted to a CLI subcommand
//! (supplemented from the original's startup doctor routine, see
//! SPEC_FULL.md §9).

use anyhow::Result;
use std::path::Path;

use crate::config::{self, Config};
use crate::fs::{Fs, OsFs};

mod color {
    pub const GREEN: &str = "\x1b[32m";
    pub const RED: &str = "\x1b[31m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
}

struct CheckResult {
    status: CheckStatus,
    label: String,
    detail: Option<String>,
}

enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(label: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Ok,
            label: label.into(),
            detail: None,
        }
    }

    fn ok_with_detail(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Ok,
            label: label.into(),
            detail: Some(detail.into()),
        }
    }

    fn warning(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Warning,
            label: label.into(),
            detail: Some(detail.into()),
        }
    }

    fn error(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Error,
            label: label.into(),
            detail: Some(detail.into()),
        }
    }

    fn print(&self) {
        let (icon, color) = match self.status {
            CheckStatus::Ok => ("[OK]", color::GREEN),
            CheckStatus::Warning => ("[!!]", color::YELLOW),
            CheckStatus::Error => ("[XX]", color::RED),
        };

        print!("{}{}{} {}", color, icon, color::RESET, self.label);
        if let Some(ref detail) = self.detail {
            print!(": {}", detail);
        }
        println!();
    }

    fn is_error(&self) -> bool {
        matches!(self.status, CheckStatus::Error)
    }
}

pub fn run() -> Result<()> {
    println!();
    println!("{}pcapshipd - System Health Check{}", color::BOLD, color::RESET);
    println!("{}", "=".repeat(40));
    println!();

    let mut has_errors = false;

    CheckResult::ok_with_detail("Agent version", env!("CARGO_PKG_VERSION")).print();

    println!();
    println!("{}Configuration{}", color::BOLD, color::RESET);
    println!("{}", "-".repeat(20));

    let config = match check_config() {
        Ok((result, config)) => {
            result.print();
            Some(config)
        }
        Err(result) => {
            has_errors = result.is_error();
            result.print();
            None
        }
    };

    println!();
    println!("{}Directories{}", color::BOLD, color::RESET);
    println!("{}", "-".repeat(20));

    if let Some(ref config) = config {
        let dir_checks = check_directories(config);
        for check in &dir_checks {
            if check.is_error() {
                has_errors = true;
            }
            check.print();
        }
    } else {
        CheckResult::warning("Directories", "skipped, no valid configuration").print();
    }

    println!();
    println!("{}Remote Endpoint{}", color::BOLD, color::RESET);
    println!("{}", "-".repeat(20));

    let endpoint_checks = check_endpoint(config.as_ref());
    for check in &endpoint_checks {
        if check.is_error() {
            has_errors = true;
        }
        check.print();
    }

    println!();
    if has_errors {
        println!(
            "{}Overall: {}UNHEALTHY{} - some checks failed",
            color::BOLD,
            color::RED,
            color::RESET
        );
        anyhow::bail!("doctor found unhealthy conditions");
    } else {
        println!("{}Overall: {}HEALTHY{}", color::BOLD, color::GREEN, color::RESET);
    }
    println!();

    Ok(())
}

fn check_config() -> Result<(CheckResult, Config), CheckResult> {
    let config_path = config::paths::config_file();

    if !config_path.exists() {
        return Err(CheckResult::error(
            "Config file",
            format!("not found at {}", config_path.display()),
        ));
    }

    match Config::load() {
        Ok(config) => Ok((
            CheckResult::ok_with_detail("Config file", config_path.display().to_string()),
            config,
        )),
        Err(e) => Err(CheckResult::error("Config file", format!("invalid: {}", e))),
    }
}

fn check_directories(config: &Config) -> Vec<CheckResult> {
    let dirs: [(&str, &Path); 6] = [
        ("csv_dir", &config.directories.csv_dir),
        ("csv_restart_dir", &config.directories.csv_restart_dir),
        ("source_dir", &config.directories.source_dir),
        ("worker_dir", &config.directories.worker_dir),
        ("uploaded_dir", &config.directories.uploaded_dir),
        ("dead_letter_dir", &config.directories.dead_letter_dir),
    ];

    let mut results = Vec::new();
    let mut existing: Vec<(&str, &Path)> = Vec::new();
    for (label, path) in dirs {
        if !path.exists() {
            results.push(CheckResult::warning(label, format!("{} does not exist yet", path.display())));
            continue;
        }
        if !path.is_dir() {
            results.push(CheckResult::error(label, format!("{} is not a directory", path.display())));
            continue;
        }
        let probe = path.join(".pcapshipd_doctor_probe");
        match std::fs::write(&probe, b"probe") {
            Ok(()) => {
                let _ = std::fs::remove_file(&probe);
                results.push(CheckResult::ok_with_detail(label, format!("{} (writable)", path.display())));
                existing.push((label, path));
            }
            Err(e) => {
                results.push(CheckResult::error(label, format!("{} not writable: {}", path.display(), e)));
            }
        }
    }

    results.push(check_same_device(&existing));
    results
}

/// All six directories must live on the same filesystem device: the
/// move/rename-vs-copy design assumes `Fs::rename` (not a copy) between them.
fn check_same_device(existing: &[(&str, &Path)]) -> CheckResult {
    let Some(&(ref_label, reference)) = existing.first() else {
        return CheckResult::warning("Filesystem device", "skipped, no directories exist yet");
    };

    let os_fs = OsFs::new();
    let probe_name = ".pcapshipd_doctor_probe";
    for &(label, path) in &existing[1..] {
        match os_fs.same_device(&reference.join(probe_name), &path.join(probe_name)) {
            Ok(true) => {}
            Ok(false) => {
                return CheckResult::error(
                    "Filesystem device",
                    format!(
                        "{} is on a different filesystem device than {} ({})",
                        label,
                        ref_label,
                        reference.display()
                    ),
                );
            }
            Err(e) => {
                return CheckResult::error(
                    "Filesystem device",
                    format!("could not compare {} and {}: {}", ref_label, label, e),
                );
            }
        }
    }

    CheckResult::ok_with_detail("Filesystem device", "all directories share one device")
}

fn check_endpoint(config: Option<&Config>) -> Vec<CheckResult> {
    let Some(config) = config else {
        return vec![CheckResult::warning("Endpoint", "skipped, no valid configuration")];
    };

    let mut results = Vec::new();
    results.push(CheckResult::ok_with_detail("URL", config.uploader.remote_host_url.clone()));

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .danger_accept_invalid_certs(!config.uploader.verify_ssl)
        .build();

    match client {
        Ok(client) => match client.get(&config.uploader.remote_host_url).send() {
            Ok(response) => {
                results.push(CheckResult::ok_with_detail(
                    "Connectivity",
                    format!("reachable, status {}", response.status()),
                ));
            }
            Err(e) => {
                results.push(CheckResult::warning("Connectivity", format!("unreachable: {}", e)));
            }
        },
        Err(e) => {
            results.push(CheckResult::error("HTTP client", format!("failed to create: {}", e)));
        }
    }

    results
}

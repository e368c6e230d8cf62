//! Configuration loading and validation (spec.md §6, SPEC_FULL.md §4.8).
//!
//! TOML in place of the original's INI (Open Question OQ-1: a
//! representation choice, not a behavior change — every field and
//! invariant below is identical either way).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub mod paths;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    pub path: PathBuf,

    pub directories: DirectoriesConfig,
    pub files: FilesConfig,
    #[serde(default)]
    pub mover: MoverConfig,
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub tailer: TailerConfig,
    pub uploader: UploaderConfig,
    pub purger: PurgerConfig,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoriesConfig {
    pub csv_dir: PathBuf,
    pub csv_restart_dir: PathBuf,
    pub source_dir: PathBuf,
    pub worker_dir: PathBuf,
    pub uploaded_dir: PathBuf,
    pub dead_letter_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Extension of the producer's payload files (no leading dot), e.g. "pcap".
    pub pcap_extension: String,
    /// Extension of the manifest files the Tailer watches, e.g. "csv".
    pub csv_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoverConfig {
    #[serde(default = "default_collision_limit")]
    pub collision_limit: usize,
}

fn default_collision_limit() -> usize {
    1000
}

impl Default for MoverConfig {
    fn default() -> Self {
        Self {
            collision_limit: default_collision_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    pub scan_interval_seconds: f64,
    pub stuck_active_timeout_seconds: f64,
    pub lost_timeout_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailerConfig {
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

fn default_event_queue_capacity() -> usize {
    1024
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploaderConfig {
    pub remote_host_url: String,
    pub request_timeout_seconds: f64,
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    pub poll_interval_seconds: f64,
    pub initial_backoff_seconds: f64,
    pub max_backoff_seconds: f64,
    pub heartbeat_target_interval_s: f64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgerConfig {
    pub poll_interval_seconds: f64,
    pub target_disk_usage_percent: f64,
    pub total_disk_capacity_bytes: u64,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&paths::config_file())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::NotFound(path.display().to_string()))?;
        let mut config: Config = toml::from_str(&content)?;
        config.path = path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        invalid_if(
            self.files.pcap_extension.is_empty() || self.files.pcap_extension.starts_with('.'),
            "files.pcap_extension",
            "must be non-empty and not start with a dot",
        )?;
        invalid_if(
            self.files.csv_extension.is_empty() || self.files.csv_extension.starts_with('.'),
            "files.csv_extension",
            "must be non-empty and not start with a dot",
        )?;

        invalid_if(
            self.scanner.scan_interval_seconds <= 0.0,
            "scanner.scan_interval_seconds",
            "must be > 0",
        )?;
        invalid_if(
            self.scanner.lost_timeout_seconds <= 0.0,
            "scanner.lost_timeout_seconds",
            "must be > 0",
        )?;
        invalid_if(
            self.scanner.stuck_active_timeout_seconds <= self.scanner.lost_timeout_seconds,
            "scanner.stuck_active_timeout_seconds",
            "must be greater than lost_timeout_seconds",
        )?;

        invalid_if(
            !(self.uploader.remote_host_url.starts_with("http://")
                || self.uploader.remote_host_url.starts_with("https://")),
            "uploader.remote_host_url",
            "must start with http:// or https://",
        )?;
        invalid_if(
            self.uploader.poll_interval_seconds <= 0.0,
            "uploader.poll_interval_seconds",
            "must be > 0",
        )?;
        invalid_if(
            self.uploader.initial_backoff_seconds <= 0.0,
            "uploader.initial_backoff_seconds",
            "must be > 0",
        )?;
        invalid_if(
            self.uploader.max_backoff_seconds <= 0.0,
            "uploader.max_backoff_seconds",
            "must be > 0",
        )?;
        invalid_if(
            self.uploader.max_backoff_seconds < self.uploader.initial_backoff_seconds,
            "uploader.max_backoff_seconds",
            "must be >= initial_backoff_seconds",
        )?;
        invalid_if(
            self.uploader.heartbeat_target_interval_s <= 0.0,
            "uploader.heartbeat_target_interval_s",
            "must be > 0",
        )?;

        invalid_if(
            self.purger.poll_interval_seconds <= 0.0,
            "purger.poll_interval_seconds",
            "must be > 0",
        )?;
        invalid_if(
            !(self.purger.target_disk_usage_percent > 0.0
                && self.purger.target_disk_usage_percent <= 1.0),
            "purger.target_disk_usage_percent",
            "must be in (0, 1]",
        )?;
        invalid_if(
            self.purger.total_disk_capacity_bytes == 0,
            "purger.total_disk_capacity_bytes",
            "must be > 0",
        )?;

        // log_level is validated strictly against EnvFilter-known levels
        // (Open Question OQ-3: no numeric passthrough, since tracing has no
        // numeric-level concept).
        invalid_if(
            !matches!(
                self.log_level.to_ascii_lowercase().as_str(),
                "error" | "warn" | "info" | "debug" | "trace"
            ),
            "log_level",
            "must be one of error, warn, info, debug, trace",
        )?;

        Ok(())
    }
}

fn invalid_if(cond: bool, field: &str, detail: &str) -> Result<(), ConfigError> {
    if cond {
        Err(ConfigError::Invalid {
            field: field.to_string(),
            detail: detail.to_string(),
        })
    } else {
        Ok(())
    }
}

pub fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            path: PathBuf::new(),
            directories: DirectoriesConfig {
                csv_dir: PathBuf::from("/data/csv"),
                csv_restart_dir: PathBuf::from("/data/csv_restart"),
                source_dir: PathBuf::from("/data/source"),
                worker_dir: PathBuf::from("/data/worker"),
                uploaded_dir: PathBuf::from("/data/uploaded"),
                dead_letter_dir: PathBuf::from("/data/dead_letter"),
            },
            files: FilesConfig {
                pcap_extension: "pcap".to_string(),
                csv_extension: "csv".to_string(),
            },
            mover: MoverConfig::default(),
            scanner: ScannerConfig {
                scan_interval_seconds: 30.0,
                stuck_active_timeout_seconds: 3600.0,
                lost_timeout_seconds: 300.0,
            },
            tailer: TailerConfig::default(),
            uploader: UploaderConfig {
                remote_host_url: "https://ingest.example.test/upload".to_string(),
                request_timeout_seconds: 30.0,
                verify_ssl: true,
                poll_interval_seconds: 5.0,
                initial_backoff_seconds: 1.0,
                max_backoff_seconds: 60.0,
                heartbeat_target_interval_s: 300.0,
            },
            purger: PurgerConfig {
                poll_interval_seconds: 3600.0,
                target_disk_usage_percent: 0.8,
                total_disk_capacity_bytes: 1_000_000_000,
            },
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn rejects_stuck_timeout_not_greater_than_lost_timeout() {
        let mut c = valid_config();
        c.scanner.stuck_active_timeout_seconds = 100.0;
        c.scanner.lost_timeout_seconds = 300.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_bad_url_scheme() {
        let mut c = valid_config();
        c.uploader.remote_host_url = "ftp://example.test".to_string();
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_max_backoff_below_initial() {
        let mut c = valid_config();
        c.uploader.initial_backoff_seconds = 10.0;
        c.uploader.max_backoff_seconds = 5.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_target_percent_out_of_range() {
        let mut c = valid_config();
        c.purger.target_disk_usage_percent = 1.5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_leading_dot_extension() {
        let mut c = valid_config();
        c.files.pcap_extension = ".pcap".to_string();
        assert!(c.validate().is_err());
    }
}

//! Error types for the PCAP drop-directory shipper.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for '{field}': {detail}")]
    Invalid { field: String, detail: String },
}

#[derive(Error, Debug)]
pub enum TailerError {
    #[error("filesystem notification error: {0}")]
    Notify(#[from] notify::Error),

    #[error("csv watch path does not exist: {0}")]
    PathNotFound(String),
}

/// Fatal error from the Scanner: the enumeration of `source` itself failed
/// (permission denied, directory vanished). Per spec.md §4.2 this terminates
/// the worker rather than being retried in place.
#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("cannot enumerate source directory {path}: {source}")]
    EnumerationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a single Mover attempt; never propagated, only logged
/// (spec.md §4.3 — all failures drop the path with a warning/error).
#[derive(Error, Debug)]
pub enum MoverError {
    #[error("source path escaped the source directory: {0}")]
    PathOutsideSource(String),

    #[error("source file vanished before move")]
    Vanished,

    #[error("source is not a regular file: {0}")]
    NotRegularFile(String),

    #[error("no free destination name after {0} collisions")]
    CollisionLimitExceeded(usize),

    #[error("io error during move: {0}")]
    Io(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("http server error (5xx): status {0}")]
    ServerError(u16),

    #[error("terminal http response: status {0}")]
    TerminalHttp(u16),

    #[error("os error opening/reading file: {0}")]
    Os(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum PurgerError {
    #[error("failed to scan both {worker} and {uploaded}")]
    BothScansFailed { worker: String, uploaded: String },
}

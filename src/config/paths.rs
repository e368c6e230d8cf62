//! Standard filesystem locations for the shipper's config, logs, and audit
//! trail.

use std::path::PathBuf;

/// Base data directory for the daemon (logs + audit trail; the six working
/// directories themselves come from the config file, not from here).
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "pcapshipd", "pcapshipd")
        .map(|p| p.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("/var/lib/pcapshipd"))
}

/// Configuration file path, `PCAPSHIPD_CONFIG` taking precedence.
pub fn config_file() -> PathBuf {
    if let Ok(path) = std::env::var("PCAPSHIPD_CONFIG") {
        return PathBuf::from(path);
    }
    data_dir().join("config.toml")
}

pub fn log_dir() -> std::io::Result<PathBuf> {
    let path = data_dir().join("logs");
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

pub fn audit_dir() -> std::io::Result<PathBuf> {
    let path = data_dir().join("audit");
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_do_not_panic() {
        let _ = data_dir();
        let _ = config_file();
    }
}

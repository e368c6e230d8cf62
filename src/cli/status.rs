//! Status command - queue depths and per-directory file counts.

use anyhow::Result;

use crate::config::Config;

pub fn run() -> Result<()> {
    println!();
    println!("pcapshipd Status");
    println!("================");

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            println!("Config: error loading - {}", e);
            return Ok(());
        }
    };

    println!("Config: loaded from {}", config.path.display());
    println!();
    println!("Directories");
    println!("-----------");
    println!("source:      {} files", count_files(&config.directories.source_dir));
    println!("worker:      {} files", count_files(&config.directories.worker_dir));
    println!("uploaded:    {} files", count_files(&config.directories.uploaded_dir));
    println!("dead_letter: {} files", count_files(&config.directories.dead_letter_dir));
    println!("csv:         {} files", count_files(&config.directories.csv_dir));

    println!();
    Ok(())
}

fn count_files(dir: &std::path::Path) -> usize {
    if dir.exists() {
        std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    } else {
        0
    }
}

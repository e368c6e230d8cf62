//! Config command - configuration utilities.

use anyhow::Result;

use crate::cli::ConfigAction;
use crate::config::{self, Config};

pub fn run(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Validate => validate_config(),
        ConfigAction::Show => show_config(),
        ConfigAction::Path => show_path(),
    }
}

fn validate_config() -> Result<()> {
    let config_path = config::paths::config_file();

    println!();
    println!("Validating configuration...");
    println!("Path: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!("ERROR: configuration file not found");
        println!();
        println!("Create a configuration file at:");
        println!("  {}", config_path.display());
        println!();
        println!("Or specify a custom path with --config / PCAPSHIPD_CONFIG");
        return Ok(());
    }

    match Config::load() {
        Ok(config) => {
            println!("Configuration is valid.");
            println!();
            println!("Summary:");
            println!("  remote endpoint: {}", config.uploader.remote_host_url);
            println!("  source_dir: {}", config.directories.source_dir.display());
            println!("  worker_dir: {}", config.directories.worker_dir.display());
            println!("  target disk usage: {:.0}%", config.purger.target_disk_usage_percent * 100.0);
        }
        Err(e) => {
            println!("ERROR: configuration is invalid");
            println!();
            println!("Details: {}", e);
            println!();
            println!("Fix the configuration and run 'pcapshipd config validate' again.");
        }
    }

    println!();
    Ok(())
}

fn show_config() -> Result<()> {
    let config_path = config::paths::config_file();

    if !config_path.exists() {
        println!("Configuration file not found at: {}", config_path.display());
        return Ok(());
    }

    let content = std::fs::read_to_string(&config_path)?;
    println!("{}", content);

    Ok(())
}

fn show_path() -> Result<()> {
    println!("{}", config::paths::config_file().display());
    Ok(())
}

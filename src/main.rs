//! pcapshipd
//!
//! A drop-directory shipper daemon: tails producer CSV manifests, backstops
//! them with a directory scan, and moves referenced PCAP captures through
//! worker -> uploaded/dead_letter against a remote ingest endpoint.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use pcapshipd::cli::{self, Cli, Command};
use pcapshipd::config;
use pcapshipd::crash;
use pcapshipd::uploader;

fn main() {
    if let Err(e) = real_main() {
        eprintln!("pcapshipd startup error: {:?}", e);
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    crash::install_panic_hook();

    let cli = Cli::parse();

    if let Some(path) = &cli.config_path {
        std::env::set_var("PCAPSHIPD_CONFIG", path);
    }

    let _guard = match &cli.command {
        Command::Run { .. } => init_file_logging(&cli)?,
        _ => init_console_logging(&cli)?,
    };

    info!(version = env!("CARGO_PKG_VERSION"), "pcapshipd starting");

    match cli.command {
        Command::Run { foreground: _ } => cli::run::run_foreground(),
        Command::Doctor => cli::doctor::run(),
        Command::Status => cli::status::run(),
        Command::Config { action } => cli::config::run(action),
        Command::Version => {
            println!("pcapshipd {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_console_logging(cli: &Cli) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();

    Ok(None)
}

fn init_file_logging(cli: &Cli) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = config::paths::log_dir()?;
    let audit_dir = config::paths::audit_dir()?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("pcapshipd")
        .filename_suffix("log")
        .max_log_files(10)
        .build(&log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let audit_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("audit")
        .filename_suffix("jsonl")
        .max_log_files(30)
        .build(&audit_dir)?;
    let (audit_non_blocking, audit_guard) = tracing_appender::non_blocking(audit_appender);
    // Leaked deliberately: the non-blocking worker must outlive `init_file_logging`,
    // and there is exactly one of these for the process lifetime.
    Box::leak(Box::new(audit_guard));

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
                    metadata.target() != uploader::audit::AUDIT_TARGET
                })),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .json()
                .with_writer(audit_non_blocking)
                .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
                    metadata.target() == uploader::audit::AUDIT_TARGET
                })),
        )
        .init();

    Ok(Some(guard))
}

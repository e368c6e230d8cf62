//! Panic hook: captures a crash report to the log directory before the
//! process exits.

use std::backtrace::Backtrace;
use std::fs;
use std::panic::PanicInfo;

use crate::config::paths;

pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        handle_panic(panic_info);
    }));
}

fn handle_panic(panic_info: &PanicInfo) {
    let backtrace = Backtrace::force_capture();
    let report = build_crash_report(panic_info, &backtrace);
    let crash_file = write_crash_report(&report);

    eprintln!("pcapshipd crashed unexpectedly");
    if let Some(f) = crash_file {
        eprintln!("crash report saved to: {f}");
    }
}

fn build_crash_report(panic_info: &PanicInfo, backtrace: &Backtrace) -> String {
    let version = env!("CARGO_PKG_VERSION");
    let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

    let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };

    let location = panic_info
        .location()
        .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
        .unwrap_or_else(|| "unknown location".to_string());

    format!(
        r#"pcapshipd crash report
======================

Version: {version}
Timestamp: {timestamp}

Panic message:
{message}

Location:
{location}

Backtrace:
{backtrace}
"#
    )
}

fn write_crash_report(report: &str) -> Option<String> {
    let log_dir = paths::log_dir().ok()?;
    fs::create_dir_all(&log_dir).ok()?;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let filename = format!("crash_{timestamp}.txt");
    let path = log_dir.join(&filename);

    fs::write(&path, report).ok()?;
    Some(path.display().to_string())
}

//! Opt-in event logging. Disabled by default; the CLI `--verbose` flag
//! turns it on. Events go to `logs/checkman.log` and are echoed to
//! stderr.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::Result;
use once_cell::sync::Lazy;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "checkman.log";

static ENABLED: Lazy<RwLock<bool>> = Lazy::new(|| RwLock::new(false));

pub fn set_enabled(enabled: bool) {
    if let Ok(mut guard) = ENABLED.write() {
        *guard = enabled;
    }
}

pub fn is_enabled() -> bool {
    ENABLED.read().map(|guard| *guard).unwrap_or(false)
}

pub fn log_event(category: &str, message: &str) {
    log("INFO", category, message);
}

pub fn log_error(category: &str, message: &str) {
    log("ERROR", category, message);
}

/// Current instant as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

fn log(level: &str, category: &str, message: &str) {
    if !is_enabled() {
        return;
    }
    eprintln!("[{category}] {message}");
    if let Err(err) = write_line(level, category, message) {
        eprintln!("telemetry write failed: {err}");
    }
}

fn write_line(level: &str, category: &str, message: &str) -> Result<()> {
    let log_dir = PathBuf::from(LOG_DIR);
    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(LOG_FILE))?;
    writeln!(file, "{} [{}] {} - {}", now_rfc3339(), level, category, message)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_is_rfc3339() {
        let stamp = now_rfc3339();
        assert!(stamp.contains('T'));
        assert!(stamp.ends_with('Z'));
    }
}

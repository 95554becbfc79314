use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use clap::ValueEnum;

const LEVEL_ENV: &str = "ALOJAMIENTOS_LOG";

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LEVEL: OnceLock<LogLevel> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<LogLevel> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_env() -> LogLevel {
        std::env::var(LEVEL_ENV)
            .ok()
            .and_then(|v| LogLevel::parse(&v))
            .unwrap_or(LogLevel::Info)
    }

    fn tag(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Open (append) the log file and fix the minimum level.
/// An explicit level wins over `ALOJAMIENTOS_LOG`.
pub fn init(log_path: impl AsRef<Path>, level: Option<LogLevel>) -> std::io::Result<PathBuf> {
    let path = log_path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let _ = LOG_FILE.set(Mutex::new(file));
    let _ = LEVEL.set(level.unwrap_or_else(LogLevel::from_env));
    info(&format!("logging initialized: {}", path.display()));
    Ok(path.to_path_buf())
}

fn now_ts() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    format!("{}.{:03}", now.as_secs(), now.subsec_millis())
}

fn enabled(level: LogLevel) -> bool {
    level >= *LEVEL.get_or_init(LogLevel::from_env)
}

fn log(level: LogLevel, msg: &str) {
    if !enabled(level) {
        return;
    }
    if let Some(m) = LOG_FILE.get() {
        if let Ok(mut f) = m.lock() {
            let _ = writeln!(f, "{} [{}] {}", now_ts(), level.tag(), msg);
            let _ = f.flush();
        }
    }
}

pub fn error(msg: &str) {
    log(LogLevel::Error, msg);
}
pub fn warn(msg: &str) {
    log(LogLevel::Warn, msg);
}
pub fn info(msg: &str) {
    log(LogLevel::Info, msg);
}
pub fn debug(msg: &str) {
    log(LogLevel::Debug, msg);
}
pub fn trace(msg: &str) {
    log(LogLevel::Trace, msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names() {
        assert_eq!(LogLevel::parse("ERROR"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse(" debug "), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(LogLevel::Error > LogLevel::Warn);
        assert!(LogLevel::Warn > LogLevel::Info);
        assert!(LogLevel::Debug > LogLevel::Trace);
    }
}

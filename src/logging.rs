//! Centralized timestamped logging
//!
//! All logs should go through `logi!`, `logw!`, or `loge!` so they include:
//!   <timestamp> [TAG][thread] message
//!
//! Info goes to stdout, warnings and errors to stderr. When `init` is given a path,
//! every line is also appended to that file (useful when the preview is launched
//! from an editor that swallows the child's stdio).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

static LOG_FILE: OnceLock<Mutex<Option<std::fs::File>>> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// Initialize the optional file sink. Call once at startup.
pub fn init(log_file: Option<PathBuf>) {
    let sink = LOG_FILE.get_or_init(|| Mutex::new(None));

    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => {
                if let Ok(mut guard) = sink.lock() {
                    *guard = Some(f);
                }
            }
            Err(e) => {
                eprintln!(
                    "{} [LOG][{}] failed to open log file {}: {e}",
                    log_timestamp(),
                    log_thread_name(),
                    path.display()
                );
            }
        }
    }
}

// NOTE: We use the `time` crate purely for formatting timestamps with millisecond precision.
// Local time is used when available; it falls back to UTC.
pub fn log_timestamp() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let Ok(fmt) = time::format_description::parse(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]",
    ) else {
        return "<time-format-error>".to_string();
    };
    now.format(&fmt).unwrap_or_else(|_| "<time-format-error>".to_string())
}

pub fn log_thread_name() -> String {
    std::thread::current().name().unwrap_or("thread").to_string()
}

pub fn format_line(tag: &str, msg: &str) -> String {
    format!("{} [{}][{}] {}", log_timestamp(), tag, log_thread_name(), msg)
}

/// Write one formatted line to the console and the optional file sink.
///
/// Public so the exported macros can reach it from the binary crate.
pub fn log_line(level: Level, tag: &str, msg: &str) {
    let line = format_line(tag, msg);

    match level {
        Level::Info => println!("{line}"),
        Level::Warn | Level::Error => eprintln!("{line}"),
    }

    if let Some(m) = LOG_FILE.get() {
        if let Ok(mut guard) = m.lock() {
            if let Some(f) = guard.as_mut() {
                let _ = writeln!(f, "{line}");
                let _ = f.flush();
            }
        }
    }
}

/// Info log: printed to stdout
#[macro_export]
macro_rules! logi {
    ($tag:expr, $($arg:tt)*) => {{
        $crate::logging::log_line($crate::logging::Level::Info, $tag, &format!($($arg)*));
    }};
}

/// Warning log: printed to stderr
#[macro_export]
macro_rules! logw {
    ($tag:expr, $($arg:tt)*) => {{
        $crate::logging::log_line($crate::logging::Level::Warn, $tag, &format!($($arg)*));
    }};
}

/// Error log: printed to stderr
#[macro_export]
macro_rules! loge {
    ($tag:expr, $($arg:tt)*) => {{
        $crate::logging::log_line($crate::logging::Level::Error, $tag, &format!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_carries_tag_and_thread() {
        let line = std::thread::Builder::new()
            .name("render".into())
            .spawn(|| format_line("HOT", "reloaded"))
            .unwrap()
            .join()
            .unwrap();
        assert!(line.ends_with("[HOT][render] reloaded"), "{line}");
    }

    #[test]
    fn timestamp_has_millisecond_precision() {
        let ts = log_timestamp();
        // YYYY-MM-DD HH:MM:SS.mmm
        assert_eq!(ts.len(), 23, "{ts}");
        assert_eq!(&ts[19..20], ".");
    }
}

//! Compiler/linker diagnostics (friendly errors)
//!
//! Purpose:
//! - Turn raw driver info logs into structured messages (severity, stage, line)
//! - Show them in our log format and hand them to the editor as quickfix lines
//!
//! Drivers disagree on log shape. Recognized forms:
//! - Mesa:          `0:12(5): error: syntax error, unexpected ...`
//! - NVIDIA:        `0(12) : error C1008: undefined variable "foo"`
//! - ANGLE / Apple: `ERROR: 0:12: 'foo' : undeclared identifier`
//!
//! Anything else that is not blank becomes a diagnostic without a line number.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::PreviewError;
use crate::gpu::ActiveUniform;
use crate::{loge, logi, logw};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

/// Which part of the pipeline produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Vertex,
    Fragment,
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    pub line: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, stage, line: None, message: message.into() }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{:?} line {}: {}: {}", self.stage, line, self.severity.as_str(), self.message),
            None => write!(f, "{:?}: {}: {}", self.stage, self.severity.as_str(), self.message),
        }
    }
}

/// Ordered compiler/linker messages from one failed (or noisy) build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a driver info log. Lines that carry no severity get `fallback`.
    pub fn from_info_log(stage: Stage, log: &str, fallback: Severity) -> Self {
        let items = log
            .lines()
            .map(|l| l.trim_matches(|c: char| c.is_whitespace() || c == '\0'))
            .filter(|l| !l.is_empty())
            .filter_map(|l| parse_line(stage, l, fallback))
            .collect();
        Self(items)
    }

    pub fn push(&mut self, d: Diagnostic) {
        self.0.push(d);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    /// Vim `errorformat`-friendly lines: `path:line: severity: message`.
    pub fn quickfix_lines(&self, path: &Path) -> Vec<String> {
        self.0
            .iter()
            .map(|d| match d.line {
                Some(line) => format!("{}:{}: {}: {}", path.display(), line, d.severity.as_str(), d.message),
                None => format!("{}: {}: {}", path.display(), d.severity.as_str(), d.message),
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

fn parse_line(stage: Stage, line: &str, fallback: Severity) -> Option<Diagnostic> {
    let (severity, line_no, message) = parse_prefixed(line)
        .or_else(|| parse_mesa(line))
        .or_else(|| parse_nvidia(line))
        .unwrap_or_else(|| {
            let (sev, msg) = split_severity(line);
            (sev, None, msg.to_string())
        });

    // ANGLE appends a summary ("2 compilation errors.  No code generated.")
    if line_no.is_none() && message.ends_with("No code generated.") {
        return None;
    }

    Some(Diagnostic {
        severity: severity.unwrap_or(fallback),
        stage,
        line: line_no,
        message,
    })
}

type Parsed = (Option<Severity>, Option<u32>, String);

// ERROR: 0:12: message
fn parse_prefixed(line: &str) -> Option<Parsed> {
    let table = [("ERROR:", Severity::Error), ("WARNING:", Severity::Warning), ("INFO:", Severity::Note)];
    for (prefix, sev) in table {
        if let Some(rest) = line.strip_prefix(prefix) {
            let rest = rest.trim_start();
            return Some(match split_source_line(rest) {
                Some((n, msg)) => (Some(sev), Some(n), msg.to_string()),
                None => (Some(sev), None, rest.to_string()),
            });
        }
    }
    None
}

// "0:12: message" -> (12, "message")
fn split_source_line(s: &str) -> Option<(u32, &str)> {
    let (file, rest) = s.split_once(':')?;
    file.trim().parse::<u32>().ok()?;
    let (n, msg) = rest.split_once(':')?;
    let n = n.trim().parse::<u32>().ok()?;
    Some((n, msg.trim()))
}

// 0:12(5): error: message
fn parse_mesa(line: &str) -> Option<Parsed> {
    let (file, rest) = line.split_once(':')?;
    file.parse::<u32>().ok()?;
    let open = rest.find('(')?;
    let n = rest[..open].parse::<u32>().ok()?;
    let close = open + rest[open..].find(')')?;
    rest[open + 1..close].parse::<u32>().ok()?;
    let tail = rest[close + 1..].strip_prefix(':')?.trim_start();
    let (sev, msg) = split_severity(tail);
    Some((sev, Some(n), msg.to_string()))
}

// 0(12) : error C0000: message
fn parse_nvidia(line: &str) -> Option<Parsed> {
    let open = line.find('(')?;
    line[..open].parse::<u32>().ok()?;
    let close = open + line[open..].find(')')?;
    let n = line[open + 1..close].parse::<u32>().ok()?;
    let tail = line[close + 1..].trim_start().strip_prefix(':')?.trim_start();
    let (sev, msg) = split_severity(tail);
    Some((sev, Some(n), msg.to_string()))
}

// "error C0000: msg" / "error: msg" / "warning: msg"
fn split_severity(tail: &str) -> (Option<Severity>, &str) {
    let table = [
        ("error", Severity::Error),
        ("warning", Severity::Warning),
        ("info", Severity::Note),
        ("note", Severity::Note),
    ];
    let lower = tail.to_ascii_lowercase();
    for (word, sev) in table {
        if !lower.starts_with(word) {
            continue;
        }
        let rest = tail[word.len()..].trim_start();
        if let Some(msg) = rest.strip_prefix(':') {
            return (Some(sev), msg.trim());
        }
        if let Some((code, msg)) = rest.split_once(':') {
            if !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric()) {
                return (Some(sev), msg.trim());
            }
        }
    }
    (None, tail)
}

/// Log every diagnostic with a level matching its severity.
pub fn emit(tag: &str, diagnostics: &Diagnostics) {
    for d in diagnostics {
        match d.severity {
            Severity::Error => loge!(tag, "{d}"),
            Severity::Warning => logw!(tag, "{d}"),
            Severity::Note => logi!(tag, "{d}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// New program is active.
    Ok,
    /// Reload rejected; previous program still active.
    Failed,
    /// Nothing ever compiled; the built-in fallback is active.
    Fallback,
    /// Shader file could not be read.
    Unavailable,
}

/// What the editor side gets after every reload attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadReport {
    pub status: ReportStatus,
    pub path: PathBuf,
    pub diagnostics: Diagnostics,
    pub uniforms: Vec<ActiveUniform>,
    pub quickfix: Vec<String>,
}

impl ReloadReport {
    pub fn new(status: ReportStatus, path: &Path, diagnostics: Diagnostics, uniforms: Vec<ActiveUniform>) -> Self {
        let quickfix = diagnostics.quickfix_lines(path);
        Self { status, path: path.to_path_buf(), diagnostics, uniforms, quickfix }
    }

    pub fn unavailable(path: &Path, reason: &str) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::error(Stage::Fragment, reason));
        Self::new(ReportStatus::Unavailable, path, diagnostics, Vec::new())
    }

    /// Write the report as pretty JSON, replacing any previous one.
    pub fn write_to(&self, target: &Path) -> Result<(), PreviewError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| PreviewError::Json {
            path: target.to_path_buf(),
            source: e,
        })?;
        std::fs::write(target, json).map_err(|e| PreviewError::Io {
            path: target.to_path_buf(),
            source: e,
        })
    }
}

//! check_mk local-check output
//!
//! Every report is one line `<severity> <name> - <message>` on stdout.

use std::fmt;
use std::io::Write;
use std::sync::Mutex;
use tracing::error;

/// Check severity, ordered from healthy to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Ok = 0,
    Warning = 1,
    Critical = 2,
    Unknown = 3,
}

impl Severity {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One local-check report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub severity: Severity,
    pub name: String,
    pub message: String,
}

impl StatusLine {
    pub fn new(severity: Severity, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn ok(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Ok, name, message)
    }

    pub fn warning(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, name, message)
    }

    pub fn critical(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Critical, name, message)
    }

    /// Rendered form including the trailing newline
    pub fn render(&self) -> String {
        self.to_string() + "\n"
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} - {}", self.severity, self.name, self.message)
    }
}

/// Destination for report text.
///
/// Each call is written atomically with respect to other calls so concurrent
/// checks never interleave within a line.
pub trait StatusSink: Send + Sync {
    /// Write already-formatted text, terminated by exactly one newline.
    fn emit_raw(&self, text: &str);

    fn emit(&self, line: &StatusLine) {
        self.emit_raw(&line.render());
    }
}

fn terminated(text: &str) -> String {
    let mut out = text.trim_end_matches('\n').to_string();
    out.push('\n');
    out
}

/// Writes reports to the process's stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl StatusSink for StdoutSink {
    fn emit_raw(&self, text: &str) {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        if let Err(e) = handle
            .write_all(terminated(text).as_bytes())
            .and_then(|_| handle.flush())
        {
            error!("Failed to write status output: {}", e);
        }
    }
}

/// Collects reports in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything emitted so far, one entry per emit, newline stripped
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Entries whose second whitespace token is `name`
    pub fn lines_for(&self, name: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.split_whitespace().nth(1) == Some(name))
            .collect()
    }
}

impl StatusSink for MemorySink {
    fn emit_raw(&self, text: &str) {
        let line = terminated(text);
        self.lines
            .lock()
            .unwrap()
            .push(line.trim_end_matches('\n').to_string());
    }
}

//! Process logger
//!
//! The engine emits `tracing` events which surface through the `log`
//! facade. This logger writes them to stderr (when verbose), an optional
//! file, and a ring buffer used to explain failures after the fact.

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

pub struct LogEntry {
    pub timestamp: String,
    pub level: Level,
    pub module: String,
    pub message: String,
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] [{}] [{}] {}",
            self.timestamp, self.level, self.module, self.message
        )
    }
}

struct Inner {
    ring_buffer: VecDeque<LogEntry>,
    file: Option<File>,
}

pub struct CoachLogger {
    inner: Mutex<Inner>,
    max_entries: usize,
    to_stderr: bool,
}

static LOGGER: OnceLock<CoachLogger> = OnceLock::new();

impl CoachLogger {
    pub fn new(max_entries: usize, to_stderr: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                ring_buffer: VecDeque::with_capacity(max_entries),
                file: None,
            }),
            max_entries,
            to_stderr,
        }
    }

    /// Append to `path` as well, creating its directory
    pub fn set_file_path(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if let Ok(mut inner) = self.inner.lock() {
            inner.file = Some(file);
        }
        Ok(())
    }

    pub fn push(&self, entry: LogEntry) {
        if self.to_stderr {
            eprintln!("{}", entry);
        }

        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if let Some(file) = inner.file.as_mut() {
            let _ = writeln!(file, "{}", entry);
        }
        if inner.ring_buffer.len() >= self.max_entries {
            inner.ring_buffer.pop_front();
        }
        inner.ring_buffer.push_back(entry);
    }

    /// The last `n` entries at `level` or more severe, oldest first
    pub fn recent(&self, n: usize, level: Level) -> Vec<String> {
        let Ok(inner) = self.inner.lock() else {
            return Vec::new();
        };
        let mut lines: Vec<String> = inner
            .ring_buffer
            .iter()
            .rev()
            .filter(|e| e.level <= level)
            .take(n)
            .map(|e| e.to_string())
            .collect();
        lines.reverse();
        lines
    }
}

impl Log for CoachLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.push(LogEntry {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            level: record.level(),
            module: record.module_path().unwrap_or(record.target()).to_string(),
            message: record.args().to_string(),
        });
    }

    fn flush(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some(file) = inner.file.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

/// Map the configured level name and `-v` count to a filter.
///
/// Each `-v` raises the level one step above the configured one.
pub fn level_filter(configured: &str, verbose: u8) -> LevelFilter {
    let base = match configured.trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Warn,
    };
    LevelFilter::iter()
        .skip_while(|l| *l < base)
        .nth(verbose as usize)
        .unwrap_or(LevelFilter::Trace)
}

/// Install the global logger. Stderr output is only enabled with `-v`,
/// so progress lines stay readable by default.
pub fn init(filter: LevelFilter, verbose: u8, file: Option<&Path>) -> anyhow::Result<()> {
    let logger = LOGGER.get_or_init(|| CoachLogger::new(1000, verbose > 0));
    if let Some(path) = file {
        logger.set_file_path(path)?;
    }
    log::set_logger(logger).map_err(|e| anyhow::anyhow!("logger already installed: {}", e))?;
    log::set_max_level(filter);
    Ok(())
}

/// Recent warnings and errors, for explaining a failed save
pub fn recent_problems(n: usize) -> Vec<String> {
    LOGGER
        .get()
        .map(|logger| logger.recent(n, Level::Warn))
        .unwrap_or_default()
}

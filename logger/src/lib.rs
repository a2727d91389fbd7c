//! Asynchronous log sink
//!
//! Submissions pass a cheap level gate and a non-blocking bounded queue;
//! a background thread formats entries and appends them to the log file.
//! Under back-pressure messages are dropped with a diagnostic on stderr
//! rather than stalling the hot path. `stop` drains the queue before the
//! file is closed.

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

use chrono::{DateTime, Local};
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Queue depth between submitters and the drain thread
const QUEUE_CAPACITY: usize = 8192;

/// Severity levels, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Finest-grained diagnostics
    Trace = 0,
    /// Debug diagnostics
    Debug = 1,
    /// Normal operational messages
    Info = 2,
    /// Unexpected but recoverable conditions
    Warn = 3,
    /// Errors
    Error = 4,
}

impl LogLevel {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Warn,
            _ => Self::Error,
        }
    }
}

struct LogEntry {
    timestamp: DateTime<Local>,
    level: LogLevel,
    message: String,
}

/// Level-filtered sink writing one record per line:
/// `YYYY-MM-DD HH:MM:SS.mmm [LEVEL] message`
pub struct Logger {
    tx: Sender<LogEntry>,
    min_level: Arc<AtomicU8>,
    running: Arc<AtomicBool>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl Logger {
    /// Open `path` for appending and start the drain thread
    ///
    /// # Errors
    /// Propagates the file-open failure.
    pub fn new(path: impl AsRef<Path>, min_level: LogLevel) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (tx, rx) = bounded(QUEUE_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));

        let drain = {
            let running = Arc::clone(&running);
            std::thread::spawn(move || drain_loop(&rx, &running, file))
        };

        Ok(Self {
            tx,
            min_level: Arc::new(AtomicU8::new(min_level as u8)),
            running,
            drain: Mutex::new(Some(drain)),
        })
    }

    /// Whether a message at `level` would currently be recorded
    #[inline]
    #[must_use]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= LogLevel::from_u8(self.min_level.load(Ordering::Relaxed))
    }

    /// Change the minimum recorded level
    pub fn set_min_level(&self, level: LogLevel) {
        self.min_level.store(level as u8, Ordering::Relaxed);
    }

    /// Submit one message. Never blocks; messages below the level gate are
    /// skipped and messages hitting a full queue are dropped with a
    /// diagnostic on stderr.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        if !self.is_enabled(level) {
            return;
        }
        let entry = LogEntry {
            timestamp: Local::now(),
            level,
            message: message.into(),
        };
        if let Err(TrySendError::Full(entry)) = self.tx.try_send(entry) {
            eprintln!("logger queue full, discarding message: {}", entry.message);
        }
    }

    /// Log at trace level
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    /// Log at debug level
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    /// Log at info level
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    /// Log at warn level
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    /// Log at error level
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Stop the drain thread after flushing everything still queued
    pub fn stop(&self) {
        let Some(drain) = self.drain.lock().take() else {
            return;
        };
        self.running.store(false, Ordering::Release);
        let _ = drain.join();
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.stop();
    }
}

fn drain_loop(rx: &Receiver<LogEntry>, running: &AtomicBool, file: File) {
    let mut writer = BufWriter::new(file);

    loop {
        match rx.recv_timeout(Duration::from_millis(10)) {
            Ok(entry) => write_entry(&mut writer, &entry),
            Err(_) => {
                let _ = writer.flush();
                if !running.load(Ordering::Acquire) {
                    break;
                }
            }
        }
    }

    // Flush-on-stop: drain whatever queued while shutting down
    while let Ok(entry) = rx.try_recv() {
        write_entry(&mut writer, &entry);
    }
    let _ = writer.flush();
}

fn write_entry(writer: &mut BufWriter<File>, entry: &LogEntry) {
    let line = format!(
        "{} [{}] {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        entry.level.as_str(),
        entry.message
    );
    if let Err(err) = writeln!(writer, "{line}") {
        eprintln!("logger write failed: {err}");
    }
}

//! JSONL persistence of the event log
//!
//! One entry per line, in log order. A file written here can be replayed with
//! `read_log_file` and fed to the stats and context engines unchanged.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::entry::LogEntry;

/// Writes log entries to a JSONL file as they are published
pub struct LogSink {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl LogSink {
    /// Open (or create) `path` for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "LogSink::open: called");
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context(format!("Failed to open {}", path.display()))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_entry(&mut self, entry: &LogEntry) -> Result<()> {
        let json = serde_json::to_string(entry)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    /// Consume entries until the channel closes or shutdown is signalled
    ///
    /// Entries already queued when shutdown arrives are still written.
    pub async fn run(mut self, mut rx: broadcast::Receiver<LogEntry>, mut shutdown: watch::Receiver<bool>) -> usize {
        debug!(path = ?self.path, "LogSink::run: starting");
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(entry) => {
                        if let Err(e) = self.write_entry(&entry) {
                            error!(path = ?self.path, error = %e, "LogSink: failed to write entry");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "LogSink: lagged behind, missed entries");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("LogSink: channel closed, shutting down");
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    debug!("LogSink: shutdown signalled, draining");
                    while let Ok(entry) = rx.try_recv() {
                        if let Err(e) = self.write_entry(&entry) {
                            error!(path = ?self.path, error = %e, "LogSink: failed to write entry");
                        }
                    }
                    break;
                }
            }
        }

        if let Err(e) = self.writer.flush() {
            warn!(path = ?self.path, error = %e, "LogSink: failed to flush on shutdown");
        }
        debug!(written = self.written, "LogSink::run: stopped");
        self.written
    }
}

/// Spawn a sink task; it returns the number of entries written
pub fn spawn_log_sink(
    path: impl AsRef<Path>,
    rx: broadcast::Receiver<LogEntry>,
    shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<usize>> {
    let sink = LogSink::open(path)?;
    Ok(tokio::spawn(sink.run(rx, shutdown)))
}

/// Write a whole log to `path`, replacing any existing file
pub fn write_log_file(path: impl AsRef<Path>, logs: &[LogEntry]) -> Result<()> {
    let path = path.as_ref();
    debug!(?path, entries = logs.len(), "write_log_file: called");
    let file = File::create(path).context(format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for entry in logs {
        writeln!(writer, "{}", serde_json::to_string(entry)?)?;
    }
    writer.flush()?;
    Ok(())
}

/// Replay a JSONL log file
///
/// Blank lines are skipped. A malformed line is an error naming its line number.
pub fn read_log_file(path: impl AsRef<Path>) -> Result<Vec<LogEntry>> {
    let path = path.as_ref();
    debug!(?path, "read_log_file: called");
    let file = File::open(path).context(format!("Failed to open {}", path.display()))?;
    let mut entries = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: LogEntry = serde_json::from_str(&line)
            .context(format!("Invalid log entry at {}:{}", path.display(), index + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}

//! Append-only JSON-lines log backing the in-memory repository.
//!
//! Each line is one [`LogEntry`] followed by `\n`. Lines are never rewritten:
//! a soft-delete appends a second line for the same short code with
//! `is_deleted` set, and replay folds the lines in file order.

use serde::{Deserialize, Serialize};
use snip_core::{OwnerId, ShortCode, StorageError, UrlRecord};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

type Result<T> = std::result::Result<T, StorageError>;

/// One line of the record log.
///
/// `uuid` identifies the line itself and is unrelated to the short code.
/// `user_id` and `is_deleted` are omitted when empty/false, so entries written
/// for unowned active records match the plain `{uuid, short_url, original_url}`
/// format and older logs without those fields replay unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub uuid: String,
    pub short_url: String,
    pub original_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_deleted: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl LogEntry {
    /// Builds a log line for `record` with a fresh line id.
    pub fn from_record(record: &UrlRecord) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            short_url: record.short_code.to_string(),
            original_url: record.original_url.clone(),
            user_id: record.owner_id.to_string(),
            is_deleted: record.deleted,
        }
    }

    fn into_record(self, line: usize) -> Result<UrlRecord> {
        let short_code =
            ShortCode::new(self.short_url).map_err(|e| StorageError::CorruptRecord {
                line,
                reason: e.to_string(),
            })?;

        Ok(UrlRecord {
            short_code,
            original_url: self.original_url,
            owner_id: OwnerId::new(self.user_id),
            deleted: self.is_deleted,
        })
    }
}

/// Counters reported by [`RecordLog::replay`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Lines decoded and handed to the caller.
    pub applied: usize,
    /// Corrupt lines that were logged and skipped.
    pub skipped: usize,
}

/// Append handle on a record log file.
#[derive(Debug)]
pub struct RecordLog {
    path: PathBuf,
    file: File,
}

impl RecordLog {
    /// Opens (or creates) the log at `path` in append mode.
    /// Parent directories are created if they do not exist.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error("create log directory", path, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| io_error("open log", path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Returns the path to the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `record` as a single line and syncs it to disk.
    pub fn append(&mut self, record: &UrlRecord) -> Result<()> {
        let mut line = serde_json::to_string(&LogEntry::from_record(record)).map_err(|e| {
            StorageError::InvalidData(format!("encode log entry {}: {e}", record.short_code))
        })?;
        line.push('\n');

        // one write call per line so a crash can only truncate the tail
        self.file
            .write_all(line.as_bytes())
            .map_err(|e| io_error("append log", &self.path, e))?;
        self.file
            .sync_data()
            .map_err(|e| io_error("sync log", &self.path, e))?;

        Ok(())
    }

    /// Reads the log at `path` front to back, handing each decoded record to
    /// `apply` in file order.
    ///
    /// Corrupt lines are skipped with a warning rather than aborting the
    /// replay. A missing file replays as empty. I/O failures while reading
    /// are returned as [`StorageError::Unavailable`].
    pub fn replay(path: &Path, mut apply: impl FnMut(UrlRecord)) -> Result<ReplayStats> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "record log does not exist yet");
                return Ok(ReplayStats::default());
            }
            Err(e) => return Err(io_error("open log for replay", path, e)),
        };

        let mut stats = ReplayStats::default();

        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line_no = index + 1;
            let line = line.map_err(|e| io_error("read log", path, e))?;
            if line.trim().is_empty() {
                continue;
            }

            match decode_line(&line, line_no) {
                Ok(record) => {
                    apply(record);
                    stats.applied += 1;
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping corrupt record log line");
                    stats.skipped += 1;
                }
            }
        }

        Ok(stats)
    }
}

fn decode_line(line: &str, line_no: usize) -> Result<UrlRecord> {
    let entry: LogEntry = serde_json::from_str(line).map_err(|e| StorageError::CorruptRecord {
        line: line_no,
        reason: e.to_string(),
    })?;
    entry.into_record(line_no)
}

fn io_error(operation: &str, path: &Path, err: io::Error) -> StorageError {
    StorageError::Unavailable(format!("{operation} {}: {err}", path.display()))
}

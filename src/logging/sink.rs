//! Size-rotated, count- and age-bounded log file.
//!
//! Rotation and backup counting are delegated to `file-rotate`. Age-based
//! eviction sits on top: rotated files whose modification time is older than
//! the configured age are deleted when the sink opens and then about once per
//! rotation.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};

use super::config::SinkConfig;
use crate::error::Error;

/// Append-only writer behind the [`Logger`](super::Logger).
///
/// Not synchronised itself; the logger wraps it in a `Mutex` so concurrent
/// requests serialise their writes here.
pub struct RotatingSink {
    inner: FileRotate<AppendCount>,
    config: SinkConfig,
    max_bytes: usize,
    written_since_sweep: usize,
}

impl RotatingSink {
    pub fn open(config: &SinkConfig) -> Result<Self, Error> {
        config.validate()?;
        let max_bytes = usize::try_from(config.max_size_bytes()).unwrap_or(usize::MAX);
        Self::open_with_limit(config, max_bytes)
    }

    /// Like [`open`](RotatingSink::open) with the size limit given in bytes.
    pub(crate) fn open_with_limit(config: &SinkConfig, max_bytes: usize) -> Result<Self, Error> {
        if let Some(parent) = config.filename.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        evict_expired(config);

        Ok(Self {
            inner: rotator(config, max_bytes),
            config: config.clone(),
            max_bytes,
            written_since_sweep: 0,
        })
    }
}

impl Write for RotatingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.written_since_sweep += written;
        if self.written_since_sweep >= self.max_bytes {
            self.written_since_sweep = 0;
            if evict_expired(&self.config) > 0 {
                // file-rotate tracks backups in memory; rescan after deleting.
                self.inner.flush()?;
                self.inner = rotator(&self.config, self.max_bytes);
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn rotator(config: &SinkConfig, max_bytes: usize) -> FileRotate<AppendCount> {
    let compression = if config.compress { Compression::OnRotate(0) } else { Compression::None };
    FileRotate::new(
        &config.filename,
        AppendCount::new(config.max_backups),
        // Rotate once a write has pushed the file past the limit, so a record
        // is never split across two files.
        ContentLimit::BytesSurpassed(max_bytes),
        compression,
        #[cfg(unix)]
        None,
    )
}

/// Deletes rotated files older than the configured age. Returns how many
/// were removed.
fn evict_expired(config: &SinkConfig) -> usize {
    let Some(max_age) = config.max_age() else { return 0 };
    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else { return 0 };

    backups(&config.filename)
        .into_iter()
        .filter(|path| {
            fs::metadata(path)
                .and_then(|meta| meta.modified())
                .is_ok_and(|modified| modified < cutoff)
        })
        // Another process may have removed it already.
        .filter(|path| fs::remove_file(path).is_ok())
        .count()
}

/// Rotated siblings of `active`: `<name>.<n>` and `<name>.<n>.gz`.
fn backups(active: &Path) -> Vec<PathBuf> {
    let Some(name) = active.file_name().and_then(|n| n.to_str()) else { return Vec::new() };
    let dir = match active.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let Ok(entries) = fs::read_dir(dir) else { return Vec::new() };

    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix(name))
                .and_then(|rest| rest.strip_prefix('.'))
                .map(|rest| rest.strip_suffix(".gz").unwrap_or(rest))
                .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
        })
        .collect()
}

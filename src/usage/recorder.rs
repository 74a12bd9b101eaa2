// Append-only per-call log
// Author: kelexine (https://github.com/kelexine)

use super::record::{CallParams, CallRecord};
use crate::error::Result;
use crate::utils::clock::Clock;
use crate::utils::path_lock;
use crate::utils::persist::ensure_parent;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

/// Writes [`CallRecord`]s as JSON Lines.
///
/// The file is opened in append mode and every line is written with a single
/// `write_all` while both the recorder's file mutex and the per-path lock are
/// held, so concurrent callers never produce torn or merged lines.
pub struct CallRecorder {
    path: PathBuf,
    file: Mutex<File>,
    path_lock: Arc<Mutex<()>>,
    clock: Arc<dyn Clock>,
}

impl CallRecorder {
    /// Open (or create) the log at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        ensure_parent(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Call log open at {}", path.display());

        Ok(Self {
            path_lock: path_lock::lock_for(&path),
            path,
            file: Mutex::new(file),
            clock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a record stamped with this recorder's clock.
    pub fn build_record(&self, params: CallParams) -> Result<CallRecord> {
        CallRecord::build(params, self.clock.now())
    }

    /// Append one record and sync it to disk before returning.
    ///
    /// Errors are returned, never swallowed.
    pub fn append(&self, record: &CallRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _path_guard = self.path_lock.lock();
        let mut file = self.file.lock();
        if let Err(e) = write_line(&mut file, &line) {
            error!("Failed to append call record to {}: {}", self.path.display(), e);
            return Err(e.into());
        }

        crate::metrics::record_call(
            &record.model,
            record.cache_hit,
            record.tokens_in,
            record.tokens_out,
            record.cost_usd,
        );
        Ok(())
    }

    /// Build and append in one step.
    pub fn record(&self, params: CallParams) -> Result<CallRecord> {
        let record = self.build_record(params)?;
        self.append(&record)?;
        Ok(record)
    }
}

fn write_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line)?;
    file.flush()?;
    file.sync_data()
}

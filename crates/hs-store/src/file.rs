//! Append-only JSON-lines results store.
//!
//! Every saved result is one line `{"parameters": .., "result": .., "saved_at": ..}`.
//! Several processes may append to the same file; a lookup miss first reads
//! whatever other writers appended since the last read. When a configuration
//! appears on several lines the last one wins.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use hs_types::{ExecutionParameterSet, HsError, HsResult, SaverAnswer, StoreError};

use crate::ResultsSaver;

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord<R> {
    parameters: ExecutionParameterSet,
    result: R,
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct ReadState {
    offset: u64,
    lines: usize,
}

/// File-backed results store shared across processes.
#[derive(Debug)]
pub struct JsonLinesResultsSaver<R> {
    path: PathBuf,
    index: RwLock<HashMap<ExecutionParameterSet, R>>,
    writer: Mutex<File>,
    read_state: Mutex<ReadState>,
}

impl<R> JsonLinesResultsSaver<R>
where
    R: Clone + Serialize + DeserializeOwned,
{
    /// Open (or create) the store at `path` and load every record in it.
    pub fn open<P: AsRef<Path>>(path: P) -> HsResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| unavailable(&path, e))?;
        }
        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| unavailable(&path, e))?;

        let saver = Self {
            path,
            index: RwLock::new(HashMap::new()),
            writer: Mutex::new(writer),
            read_state: Mutex::new(ReadState::default()),
        };
        saver.catch_up()?;
        info!(
            "Opened results store {} with {} records",
            saver.path.display(),
            saver.len()
        );
        Ok(saver)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of distinct configurations known to this instance.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Read records appended since the last read. A trailing line without a
    /// newline is left for the next call.
    pub fn catch_up(&self) -> HsResult<usize> {
        let mut state = self.read_state.lock();
        let mut file = File::open(&self.path).map_err(|e| unavailable(&self.path, e))?;
        file.seek(SeekFrom::Start(state.offset))
            .map_err(|e| unavailable(&self.path, e))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(|e| unavailable(&self.path, e))?;

        let complete = match buf.iter().rposition(|b| *b == b'\n') {
            Some(end) => &buf[..=end],
            None => return Ok(0),
        };
        let text = std::str::from_utf8(complete).map_err(|e| StoreError::Corrupted {
            line: state.lines + 1,
            message: e.to_string(),
        })?;

        let mut loaded = 0;
        let mut index = self.index.write();
        for (i, line) in text.lines().enumerate() {
            let line_no = state.lines + i + 1;
            if line.trim().is_empty() {
                continue;
            }
            let record: StoredRecord<R> = serde_json::from_str(line).map_err(|e| StoreError::Corrupted {
                line: line_no,
                message: e.to_string(),
            })?;
            index.insert(record.parameters, record.result);
            loaded += 1;
        }
        state.lines += text.lines().count();
        state.offset += complete.len() as u64;
        if loaded > 0 {
            debug!("Loaded {} records from {}", loaded, self.path.display());
        }
        Ok(loaded)
    }
}

impl<R> ResultsSaver<R> for JsonLinesResultsSaver<R>
where
    R: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    fn job_done(&self, params: &ExecutionParameterSet) -> HsResult<SaverAnswer<R>> {
        if let Some(result) = self.index.read().get(params) {
            return Ok(SaverAnswer::Done(result.clone()));
        }
        self.catch_up()?;
        Ok(match self.index.read().get(params) {
            Some(result) => SaverAnswer::Done(result.clone()),
            None => SaverAnswer::NotDone,
        })
    }

    fn save_result(&self, params: &ExecutionParameterSet, result: &R) -> HsResult<()> {
        let record = StoredRecord {
            parameters: params.clone(),
            result: result.clone(),
            saved_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        {
            let mut writer = self.writer.lock();
            writer
                .write_all(line.as_bytes())
                .and_then(|_| writer.flush())
                .map_err(|e| unavailable(&self.path, e))?;
        }
        self.index.write().insert(record.parameters, record.result);
        Ok(())
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> HsError {
    StoreError::Unavailable {
        message: format!("{}: {e}", path.display()),
    }
    .into()
}

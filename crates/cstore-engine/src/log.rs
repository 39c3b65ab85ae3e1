use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::filter::{Entry, KeyFilter};
use crate::options::{EngineOptions, SyncMode};
use crate::traits::StorageEngine;

/// File name of the log inside the engine directory.
pub const LOG_FILE_NAME: &str = "content.log";

/// Logs smaller than this are never compacted automatically (1 MiB).
pub const COMPACTION_MIN_BYTES: u64 = 1024 * 1024;

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: u64 = 8;

/// One engine write, persisted as a single log frame.
///
/// On-disk frame format:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized LogBatch)]
/// ```
///
/// A batch is applied as deletes, then the remove filter, then upserts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct LogBatch {
    deletes: Vec<String>,
    remove_filter: Option<KeyFilter>,
    upserts: Vec<Entry>,
}

/// The live key/value map plus an estimate of its encoded size.
#[derive(Debug, Default)]
struct Table {
    entries: BTreeMap<String, Vec<u8>>,
    live_bytes: u64,
}

impl Table {
    fn apply(&mut self, batch: LogBatch) {
        for key in batch.deletes {
            self.remove(&key);
        }
        if let Some(filter) = batch.remove_filter {
            let doomed: Vec<String> = self
                .entries
                .keys()
                .filter(|key| filter.matches(key))
                .cloned()
                .collect();
            for key in doomed {
                self.remove(&key);
            }
        }
        for entry in batch.upserts {
            self.insert(entry.key, entry.value);
        }
    }

    fn insert(&mut self, key: String, value: Vec<u8>) {
        let added = (key.len() + value.len()) as u64;
        if let Some(old) = self.entries.insert(key.clone(), value) {
            self.live_bytes -= (key.len() + old.len()) as u64;
        }
        self.live_bytes += added;
    }

    fn remove(&mut self, key: &str) {
        if let Some(old) = self.entries.remove(key) {
            self.live_bytes -= (key.len() + old.len()) as u64;
        }
    }

    fn snapshot(&self) -> LogBatch {
        LogBatch {
            upserts: self
                .entries
                .iter()
                .map(|(key, value)| Entry::new(key.clone(), value.clone()))
                .collect(),
            ..LogBatch::default()
        }
    }
}

/// Result of replaying a log file.
struct Replay {
    table: Table,
    /// Offset just past the last good frame.
    valid_len: u64,
    frames: usize,
}

/// Mutable engine state, present once `init` has succeeded.
///
/// `log_len` always marks the end of the last frame that was written and
/// applied. Anything on disk past it belongs to a failed write.
struct LogState {
    table: Table,
    /// `None` after a failed write; reopened at `log_len` on the next one.
    writer: Option<BufWriter<File>>,
    log_path: PathBuf,
    log_len: u64,
    options: EngineOptions,
}

impl LogState {
    fn commit(&mut self, batch: LogBatch) -> EngineResult<()> {
        let payload =
            bincode::serialize(&batch).map_err(|e| EngineError::Serialization(e.to_string()))?;
        if let Err(e) = self.append(&payload) {
            warn!(error = %e, log_len = self.log_len, "log write failed; discarding frame");
            self.discard_writer();
            return Err(e);
        }
        self.log_len += HEADER_SIZE + payload.len() as u64;
        self.table.apply(batch);

        if self.log_len > COMPACTION_MIN_BYTES && self.table.live_bytes * 4 < self.log_len {
            // The batch is durable either way.
            if let Err(e) = self.compact() {
                warn!(error = %e, "log compaction failed");
            }
        }
        Ok(())
    }

    fn append(&mut self, payload: &[u8]) -> EngineResult<()> {
        let sync = self.options.sync_mode == SyncMode::EveryWrite;
        let writer = self.writer()?;
        write_frame(writer, payload)?;
        writer.flush()?;
        if sync {
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// The open writer, reopening the log at `log_len` if the last write
    /// failed.
    fn writer(&mut self) -> EngineResult<&mut BufWriter<File>> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                OpenOptions::new()
                    .write(true)
                    .open(&self.log_path)?
                    .set_len(self.log_len)?;
                open_writer(&self.log_path, self.options.write_buffer_size)?
            }
        };
        Ok(self.writer.insert(writer))
    }

    /// Close the writer without flushing what is still buffered.
    fn discard_writer(&mut self) {
        if let Some(writer) = self.writer.take() {
            let (_file, _unflushed) = writer.into_parts();
        }
    }

    /// Rewrite the log as a single snapshot frame.
    fn compact(&mut self) -> EngineResult<()> {
        let payload = bincode::serialize(&self.table.snapshot())
            .map_err(|e| EngineError::Serialization(e.to_string()))?;

        let tmp_path = self.log_path.with_extension("log.tmp");
        if let Err(e) = write_snapshot(&tmp_path, &payload) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        // The old writer must not outlive the file it points at.
        self.discard_writer();
        fs::rename(&tmp_path, &self.log_path)?;

        let before = self.log_len;
        self.log_len = HEADER_SIZE + payload.len() as u64;
        debug!(before, after = self.log_len, "log compacted");

        self.writer()?;
        Ok(())
    }
}

/// Persistent, log-structured ordered key/value engine.
///
/// All entries live in memory in a `BTreeMap`; every write batch is appended
/// to `content.log` as one CRC-framed record before it is applied. On `init`
/// the log is replayed front-to-back until the first torn frame or CRC
/// mismatch, and everything from there on is cut off, so the table is
/// always a prefix of the write history. When most of the
/// log is dead data it is rewritten as a single snapshot frame.
///
/// File I/O runs on tokio's blocking pool.
pub struct LogEngine {
    dir: PathBuf,
    state: Arc<Mutex<Option<LogState>>>,
}

impl LogEngine {
    /// Create an engine rooted at `dir`. Nothing is touched until `init`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            state: Arc::new(Mutex::new(None)),
        }
    }

    /// Directory holding the engine files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the log file.
    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE_NAME)
    }

    /// Current size of the log in bytes.
    pub async fn log_len(&self) -> EngineResult<u64> {
        self.with_state(|state| Ok(state.log_len)).await
    }

    /// Rewrite the log so it holds only live entries.
    pub async fn compact(&self) -> EngineResult<()> {
        self.with_state(|state| state.compact()).await
    }

    async fn with_state<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&mut LogState) -> EngineResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || {
            let mut guard = state.lock().expect("log engine lock poisoned");
            let state = guard.as_mut().ok_or(EngineError::NotInitialized)?;
            f(state)
        })
        .await
        .map_err(|e| EngineError::Worker(e.to_string()))?
    }
}

impl std::fmt::Debug for LogEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogEngine").field("dir", &self.dir).finish()
    }
}

#[async_trait(?Send)]
impl StorageEngine for LogEngine {
    async fn init(&self, options: EngineOptions) -> EngineResult<()> {
        let dir = self.dir.clone();
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || {
            let mut guard = state.lock().expect("log engine lock poisoned");
            if guard.is_some() {
                return Err(EngineError::AlreadyInitialized);
            }
            *guard = Some(open_state(&dir, options)?);
            Ok(())
        })
        .await
        .map_err(|e| EngineError::Worker(e.to_string()))?
    }

    async fn load_entries_with_filter(
        &self,
        filter: &KeyFilter,
        target_prefix: &str,
    ) -> EngineResult<Vec<Entry>> {
        let filter = filter.clone();
        let target_prefix = target_prefix.to_string();
        self.with_state(move |state| {
            Ok(state
                .table
                .entries
                .range(target_prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(target_prefix.as_str()))
                .filter(|(key, _)| filter.matches(key))
                .map(|(key, value)| Entry::new(key.clone(), value.clone()))
                .collect())
        })
        .await
    }

    async fn load_keys(&self) -> EngineResult<Vec<String>> {
        self.with_state(|state| Ok(state.table.entries.keys().cloned().collect()))
            .await
    }

    async fn update_entries(&self, upserts: Vec<Entry>, deletes: Vec<String>) -> EngineResult<()> {
        self.with_state(move |state| {
            state.commit(LogBatch {
                deletes,
                remove_filter: None,
                upserts,
            })
        })
        .await
    }

    async fn update_entries_with_remove_filter(
        &self,
        upserts: Vec<Entry>,
        remove_filter: &KeyFilter,
    ) -> EngineResult<()> {
        let remove_filter = remove_filter.clone();
        self.with_state(move |state| {
            state.commit(LogBatch {
                deletes: Vec::new(),
                remove_filter: Some(remove_filter),
                upserts,
            })
        })
        .await
    }
}

fn open_state(dir: &Path, options: EngineOptions) -> EngineResult<LogState> {
    if !dir.exists() {
        if !options.create_if_missing {
            return Err(EngineError::NotFound(dir.to_path_buf()));
        }
        fs::create_dir_all(dir)?;
    }

    let log_path = dir.join(LOG_FILE_NAME);
    let replay = if log_path.exists() {
        replay(&log_path)?
    } else {
        Replay {
            table: Table::default(),
            valid_len: 0,
            frames: 0,
        }
    };

    // Cut off a torn or corrupt tail so new frames are not appended after
    // garbage.
    if log_path.exists() && fs::metadata(&log_path)?.len() > replay.valid_len {
        warn!(valid_len = replay.valid_len, "truncating torn log tail");
        OpenOptions::new()
            .write(true)
            .open(&log_path)?
            .set_len(replay.valid_len)?;
    }

    let writer = open_writer(&log_path, options.write_buffer_size)?;

    info!(
        path = %log_path.display(),
        entries = replay.table.entries.len(),
        frames = replay.frames,
        "log engine opened"
    );

    Ok(LogState {
        table: replay.table,
        writer: Some(writer),
        log_path,
        log_len: replay.valid_len,
        options,
    })
}

fn open_writer(path: &Path, capacity: usize) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    Ok(BufWriter::with_capacity(capacity, file))
}

fn write_snapshot(path: &Path, payload: &[u8]) -> io::Result<()> {
    let mut tmp = BufWriter::new(File::create(path)?);
    write_frame(&mut tmp, payload)?;
    tmp.flush()?;
    tmp.get_ref().sync_all()
}

fn write_frame(writer: &mut impl Write, payload: &[u8]) -> io::Result<()> {
    let length = payload.len() as u32;
    let crc = crc32fast::hash(payload);
    writer.write_all(&length.to_le_bytes())?;
    writer.write_all(&crc.to_le_bytes())?;
    writer.write_all(payload)
}

/// Replay every complete frame of the log into a fresh table.
fn replay(path: &Path) -> EngineResult<Replay> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let mut table = Table::default();
    let mut offset: u64 = 0;
    let mut frames = 0;

    while offset + HEADER_SIZE <= file_len {
        let mut header = [0u8; HEADER_SIZE as usize];
        reader.read_exact(&mut header)?;

        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if length == 0 || offset + HEADER_SIZE + length as u64 > file_len {
            warn!(offset, length, file_len, "invalid log frame length; stopping replay");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        reader.read_exact(&mut payload)?;
        let frame_end = offset + HEADER_SIZE + length as u64;

        // Later frames may depend on this one, so history ends here.
        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; stopping replay"
            );
            break;
        }

        let batch: LogBatch = bincode::deserialize(&payload).map_err(|e| EngineError::Corrupt {
            offset,
            reason: e.to_string(),
        })?;
        table.apply(batch);
        frames += 1;
        offset = frame_end;
    }

    debug!(frames, valid_len = offset, "log replay complete");
    Ok(Replay {
        table,
        valid_len: offset,
        frames,
    })
}

//! File-backed metric store.
//!
//! Every upsert is appended to a JSONL (JSON Lines) log. Reading folds the log
//! so the last write per key wins. The log can be compacted to one line per key
//! with an atomic rename.
//!
//! Readers, writers and compaction serialize on a sidecar `<log>.lock` file.
//! Compaction swaps in a new log file, so the log itself is never locked.

use crate::fsutil::write_atomic;
use crate::store::{check_entry_matches_key, notify};
use crate::{EntryKey, EntryQuery, MetricEntry, MetricStore, Result, StoreError, StoredEntry};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use uuid::Uuid;

/// JSONL-based metric store with file locking
pub struct JsonlStore {
    path: PathBuf,
    subscribers: Vec<Sender<EntryKey>>,
}

impl JsonlStore {
    /// Create a new store backed by the log at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            subscribers: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Path of the lock file guarding appends and compaction
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn open_lock(&self) -> Result<File> {
        self.ensure_parent_dir()?;
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(self.lock_path())?;
        Ok(lock)
    }

    /// Current record per key
    pub fn load_records(&self) -> Result<BTreeMap<EntryKey, StoredEntry>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let lock = self.open_lock()?;
        lock.lock_shared()?;
        let records = File::open(&self.path)
            .map_err(crate::Error::from)
            .and_then(|file| read_log(&file));
        lock.unlock()?;

        let records = fold_latest(records?);
        tracing::debug!("Read {} records from {:?}", records.len(), self.path);
        Ok(records)
    }

    /// Rewrite the log with only the latest line per key.
    ///
    /// Returns the number of records kept.
    pub fn compact(&self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }

        let lock = self.open_lock()?;
        lock.lock_exclusive()?;

        let file = File::open(&self.path)?;
        let records = fold_latest(read_log(&file)?);

        let mut contents = Vec::new();
        for record in records.values() {
            serde_json::to_writer(&mut contents, record)?;
            contents.push(b'\n');
        }
        write_atomic(&self.path, &contents)?;
        lock.unlock()?;

        tracing::info!("Compacted {:?} to {} records", self.path, records.len());
        Ok(records.len())
    }

    fn append(&self, key: &EntryKey, entry: &MetricEntry) -> Result<u64> {
        // Exclusive lock covers both the revision scan and the write
        let lock = self.open_lock()?;
        lock.lock_exclusive()?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        let existing = read_log(&file)?;
        let torn_tail = !ends_with_newline(&file)?;
        let revision = existing.iter().map(|r| r.revision).max().unwrap_or(0) + 1;
        let id = existing
            .iter()
            .rev()
            .find(|r| &r.key == key)
            .map_or_else(Uuid::new_v4, |r| r.id);

        let record = StoredEntry {
            id,
            key: key.clone(),
            revision,
            entry: entry.clone(),
        };

        let mut writer = std::io::BufWriter::new(&file);
        if torn_tail {
            tracing::warn!("Log {:?} ends in a partial line, starting a new one", self.path);
            writer.write_all(b"\n")?;
        }
        let line = serde_json::to_string(&record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);

        lock.unlock()?;

        tracing::debug!("Appended {} at revision {}", key.encode(), revision);
        Ok(revision)
    }
}

impl MetricStore for JsonlStore {
    fn query(&self, query: &EntryQuery) -> Result<Vec<StoredEntry>> {
        let records = self.load_records()?;
        Ok(query.apply(records.values()))
    }

    fn transact(&mut self, key: &EntryKey, entry: &MetricEntry) -> std::result::Result<u64, StoreError> {
        check_entry_matches_key(key, entry)?;
        let revision = self.append(key, entry).map_err(|e| {
            tracing::warn!("Failed to write {}: {}", key.encode(), e);
            StoreError::new(e.to_string())
        })?;
        notify(&mut self.subscribers, key);
        Ok(revision)
    }

    fn subscribe(&mut self) -> Receiver<EntryKey> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }
}

/// Read every parseable line of the log
fn read_log(file: &File) -> Result<Vec<StoredEntry>> {
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<StoredEntry>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse record at line {}: {}", line_num + 1, e);
                // Continue reading, don't fail completely
            }
        }
    }

    Ok(records)
}

/// Whether the log is empty or its last byte is a newline
fn ends_with_newline(mut file: &File) -> Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn fold_latest(records: Vec<StoredEntry>) -> BTreeMap<EntryKey, StoredEntry> {
    let mut latest: BTreeMap<EntryKey, StoredEntry> = BTreeMap::new();
    for record in records {
        match latest.get(&record.key) {
            Some(current) if current.revision > record.revision => {}
            _ => {
                latest.insert(record.key.clone(), record);
            }
        }
    }
    latest
}

//! # paxos-storage
//!
//! why: hold the integer key-value map that learned operations are applied to
//! relations: owned by paxos-core's learner, read by the proposer's quorum-read path
//! what: ValueStore trait, InMemoryStore (default), FileStore (json snapshot)

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

/// key type of the replicated map
pub type Key = i32;

/// value type of the replicated map
pub type Value = i32;

/// errors returned by a value store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key {0} not found")]
    NotFound(Key),

    #[error("store io failure: {0}")]
    Io(#[from] io::Error),

    #[error("store snapshot is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// trait for the leaf key-value map
///
/// the store has no consensus semantics of its own. it is mutated only by
/// learned operations and read by quorum reads.
pub trait ValueStore {
    /// insert or overwrite `key`
    fn put(&mut self, key: Key, value: Value) -> Result<(), StoreError>;

    /// look up `key`, `StoreError::NotFound` when absent
    fn get(&self, key: Key) -> Result<Value, StoreError>;

    /// remove `key`, `StoreError::NotFound` when absent
    fn delete(&mut self, key: Key) -> Result<(), StoreError>;

    /// number of stored keys
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// -- in-memory store implementation --

/// in-memory store, no persistence across restarts
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: BTreeMap<Key, Value>,
}

impl InMemoryStore {
    /// create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

impl ValueStore for InMemoryStore {
    fn put(&mut self, key: Key, value: Value) -> Result<(), StoreError> {
        self.entries.insert(key, value);
        Ok(())
    }

    fn get(&self, key: Key) -> Result<Value, StoreError> {
        self.entries.get(&key).copied().ok_or(StoreError::NotFound(key))
    }

    fn delete(&mut self, key: Key) -> Result<(), StoreError> {
        self.entries
            .remove(&key)
            .map(|_| ())
            .ok_or(StoreError::NotFound(key))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// -- file store implementation --

/// file-backed store
///
/// keeps the map in memory and rewrites `store.json` in the given directory
/// after every mutation. the snapshot is reloaded when the store is opened.
#[derive(Debug)]
pub struct FileStore {
    /// directory path for the snapshot file
    dir: PathBuf,
    entries: BTreeMap<Key, Value>,
}

impl FileStore {
    /// open (or create) a file store in `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut store = Self {
            dir,
            entries: BTreeMap::new(),
        };
        store.entries = store.load_snapshot()?;
        debug!(path = %store.snapshot_path().display(), keys = store.entries.len(), "opened file store");
        Ok(store)
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("store.json")
    }

    fn load_snapshot(&self) -> Result<BTreeMap<Key, Value>, StoreError> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let mut contents = String::new();
        File::open(&path)?.read_to_string(&mut contents)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// atomic write: temp file, fsync, rename
    fn write_snapshot(&self) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.entries)?;

        let temp_path = self.dir.join("store.tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, self.snapshot_path())?;
        Ok(())
    }
}

impl ValueStore for FileStore {
    fn put(&mut self, key: Key, value: Value) -> Result<(), StoreError> {
        let previous = self.entries.insert(key, value);
        if let Err(err) = self.write_snapshot() {
            // keep memory and disk in step
            match previous {
                Some(old) => self.entries.insert(key, old),
                None => self.entries.remove(&key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn get(&self, key: Key) -> Result<Value, StoreError> {
        self.entries.get(&key).copied().ok_or(StoreError::NotFound(key))
    }

    fn delete(&mut self, key: Key) -> Result<(), StoreError> {
        let old = self.entries.remove(&key).ok_or(StoreError::NotFound(key))?;
        if let Err(err) = self.write_snapshot() {
            self.entries.insert(key, old);
            return Err(err);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

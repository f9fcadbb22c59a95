// src/storage.rs
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::workout::Workout;

const DB_FILE_NAME: &str = "workouts.sqlite";
const APP_DATA_DIR: &str = "workout-map";
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing storage file")]
    Io(#[from] std::io::Error),
    #[error("Storage database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Failed to serialize workouts: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A string-keyed store of string values.
pub trait KeyValueStore {
    /// # Errors
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Overwrites any previous value under `key`.
    /// # Errors
    /// Returns `StorageError` if the backend cannot be written.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    /// # Errors
    /// Returns `StorageError` if the backend cannot be written.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Key-value entries kept in a single SQLite table.
pub struct SqliteStore {
    conn: Connection,
}

/// Gets the path to the SQLite database file within the app's data directory.
/// Creates the directory if it doesn't exist.
pub fn get_db_path() -> Result<PathBuf, StorageError> {
    let data_dir = dirs::data_dir().ok_or(StorageError::DataDir)?;
    let app_dir = data_dir.join(APP_DATA_DIR);
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join(DB_FILE_NAME))
}

impl SqliteStore {
    /// Opens (and initializes) the store at `path`.
    /// # Errors
    /// Returns `StorageError::Sqlite` if the file cannot be opened or the table created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// # Errors
    /// Returns `StorageError::Sqlite` if the table cannot be created.
    pub fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(StorageError::Sqlite)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[derive(Serialize)]
struct SnapshotOut<'a> {
    version: u32,
    workouts: &'a [Workout],
}

// Older snapshots were a bare array with no version tag. Records are decoded
// one at a time so a single bad entry doesn't take the rest with it.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotIn {
    Versioned {
        version: u32,
        workouts: Vec<serde_json::Value>,
    },
    Legacy(Vec<serde_json::Value>),
}

/// Writes and reads the whole workout list under one key.
#[derive(Debug, Clone)]
pub struct Persistence {
    key: String,
}

impl Persistence {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Serializes `workouts` and overwrites the stored snapshot.
    /// # Errors
    /// Returns `StorageError` if serialization or the store write fails.
    pub fn save<S: KeyValueStore + ?Sized>(
        &self,
        store: &mut S,
        workouts: &[Workout],
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(&SnapshotOut {
            version: SNAPSHOT_VERSION,
            workouts,
        })?;
        store.set(&self.key, &json)?;
        tracing::debug!(key = %self.key, count = workouts.len(), "Saved workout snapshot");
        Ok(())
    }

    /// Reads the stored snapshot. Anything missing or unreadable loads as empty.
    pub fn load<S: KeyValueStore + ?Sized>(&self, store: &S) -> Vec<Workout> {
        let raw = match store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Could not read workout snapshot");
                return Vec::new();
            }
        };

        match serde_json::from_str::<SnapshotIn>(&raw) {
            Ok(SnapshotIn::Versioned { version, workouts }) if version == SNAPSHOT_VERSION => {
                self.decode_records(workouts)
            }
            Ok(SnapshotIn::Versioned { version, .. }) => {
                tracing::warn!(key = %self.key, version, "Unsupported snapshot version, ignoring");
                Vec::new()
            }
            Ok(SnapshotIn::Legacy(workouts)) => self.decode_records(workouts),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Malformed workout snapshot, ignoring");
                Vec::new()
            }
        }
    }

    fn decode_records(&self, records: Vec<serde_json::Value>) -> Vec<Workout> {
        records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| match serde_json::from_value::<Workout>(record) {
                Ok(workout) => Some(workout),
                Err(e) => {
                    tracing::warn!(key = %self.key, index, error = %e, "Skipping unreadable workout record");
                    None
                }
            })
            .collect()
    }

    /// # Errors
    /// Returns `StorageError` if the store write fails.
    pub fn clear<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> Result<(), StorageError> {
        store.remove(&self.key)?;
        tracing::debug!(key = %self.key, "Cleared workout snapshot");
        Ok(())
    }
}

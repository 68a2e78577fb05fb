//! Persistent storage for imported vehicles
//!
//! The import pipeline lists, appends, and clears the stored vehicle list;
//! status and location changes replace a single vehicle. Backends:
//! - `JsonFileStore`: one JSON array rewritten wholesale on every change
//! - `SqliteStore`: one row per vehicle, appends run in a single transaction
//! - `MemoryStore`: process-local, used by tests and `store: memory`

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::entities::VehicleRecord;

/// File name of the JSON store inside the data directory
pub const JSON_STORE_FILE: &str = "vehicles.json";

/// File name of the SQLite store inside the data directory
pub const SQLITE_STORE_FILE: &str = "vehicles.db";

/// Current schema version - a database written with another one is refused
const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid vehicle data: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{path} uses schema version {found}, expected {expected}")]
    SchemaMismatch {
        path: String,
        found: i32,
        expected: i32,
    },

    #[error("{0}")]
    Unavailable(String),
}

/// Storage of committed vehicles. Writers replace or extend the whole list;
/// a failed `append` leaves the stored list unchanged.
pub trait VehicleStore {
    fn list(&self) -> Result<Vec<VehicleRecord>, StoreError>;

    fn append(&mut self, records: &[VehicleRecord]) -> Result<(), StoreError>;

    /// Replace the stored vehicle with the same id. Returns false when no
    /// stored vehicle has that id.
    fn update(&mut self, vehicle: &VehicleRecord) -> Result<bool, StoreError>;

    fn clear(&mut self) -> Result<(), StoreError>;

    /// Where the data lives, for display
    fn describe(&self) -> String;
}

/// Which backend to open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Json,
    Sqlite,
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Json => "json",
            StoreBackend::Sqlite => "sqlite",
            StoreBackend::Memory => "memory",
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(StoreBackend::Json),
            "sqlite" => Ok(StoreBackend::Sqlite),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!(
                "unknown store backend '{}' (valid: json, sqlite, memory)",
                s
            )),
        }
    }
}

/// Open the configured backend inside `data_dir`
pub fn open_store(
    backend: StoreBackend,
    data_dir: &Path,
) -> Result<Box<dyn VehicleStore>, StoreError> {
    let store: Box<dyn VehicleStore> = match backend {
        StoreBackend::Json => Box::new(JsonFileStore::new(data_dir.join(JSON_STORE_FILE))),
        StoreBackend::Sqlite => Box::new(SqliteStore::open(&data_dir.join(SQLITE_STORE_FILE))?),
        StoreBackend::Memory => Box::new(MemoryStore::new()),
    };
    tracing::debug!(backend = backend.as_str(), location = %store.describe(), "opened vehicle store");
    Ok(store)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Vehicles kept as one JSON array in a file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the full list through a temporary file so readers never see a
    /// partially written array
    fn write_all(&self, vehicles: &[VehicleRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let json = serde_json::to_string_pretty(vehicles)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_error(&tmp))?;
        fs::rename(&tmp, &self.path).map_err(io_error(&self.path))?;
        Ok(())
    }
}

impl VehicleStore for JsonFileStore {
    fn list(&self) -> Result<Vec<VehicleRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(io_error(&self.path))?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn append(&mut self, records: &[VehicleRecord]) -> Result<(), StoreError> {
        let mut vehicles = self.list()?;
        vehicles.extend_from_slice(records);
        self.write_all(&vehicles)?;
        tracing::debug!(added = records.len(), total = vehicles.len(), path = %self.path.display(), "appended vehicles");
        Ok(())
    }

    fn update(&mut self, vehicle: &VehicleRecord) -> Result<bool, StoreError> {
        let mut vehicles = self.list()?;
        let Some(slot) = vehicles.iter_mut().find(|v| v.id == vehicle.id) else {
            return Ok(false);
        };
        *slot = vehicle.clone();
        self.write_all(&vehicles)?;
        Ok(true)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.write_all(&[])
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Vehicles kept in an SQLite table, one JSON document per row
pub struct SqliteStore {
    conn: Connection,
    label: String,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self {
            conn,
            label: path.display().to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            label: ":memory:".to_string(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);
            CREATE TABLE IF NOT EXISTS vehicles (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                data TEXT NOT NULL
            );
            "#,
        )?;

        let version: Option<i32> = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        match version {
            None => {
                self.conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?1)",
                    params![SCHEMA_VERSION],
                )?;
            }
            Some(SCHEMA_VERSION) => {}
            Some(found) => {
                return Err(StoreError::SchemaMismatch {
                    path: self.label.clone(),
                    found,
                    expected: SCHEMA_VERSION,
                });
            }
        }
        Ok(())
    }
}

impl VehicleStore for SqliteStore {
    fn list(&self) -> Result<Vec<VehicleRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT data FROM vehicles ORDER BY seq")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut vehicles = Vec::new();
        for data in rows {
            vehicles.push(serde_json::from_str(&data?)?);
        }
        Ok(vehicles)
    }

    fn append(&mut self, records: &[VehicleRecord]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for record in records {
            let data = serde_json::to_string(record)?;
            tx.execute(
                "INSERT INTO vehicles (id, data) VALUES (?1, ?2)",
                params![record.id, data],
            )?;
        }
        tx.commit()?;
        tracing::debug!(added = records.len(), db = %self.label, "appended vehicles");
        Ok(())
    }

    fn update(&mut self, vehicle: &VehicleRecord) -> Result<bool, StoreError> {
        let data = serde_json::to_string(vehicle)?;
        let changed = self.conn.execute(
            "UPDATE vehicles SET data = ?1 WHERE id = ?2",
            params![data, vehicle.id],
        )?;
        Ok(changed > 0)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM vehicles", [])?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Vehicles kept in memory for the lifetime of the process
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    vehicles: Vec<VehicleRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

}

impl VehicleStore for MemoryStore {
    fn list(&self) -> Result<Vec<VehicleRecord>, StoreError> {
        Ok(self.vehicles.clone())
    }

    fn append(&mut self, records: &[VehicleRecord]) -> Result<(), StoreError> {
        self.vehicles.extend_from_slice(records);
        Ok(())
    }

    fn update(&mut self, vehicle: &VehicleRecord) -> Result<bool, StoreError> {
        match self.vehicles.iter_mut().find(|v| v.id == vehicle.id) {
            Some(slot) => {
                *slot = vehicle.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.vehicles.clear();
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

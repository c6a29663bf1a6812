//! Versioned object-store engine
//!
//! Each named database has a schema (object stores and their indexes) and a
//! version number. The schema only changes through an upgrade transaction
//! that moves the version from N to N+1; at most one upgrade per database is
//! open at a time.
//!
//! ## File Layout
//!
//! With a data directory configured, every database is persisted as one JSON
//! document:
//!
//! ```text
//! data/
//! ├── app.json          # schema of database "app"
//! └── other.json        # schema of database "other"
//! ```
//!
//! A commit writes `<name>.json.tmp` and renames it over `<name>.json`
//! before the new schema becomes visible. Without a data directory the
//! engine is purely in-memory.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::engines::ObjectStoreEngine;
use crate::error::{Result, SqlError};
use crate::types::{DatabaseSchema, StoreConnection, UpgradeTransaction};

/// Storage engine configuration
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Directory for schema files; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self { data_dir: None }
    }

    pub fn persistent(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: Some(data_dir.into()) }
    }
}

/// Per-database state
struct DatabaseState {
    schema: RwLock<DatabaseSchema>,
    /// Held by the open upgrade transaction, if any
    upgrade_lock: Arc<Mutex<()>>,
}

fn poisoned<T>(_: T) -> SqlError {
    SqlError::Storage("storage lock poisoned".to_string())
}

/// The built-in object-store engine
pub struct StorageEngine {
    config: StorageConfig,
    databases: RwLock<HashMap<String, Arc<DatabaseState>>>,
    upgrades: AtomicU64,
}

impl StorageEngine {
    /// Create an engine; the data directory is created if missing
    pub fn new(config: StorageConfig) -> Result<Self> {
        if let Some(dir) = &config.data_dir {
            fs::create_dir_all(dir)?;
        }
        Ok(Self {
            config,
            databases: RwLock::new(HashMap::new()),
            upgrades: AtomicU64::new(0),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            config: StorageConfig::in_memory(),
            databases: RwLock::new(HashMap::new()),
            upgrades: AtomicU64::new(0),
        }
    }

    /// Number of upgrade transactions opened since the engine was created
    pub fn upgrades_started(&self) -> u64 {
        self.upgrades.load(Ordering::SeqCst)
    }

    /// Validate database name to prevent path traversal
    fn validate_database_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(SqlError::Open("Database name cannot be empty".into()));
        }
        if name.contains("..") || name.contains('/') || name.contains('\\') || name.contains('\0') {
            return Err(SqlError::Open(format!(
                "Invalid database name '{}': contains forbidden characters",
                name
            )));
        }
        if name.len() > 255 {
            return Err(SqlError::Open("Database name too long".into()));
        }
        Ok(())
    }

    fn schema_path(&self, name: &str) -> Option<PathBuf> {
        self.config
            .data_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", name)))
    }

    /// Load a database schema from disk, or start an empty one
    fn load_schema(&self, name: &str) -> Result<DatabaseSchema> {
        match self.schema_path(name) {
            Some(path) if path.exists() => {
                let file = File::open(&path).map_err(|e| {
                    SqlError::Open(format!("unable to open database file {:?}: {}", path, e))
                })?;
                let schema: DatabaseSchema = serde_json::from_reader(BufReader::new(file))?;
                debug!("loaded database '{}' at version {}", name, schema.version);
                Ok(schema)
            }
            _ => Ok(DatabaseSchema::new(name)),
        }
    }

    fn save_schema(&self, schema: &DatabaseSchema) -> Result<()> {
        let path = match self.schema_path(&schema.name) {
            Some(path) => path,
            None => return Ok(()),
        };
        let temp_path = path.with_extension("json.tmp");

        // Atomic rename for crash safety
        let written = Self::write_schema(&temp_path, schema)
            .and_then(|()| fs::rename(&temp_path, &path).map_err(SqlError::from));
        if written.is_err() && temp_path.exists() {
            if let Err(e) = fs::remove_file(&temp_path) {
                warn!("could not remove {}: {}", temp_path.display(), e);
            }
        }
        written
    }

    fn write_schema(temp_path: &Path, schema: &DatabaseSchema) -> Result<()> {
        let file = File::create(temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, schema)?;
        writer.flush()?;
        Ok(())
    }

    fn state(&self, name: &str) -> Result<Arc<DatabaseState>> {
        Self::validate_database_name(name)?;
        if let Some(state) = self.databases.read().map_err(poisoned)?.get(name) {
            return Ok(Arc::clone(state));
        }

        let mut databases = self.databases.write().map_err(poisoned)?;
        if let Some(state) = databases.get(name) {
            return Ok(Arc::clone(state));
        }
        let state = Arc::new(DatabaseState {
            schema: RwLock::new(self.load_schema(name)?),
            upgrade_lock: Arc::new(Mutex::new(())),
        });
        databases.insert(name.to_string(), Arc::clone(&state));
        Ok(state)
    }

    fn snapshot(state: &DatabaseState) -> Result<DatabaseSchema> {
        Ok(state.schema.read().map_err(poisoned)?.clone())
    }
}

impl ObjectStoreEngine for StorageEngine {
    async fn open(&self, database: &str) -> Result<StoreConnection> {
        let state = self.state(database)?;
        let schema = Self::snapshot(&state)?;
        debug!("opened database '{}' at version {}", database, schema.version);
        Ok(StoreConnection::new(schema, false))
    }

    async fn open_for_upgrade(
        &self,
        database: &str,
        target_version: u64,
    ) -> Result<(StoreConnection, UpgradeTransaction)> {
        let state = self.state(database)?;
        let guard = Arc::clone(&state.upgrade_lock).lock_owned().await;

        let mut staged = Self::snapshot(&state)?;
        if target_version != staged.version + 1 {
            return Err(SqlError::Storage(format!(
                "cannot upgrade database '{}' from version {} to version {}",
                database, staged.version, target_version
            )));
        }
        staged.version = target_version;
        self.upgrades.fetch_add(1, Ordering::SeqCst);
        debug!("upgrading database '{}' to version {}", database, target_version);

        let connection = StoreConnection::new(staged.clone(), true);
        Ok((connection, UpgradeTransaction::new(staged, guard)))
    }

    async fn commit(&self, transaction: UpgradeTransaction) -> Result<()> {
        let (schema, _guard) = transaction.into_parts();
        let state = self.state(&schema.name)?;

        let current = state.schema.read().map_err(poisoned)?.version;
        if schema.version != current + 1 {
            return Err(SqlError::Commit(format!(
                "database '{}' moved to version {} during the upgrade",
                schema.name, current
            )));
        }

        self.save_schema(&schema)
            .map_err(|e| SqlError::Commit(format!("unable to persist '{}': {}", schema.name, e.detail())))?;

        info!("database '{}' upgraded to version {}", schema.name, schema.version);
        *state.schema.write().map_err(poisoned)? = schema;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{IndexOptions, ObjectStoreOptions};
    use std::time::Duration;

    async fn create_store(engine: &StorageEngine, db: &str, name: &str) {
        let version = engine.open(db).await.unwrap().version();
        let (_conn, mut tx) = engine.open_for_upgrade(db, version + 1).await.unwrap();
        let store = tx
            .create_object_store(name, ObjectStoreOptions { key_path: Some("id".into()), auto_increment: false })
            .unwrap();
        tx.create_index(&store, "name", "name", IndexOptions::default()).unwrap();
        engine.commit(tx).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_does_not_change_version() {
        let engine = StorageEngine::in_memory();
        assert_eq!(engine.open("app").await.unwrap().version(), 0);
        assert_eq!(engine.open("app").await.unwrap().version(), 0);
        assert_eq!(engine.upgrades_started(), 0);
    }

    #[tokio::test]
    async fn test_commit_bumps_version_and_exposes_metadata() {
        let engine = StorageEngine::in_memory();
        create_store(&engine, "app", "users").await;

        let conn = engine.open("app").await.unwrap();
        assert_eq!(conn.version(), 1);
        assert_eq!(engine.list_tables(&conn).unwrap(), vec!["users"]);
        assert_eq!(engine.list_columns(&conn, "users").unwrap(), vec!["id", "name"]);
        assert_eq!(engine.get_primary_key(&conn, "users").unwrap(), Some("id".to_string()));
    }

    #[tokio::test]
    async fn test_wrong_target_version_rejected() {
        let engine = StorageEngine::in_memory();
        let err = engine.open_for_upgrade("app", 2).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_aborted_upgrade_leaves_schema_unchanged() {
        let engine = StorageEngine::in_memory();
        let (_conn, mut tx) = engine.open_for_upgrade("app", 1).await.unwrap();
        tx.create_object_store("users", ObjectStoreOptions::default()).unwrap();
        tx.abort();

        let conn = engine.open("app").await.unwrap();
        assert_eq!(conn.version(), 0);
        assert!(engine.list_tables(&conn).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_object_store_is_idempotent() {
        let engine = StorageEngine::in_memory();
        let (_conn, mut tx) = engine.open_for_upgrade("app", 1).await.unwrap();
        let first = tx.create_object_store("users", ObjectStoreOptions::default()).unwrap();
        let second = tx.create_object_store("users", ObjectStoreOptions::default()).unwrap();
        assert_eq!(first, second);
        engine.commit(tx).await.unwrap();

        let conn = engine.open("app").await.unwrap();
        assert_eq!(engine.list_tables(&conn).unwrap(), vec!["users"]);
    }

    #[tokio::test]
    async fn test_duplicate_index_is_an_error() {
        let engine = StorageEngine::in_memory();
        let (_conn, mut tx) = engine.open_for_upgrade("app", 1).await.unwrap();
        let store = tx.create_object_store("users", ObjectStoreOptions::default()).unwrap();
        tx.create_index(&store, "name", "name", IndexOptions::default()).unwrap();
        let err = tx.create_index(&store, "name", "name", IndexOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_metadata_refused_mid_upgrade() {
        let engine = StorageEngine::in_memory();
        let (conn, _tx) = engine.open_for_upgrade("app", 1).await.unwrap();
        assert!(conn.is_upgrading());
        assert!(engine.list_tables(&conn).is_err());
    }

    #[tokio::test]
    async fn test_second_upgrade_waits_for_first() {
        let engine = StorageEngine::in_memory();
        let (_conn, tx) = engine.open_for_upgrade("app", 1).await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(50), engine.open_for_upgrade("app", 2)).await;
        assert!(waiting.is_err());

        engine.commit(tx).await.unwrap();
        let (_conn, tx) = engine.open_for_upgrade("app", 2).await.unwrap();
        assert_eq!(tx.version(), 2);
    }

    #[tokio::test]
    async fn test_schema_persists_across_engines() {
        let dir = tempfile::tempdir().unwrap();
        {
            let engine = StorageEngine::new(StorageConfig::persistent(dir.path())).unwrap();
            create_store(&engine, "app", "users").await;
        }
        assert!(dir.path().join("app.json").exists());

        let engine = StorageEngine::new(StorageConfig::persistent(dir.path())).unwrap();
        let conn = engine.open("app").await.unwrap();
        assert_eq!(conn.version(), 1);
        assert_eq!(engine.list_tables(&conn).unwrap(), vec!["users"]);
    }

    #[tokio::test]
    async fn test_failed_persist_is_a_commit_error() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let engine = StorageEngine::new(StorageConfig::persistent(&data_dir)).unwrap();
        engine.open("app").await.unwrap();
        fs::remove_dir_all(&data_dir).unwrap();

        let (_conn, mut tx) = engine.open_for_upgrade("app", 1).await.unwrap();
        tx.create_object_store("users", ObjectStoreOptions::default()).unwrap();
        let err = engine.commit(tx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Commit);

        let conn = engine.open("app").await.unwrap();
        assert_eq!(conn.version(), 0);
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let engine = StorageEngine::new(StorageConfig::persistent(dir.path())).unwrap();
        engine.open("app").await.unwrap();

        // A directory in place of the schema file makes the rename fail
        let schema_file = dir.path().join("app.json");
        if schema_file.exists() {
            fs::remove_file(&schema_file).unwrap();
        }
        fs::create_dir(&schema_file).unwrap();
        fs::write(schema_file.join("keep"), b"x").unwrap();

        let (_conn, mut tx) = engine.open_for_upgrade("app", 1).await.unwrap();
        tx.create_object_store("users", ObjectStoreOptions::default()).unwrap();
        let err = engine.commit(tx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Commit);

        assert!(!dir.path().join("app.json.tmp").exists());
        assert_eq!(engine.open("app").await.unwrap().version(), 0);
    }

    #[tokio::test]
    async fn test_invalid_database_name() {
        let engine = StorageEngine::in_memory();
        let err = engine.open("../etc").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Open);
    }
}

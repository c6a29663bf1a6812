//! Schema model, storage handles and query results shared by the engine,
//! the executor and callers.

use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;

use crate::error::{Result, SqlError};

//=============================================================================
// Schema model
//=============================================================================

/// Secondary index on an object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub key_path: String,
    pub unique: bool,
}

/// One object store (the storage-side counterpart of a table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStoreSchema {
    pub name: String,
    pub key_path: Option<String>,
    pub auto_increment: bool,
    /// Indexes in creation order
    pub indexes: Vec<IndexSchema>,
}

impl ObjectStoreSchema {
    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// Full schema of one named database at one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub name: String,
    pub version: u64,
    /// Object stores in creation order
    pub stores: Vec<ObjectStoreSchema>,
}

impl DatabaseSchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: 0,
            stores: Vec::new(),
        }
    }

    pub fn store(&self, name: &str) -> Option<&ObjectStoreSchema> {
        self.stores.iter().find(|s| s.name == name)
    }

    fn store_mut(&mut self, name: &str) -> Option<&mut ObjectStoreSchema> {
        self.stores.iter_mut().find(|s| s.name == name)
    }
}

/// Options for a new object store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectStoreOptions {
    pub key_path: Option<String>,
    pub auto_increment: bool,
}

/// Options for a new index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub unique: bool,
}

//=============================================================================
// Connections and upgrade transactions
//=============================================================================

/// A connection to one database at one version. It carries a snapshot of
/// the schema taken when it was opened.
#[derive(Debug, Clone)]
pub struct StoreConnection {
    schema: DatabaseSchema,
    upgrading: bool,
}

impl StoreConnection {
    pub(crate) fn new(schema: DatabaseSchema, upgrading: bool) -> Self {
        Self { schema, upgrading }
    }

    pub fn database(&self) -> &str {
        &self.schema.name
    }

    pub fn version(&self) -> u64 {
        self.schema.version
    }

    /// True for the connection handed out with an upgrade transaction
    pub fn is_upgrading(&self) -> bool {
        self.upgrading
    }

    /// Schema snapshot; refused while the connection is mid-upgrade
    pub fn schema(&self) -> Result<&DatabaseSchema> {
        if self.upgrading {
            return Err(SqlError::Storage(format!(
                "database '{}' is being upgraded; reopen it to read metadata",
                self.schema.name
            )));
        }
        Ok(&self.schema)
    }
}

/// Handle to an object store inside an upgrade transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreHandle {
    pub name: String,
}

/// The only context in which object stores and indexes can be created.
///
/// Changes are staged on a copy of the schema and become visible when the
/// engine commits the transaction. Dropping it without commit aborts. It
/// holds the database's upgrade lock for its whole lifetime.
#[derive(Debug)]
pub struct UpgradeTransaction {
    schema: DatabaseSchema,
    _upgrade_lock: OwnedMutexGuard<()>,
}

impl UpgradeTransaction {
    pub(crate) fn new(schema: DatabaseSchema, upgrade_lock: OwnedMutexGuard<()>) -> Self {
        Self { schema, _upgrade_lock: upgrade_lock }
    }

    pub fn database(&self) -> &str {
        &self.schema.name
    }

    /// Version this transaction upgrades to
    pub fn version(&self) -> u64 {
        self.schema.version
    }

    /// Create an object store, or return the existing one of that name
    pub fn create_object_store(
        &mut self,
        name: &str,
        options: ObjectStoreOptions,
    ) -> Result<ObjectStoreHandle> {
        if self.schema.store(name).is_some() {
            log::debug!("object store '{}' already exists", name);
            return Ok(ObjectStoreHandle { name: name.to_string() });
        }
        log::debug!(
            "creating object store '{}' (key path {:?}, auto increment {})",
            name, options.key_path, options.auto_increment
        );
        self.schema.stores.push(ObjectStoreSchema {
            name: name.to_string(),
            key_path: options.key_path,
            auto_increment: options.auto_increment,
            indexes: Vec::new(),
        });
        Ok(ObjectStoreHandle { name: name.to_string() })
    }

    pub fn create_index(
        &mut self,
        store: &ObjectStoreHandle,
        index_name: &str,
        key_path: &str,
        options: IndexOptions,
    ) -> Result<()> {
        let schema = self.schema.store_mut(&store.name).ok_or_else(|| {
            SqlError::Storage(format!("no such object store: {}", store.name))
        })?;
        if schema.index(index_name).is_some() {
            return Err(SqlError::Storage(format!(
                "index '{}' already exists on '{}'",
                index_name, store.name
            )));
        }
        log::debug!("creating index '{}' on '{}'", index_name, store.name);
        schema.indexes.push(IndexSchema {
            name: index_name.to_string(),
            key_path: key_path.to_string(),
            unique: options.unique,
        });
        Ok(())
    }

    /// Discard every staged change
    pub fn abort(self) {
        log::debug!("upgrade of '{}' to version {} aborted", self.schema.name, self.schema.version);
    }

    /// Staged schema plus the upgrade lock, consumed by the engine on
    /// commit so the lock outlives the schema swap
    pub(crate) fn into_parts(self) -> (DatabaseSchema, OwnedMutexGuard<()>) {
        (self.schema, self._upgrade_lock)
    }
}

//=============================================================================
// Query results
//=============================================================================

/// Rows returned by a query, with a read cursor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    rows: Vec<serde_json::Value>,
    position: usize,
}

impl ResultSet {
    /// Result of a schema change: no rows
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<serde_json::Value>) -> Self {
        Self { rows, position: 0 }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[serde_json::Value] {
        &self.rows
    }

    /// Next row, or `None` once the cursor is past the end
    pub fn next_row(&mut self) -> Option<&serde_json::Value> {
        let row = self.rows.get(self.position)?;
        self.position += 1;
        Some(row)
    }
}

use crate::error::{Result, SqlError};
use crate::types::{ObjectStoreSchema, StoreConnection, UpgradeTransaction};

/// Interface of a versioned, transactional object-store engine.
///
/// The executor drives schema changes through it: open the database at its
/// current version, open it again for an upgrade to `current + 1`, stage
/// object stores and indexes on the returned transaction, then commit.
#[allow(async_fn_in_trait)]
pub trait ObjectStoreEngine: Send + Sync {
    /// Open a database at its current version, creating it empty at
    /// version 0 if it does not exist. Never changes the version.
    async fn open(&self, database: &str) -> Result<StoreConnection>;

    /// Open a database for an upgrade to `target_version`, which must be
    /// the current version plus one. Waits while another upgrade of the
    /// same database is in progress.
    async fn open_for_upgrade(
        &self,
        database: &str,
        target_version: u64,
    ) -> Result<(StoreConnection, UpgradeTransaction)>;

    /// Make the staged changes of `transaction` durable and visible
    async fn commit(&self, transaction: UpgradeTransaction) -> Result<()>;

    /// Object store names, in creation order
    fn list_tables(&self, connection: &StoreConnection) -> Result<Vec<String>> {
        Ok(connection.schema()?.stores.iter().map(|s| s.name.clone()).collect())
    }

    /// The key path (if any) followed by the key path of every index
    fn list_columns(&self, connection: &StoreConnection, table: &str) -> Result<Vec<String>> {
        let store = self.describe_store(connection, table)?;
        let mut columns: Vec<String> = store.key_path.iter().cloned().collect();
        columns.extend(store.indexes.iter().map(|i| i.key_path.clone()));
        Ok(columns)
    }

    fn get_primary_key(&self, connection: &StoreConnection, table: &str) -> Result<Option<String>> {
        Ok(self.describe_store(connection, table)?.key_path)
    }

    fn describe_store(&self, connection: &StoreConnection, table: &str) -> Result<ObjectStoreSchema> {
        connection
            .schema()?
            .store(table)
            .cloned()
            .ok_or_else(|| SqlError::Storage(format!("no such table: {}", table)))
    }
}

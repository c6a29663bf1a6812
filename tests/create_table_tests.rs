use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use storesql::error::ErrorKind;
use storesql::types::{StoreConnection, UpgradeTransaction};
use storesql::{
    Config, Connection, Driver, ObjectStoreEngine, ParserConfig, Result, SqlError, StorageConfig,
    StorageEngine,
};
use tempfile::TempDir;

async fn connected(driver: &Driver, database: &str) -> Connection<StorageEngine> {
    let mut conn = driver.create_connection(database).unwrap();
    conn.connect().await.unwrap();
    conn
}

async fn tables<E: ObjectStoreEngine>(driver: &Driver<E>, database: &str) -> Vec<String> {
    let conn = driver.engine().open(database).await.unwrap();
    driver.engine().list_tables(&conn).unwrap()
}

fn setup_persistent_driver() -> (TempDir, Driver) {
    let temp_dir = TempDir::new().unwrap();
    let driver = Driver::new(Config::persistent(temp_dir.path())).unwrap();
    (temp_dir, driver)
}

/// Engine wrapper whose commits fail on demand
struct FailingEngine {
    inner: StorageEngine,
    fail_commit: AtomicBool,
}

impl FailingEngine {
    fn new() -> Self {
        Self {
            inner: StorageEngine::in_memory(),
            fail_commit: AtomicBool::new(true),
        }
    }
}

impl ObjectStoreEngine for FailingEngine {
    async fn open(&self, database: &str) -> Result<StoreConnection> {
        self.inner.open(database).await
    }

    async fn open_for_upgrade(
        &self,
        database: &str,
        target_version: u64,
    ) -> Result<(StoreConnection, UpgradeTransaction)> {
        self.inner.open_for_upgrade(database, target_version).await
    }

    async fn commit(&self, transaction: UpgradeTransaction) -> Result<()> {
        if self.fail_commit.load(Ordering::SeqCst) {
            transaction.abort();
            return Err(SqlError::Commit("disk full".to_string()));
        }
        self.inner.commit(transaction).await
    }
}

#[tokio::test]
async fn test_create_table_end_to_end() {
    let driver = Driver::new(Config::in_memory()).unwrap();
    let mut conn = connected(&driver, "app").await;
    assert_eq!(conn.version(), Some(0));

    // 1. CREATE TABLE resolves with an empty result
    let mut result = conn
        .query("CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, age INTEGER)")
        .await
        .unwrap();
    assert!(result.is_empty());
    assert!(result.next_row().is_none());

    // 2. The database moved up one version
    assert_eq!(conn.version(), Some(1));
    assert_eq!(driver.engine().upgrades_started(), 1);

    // 3. The object store and its indexes are visible on a fresh open
    let store = driver.engine().open("app").await.unwrap();
    assert_eq!(driver.engine().list_tables(&store).unwrap(), vec!["users"]);
    assert_eq!(
        driver.engine().list_columns(&store, "users").unwrap(),
        vec!["id", "name", "age"]
    );
    assert_eq!(
        driver.engine().get_primary_key(&store, "users").unwrap(),
        Some("id".to_string())
    );
    let schema = driver.engine().describe_store(&store, "users").unwrap();
    assert!(schema.auto_increment);
    assert!(schema.indexes.iter().all(|i| !i.unique && i.name == i.key_path));
}

#[tokio::test]
async fn test_key_column_listed_first() {
    let driver = Driver::new(Config::in_memory()).unwrap();
    let mut conn = connected(&driver, "app").await;

    conn.query("CREATE TABLE t (name TEXT, id INTEGER PRIMARY KEY, age INTEGER)")
        .await
        .unwrap();

    let store = driver.engine().open("app").await.unwrap();
    assert_eq!(driver.engine().list_columns(&store, "t").unwrap(), vec!["id", "name", "age"]);
}

#[tokio::test]
async fn test_table_without_primary_key() {
    let driver = Driver::new(Config::in_memory()).unwrap();
    let mut conn = connected(&driver, "app").await;

    conn.query("CREATE TABLE log (msg TEXT, level INTEGER)").await.unwrap();

    let store = driver.engine().open("app").await.unwrap();
    assert_eq!(driver.engine().get_primary_key(&store, "log").unwrap(), None);
    assert_eq!(driver.engine().list_columns(&store, "log").unwrap(), vec!["msg", "level"]);
}

#[tokio::test]
async fn test_query_before_connect() {
    let driver = Driver::new(Config::in_memory()).unwrap();
    let mut conn = driver.create_connection("app").unwrap();

    let err = conn.query("CREATE TABLE t (a INTEGER)").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Open);
    assert_eq!(
        err.to_string(),
        "SQLITE_CANTOPEN: result code 14: database connection is not open"
    );

    conn.connect().await.unwrap();
    conn.close();
    assert!(!conn.is_connected());
    assert!(conn.query("CREATE TABLE t (a INTEGER)").await.is_err());
}

#[tokio::test]
async fn test_existing_table() {
    let driver = Driver::new(Config::in_memory()).unwrap();
    let mut conn = connected(&driver, "app").await;
    conn.query("CREATE TABLE users (id INTEGER PRIMARY KEY)").await.unwrap();

    // Without IF NOT EXISTS the second create fails and nothing is upgraded
    let err = conn.query("CREATE TABLE users (id INTEGER PRIMARY KEY)").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert_eq!(err.detail(), "table users already exists");

    // With IF NOT EXISTS it is a no-op
    let result = conn
        .query("CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY)")
        .await
        .unwrap();
    assert!(result.is_empty());

    assert_eq!(conn.version(), Some(1));
    assert_eq!(driver.engine().upgrades_started(), 1);
}

#[tokio::test]
async fn test_multiple_statements_in_one_query() {
    let driver = Driver::new(Config::in_memory()).unwrap();
    let mut conn = connected(&driver, "app").await;

    conn.query("CREATE TABLE a (x INTEGER); CREATE TABLE b (y INTEGER);")
        .await
        .unwrap();

    assert_eq!(conn.version(), Some(2));
    assert_eq!(tables(&driver, "app").await, vec!["a", "b"]);
}

#[tokio::test]
async fn test_databases_are_independent() {
    let driver = Driver::new(Config::in_memory()).unwrap();
    let mut app = connected(&driver, "app").await;
    let other = connected(&driver, "other").await;

    app.query("CREATE TABLE t (a INTEGER)").await.unwrap();

    assert_eq!(app.version(), Some(1));
    assert_eq!(other.version(), Some(0));
    assert!(tables(&driver, "other").await.is_empty());
}

#[tokio::test]
async fn test_concurrent_create_tables() {
    let driver = Driver::new(Config::in_memory()).unwrap();
    let mut first = connected(&driver, "app").await;
    let mut second = connected(&driver, "app").await;

    let (a, b) = tokio::join!(
        first.query("CREATE TABLE a (x INTEGER PRIMARY KEY)"),
        second.query("CREATE TABLE b (y INTEGER PRIMARY KEY)"),
    );
    a.unwrap();
    b.unwrap();

    let store = driver.engine().open("app").await.unwrap();
    assert_eq!(store.version(), 2);
    let mut names = driver.engine().list_tables(&store).unwrap();
    names.sort();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn test_commit_failure_leaves_schema_unchanged() {
    let engine = Arc::new(FailingEngine::new());
    let driver = Driver::with_engine(Arc::clone(&engine), Config::in_memory());
    let mut conn = driver.create_connection("app").unwrap();
    conn.connect().await.unwrap();

    // 1. The commit error surfaces with statement context
    let err = conn.query("CREATE TABLE t (a INTEGER PRIMARY KEY)").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Commit);
    assert_eq!(err.detail(), "CREATE TABLE t: disk full");
    assert!(err.to_string().starts_with("SQLITE_ABORT: result code 4:"));

    // 2. Nothing became visible
    assert_eq!(conn.version(), Some(0));
    assert!(tables(&driver, "app").await.is_empty());

    // 3. The upgrade lock was released, so a retry goes through
    engine.fail_commit.store(false, Ordering::SeqCst);
    conn.query("CREATE TABLE t (a INTEGER PRIMARY KEY)").await.unwrap();
    assert_eq!(conn.version(), Some(1));
}

#[tokio::test]
async fn test_schema_persists_across_drivers() {
    let (temp_dir, driver) = setup_persistent_driver();
    {
        let mut conn = connected(&driver, "app").await;
        conn.query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();
    }
    drop(driver);

    let driver = Driver::new(Config::persistent(temp_dir.path())).unwrap();
    let mut conn = connected(&driver, "app").await;
    assert_eq!(conn.version(), Some(1));
    assert_eq!(tables(&driver, "app").await, vec!["users"]);

    // Reopening never upgrades
    assert_eq!(driver.engine().upgrades_started(), 0);

    conn.query("CREATE TABLE orders (id INTEGER PRIMARY KEY)").await.unwrap();
    assert_eq!(conn.version(), Some(2));
}

#[tokio::test]
async fn test_driver_over_existing_engine() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Arc::new(StorageEngine::new(StorageConfig::persistent(temp_dir.path())).unwrap());
    let driver = Driver::with_engine(engine, Config::default());

    let mut conn = driver.create_connection("app").unwrap();
    conn.connect().await.unwrap();
    conn.query("CREATE TABLE t (a INTEGER)").await.unwrap();
    assert!(temp_dir.path().join("app.json").exists());
}

#[tokio::test]
async fn test_parse_errors_do_not_touch_storage() {
    let driver = Driver::new(Config::in_memory()).unwrap();
    let mut conn = connected(&driver, "app").await;

    let err = conn.query("CREATE TABLE t (a INTEGER").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.detail(), "incomplete input");
    assert_eq!(driver.engine().upgrades_started(), 0);
}

#[tokio::test]
async fn test_unsupported_statements() {
    let driver = Driver::new(Config::in_memory()).unwrap();
    let mut conn = connected(&driver, "app").await;

    let err = conn.query("SELECT * FROM t").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);

    let err = conn.query("CREATE TABLE main.t (a INTEGER)").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);

    let err = conn.query("CREATE TABLE t AS SELECT 1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);

    assert_eq!(driver.engine().upgrades_started(), 0);
}

#[tokio::test]
async fn test_dialect_controls_double_quotes() {
    let driver = Driver::new(Config::in_memory()).unwrap();
    let mut conn = connected(&driver, "app").await;
    conn.query("CREATE TABLE \"quoted\" (\"a\" INTEGER)").await.unwrap();
    assert_eq!(tables(&driver, "app").await, vec!["quoted"]);

    let config = Config { parser: ParserConfig::mysql(), ..Config::in_memory() };
    let driver = Driver::new(config).unwrap();
    let mut conn = connected(&driver, "app").await;
    let err = conn.query("CREATE TABLE \"quoted\" (a INTEGER)").await.unwrap_err();
    assert_eq!(err.detail(), "near \"\"quoted\"\": syntax error");

    conn.query("CREATE TABLE `quoted` (a INTEGER)").await.unwrap();
    assert_eq!(tables(&driver, "app").await, vec!["quoted"]);
}

//! storesql - SQL front end for a versioned object-store database
//!
//! SQL text is tokenized, parsed by a recursive-descent parser into an AST,
//! and `CREATE TABLE` statements are compiled into object-store and index
//! creation inside an upgrade transaction of the storage engine.
//!
//! ```text
//! SQL text ─► lexer ─► parser ─► executor ─► ObjectStoreEngine
//!                                  │
//!                       CreateTableOperation
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub mod lexer;
pub mod parser;
pub mod executor;
pub mod engines;
pub mod storage;
pub mod types;
pub mod error;
pub mod connection;

pub use crate::connection::Connection;
pub use crate::engines::ObjectStoreEngine;
pub use crate::error::{ErrorKind, Result, SqlError};
pub use crate::parser::{Dialect, Parser, ParserConfig, Statement};
pub use crate::storage::{StorageConfig, StorageEngine};
pub use crate::types::ResultSet;

use crate::executor::Executor;

/// Driver configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Directory for database files; `None` keeps databases in memory
    pub data_dir: Option<PathBuf>,
    pub parser: ParserConfig,
}

impl Config {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn persistent(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            ..Self::default()
        }
    }
}

/// Entry point: hands out connections to named databases of one engine
pub struct Driver<E: ObjectStoreEngine = StorageEngine> {
    engine: Arc<E>,
    config: Config,
    schema_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Driver<StorageEngine> {
    /// Create a driver backed by the built-in storage engine
    pub fn new(config: Config) -> Result<Self> {
        let engine = StorageEngine::new(StorageConfig {
            data_dir: config.data_dir.clone(),
        })?;
        Ok(Self::with_engine(Arc::new(engine), config))
    }
}

impl<E: ObjectStoreEngine> Driver<E> {
    pub fn with_engine(engine: Arc<E>, config: Config) -> Self {
        Self {
            engine,
            config,
            schema_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create an unconnected connection to `database`
    pub fn create_connection(&self, database: &str) -> Result<Connection<E>> {
        let schema_lock = {
            let mut locks = self
                .schema_locks
                .lock()
                .map_err(|_| SqlError::Storage("schema lock table poisoned".to_string()))?;
            Arc::clone(locks.entry(database.to_string()).or_default())
        };
        let executor = Executor::new(Arc::clone(&self.engine), database, schema_lock);
        Ok(Connection::new(executor, self.config.parser.clone()))
    }
}

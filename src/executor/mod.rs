//! Statement executor
//!
//! The executor takes parsed statements and runs them against an
//! [`ObjectStoreEngine`] for one database.
//!
//! ## Execution Model
//!
//! 1. Parse SQL → AST (done by parser)
//! 2. Compile the statement into storage operations
//! 3. Run them inside an upgrade transaction and await the commit
//! 4. Return results
//!
//! Only `CREATE TABLE` changes storage today; `SELECT` parses but is not
//! executed.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::engines::ObjectStoreEngine;
use crate::error::{Result, SqlError};
use crate::parser::Statement;
use crate::types::ResultSet;

pub mod ddl;

pub use ddl::{CreateTableOperation, IndexPlan, SchemaPlan};

/// Executes statements against one database of an engine
pub struct Executor<E: ObjectStoreEngine> {
    engine: Arc<E>,
    database: String,
    /// Serializes schema changes on this database. Shared by every
    /// connection to it, so computing the next version and opening the
    /// upgrade happen as one step.
    schema_lock: Arc<Mutex<()>>,
}

impl<E: ObjectStoreEngine> Executor<E> {
    pub fn new(engine: Arc<E>, database: &str, schema_lock: Arc<Mutex<()>>) -> Self {
        Self {
            engine,
            database: database.to_string(),
            schema_lock,
        }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub(crate) fn schema_lock(&self) -> &Arc<Mutex<()>> {
        &self.schema_lock
    }

    /// Execute a parsed statement
    pub async fn execute(&self, stmt: Statement) -> Result<ResultSet> {
        match stmt {
            Statement::CreateTable(create) => CreateTableOperation::new(self, create).execute().await,
            Statement::Select(_) => Err(SqlError::not_implemented("SELECT execution")),
        }
    }
}

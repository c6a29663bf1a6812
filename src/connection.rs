//! Client connections
//!
//! A [`Connection`] is bound to one database. `connect` opens it at its
//! current version; `query` parses SQL and executes every statement in
//! order.

use log::{debug, info};

use crate::engines::ObjectStoreEngine;
use crate::error::{Result, SqlError};
use crate::executor::Executor;
use crate::parser::{Parser, ParserConfig, Statement};
use crate::types::{ResultSet, StoreConnection};

pub struct Connection<E: ObjectStoreEngine> {
    executor: Executor<E>,
    parser: ParserConfig,
    /// Snapshot of the database as of the last open; `None` until connected
    store: Option<StoreConnection>,
}

impl<E: ObjectStoreEngine> Connection<E> {
    pub(crate) fn new(executor: Executor<E>, parser: ParserConfig) -> Self {
        Self {
            executor,
            parser,
            store: None,
        }
    }

    pub fn database(&self) -> &str {
        self.executor.database()
    }

    /// Open the database at its current version. Never upgrades it.
    pub async fn connect(&mut self) -> Result<()> {
        let store = self.executor.engine().open(self.executor.database()).await?;
        info!(
            "connected to '{}' at version {}",
            self.executor.database(),
            store.version()
        );
        self.store = Some(store);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    /// Version seen by this connection, refreshed after every schema change
    pub fn version(&self) -> Option<u64> {
        self.store.as_ref().map(|s| s.version())
    }

    pub fn store(&self) -> Option<&StoreConnection> {
        self.store.as_ref()
    }

    /// Execute every statement in `sql`, returning the result of the last
    pub async fn query(&mut self, sql: &str) -> Result<ResultSet> {
        if self.store.is_none() {
            return Err(SqlError::Open("database connection is not open".to_string()));
        }

        let statements = Parser::parse_all(sql, &self.parser)?;
        debug!("executing {} statement(s)", statements.len());

        let mut result = ResultSet::empty();
        for stmt in statements {
            let changes_schema = matches!(stmt, Statement::CreateTable(_));
            result = self.executor.execute(stmt).await?;
            if changes_schema {
                let store = self.executor.engine().open(self.executor.database()).await?;
                self.store = Some(store);
            }
        }
        Ok(result)
    }

    pub fn close(&mut self) {
        if self.store.take().is_some() {
            info!("connection to '{}' closed", self.executor.database());
        }
    }
}

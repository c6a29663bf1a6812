use log::{debug, info, warn};

use crate::engines::ObjectStoreEngine;
use crate::error::{Result, SqlError};
use crate::executor::Executor;
use crate::parser::{CreateTableBody, CreateTableStmt, EntityName, TableElement};
use crate::types::{IndexOptions, ObjectStoreOptions, ResultSet};

/// One index to create on the new object store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPlan {
    pub name: String,
    pub key_path: String,
    pub options: IndexOptions,
}

/// Storage operations a `CREATE TABLE` compiles to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPlan {
    pub store_name: String,
    pub options: ObjectStoreOptions,
    /// One non-unique index per non-key column, in column order
    pub indexes: Vec<IndexPlan>,
}

impl SchemaPlan {
    /// Compile a `CREATE TABLE` statement. Pure: touches no storage.
    pub fn compile(create: &CreateTableStmt) -> Result<SchemaPlan> {
        let store_name = match &create.name {
            EntityName::Identifier(name) => name.clone(),
            EntityName::Member { schema, name } => {
                return Err(SqlError::Unsupported(format!(
                    "schema-qualified table names are not supported: {}.{}",
                    schema, name
                )))
            }
        };

        let elements = match &create.body {
            CreateTableBody::Columns { columns, .. } => columns,
            CreateTableBody::AsSelect(_) => {
                return Err(SqlError::Unsupported(format!(
                    "CREATE TABLE {} AS SELECT is not supported",
                    store_name
                )))
            }
        };

        for element in elements {
            match element {
                TableElement::Constraint(constraint) => {
                    warn!("table {}: ignoring table constraint {:?}", store_name, constraint.kind)
                }
                TableElement::Like(_) => warn!("table {}: ignoring LIKE element", store_name),
                TableElement::Column(_) => {}
            }
        }

        let columns = create.column_defs();
        // The first PRIMARY KEY column wins; later ones become plain indexes
        let key_column = columns.iter().find(|c| c.primary_key().is_some());

        let options = ObjectStoreOptions {
            key_path: key_column.map(|c| c.name.clone()),
            auto_increment: key_column.map_or(false, |c| c.is_auto_increment()),
        };

        let indexes = columns
            .iter()
            .filter(|c| Some(c.name.as_str()) != options.key_path.as_deref())
            .map(|c| IndexPlan {
                name: c.name.clone(),
                key_path: c.name.clone(),
                options: IndexOptions { unique: false },
            })
            .collect();

        Ok(SchemaPlan { store_name, options, indexes })
    }
}

/// Executes one `CREATE TABLE` as an upgrade of its database
pub struct CreateTableOperation<'a, E: ObjectStoreEngine> {
    executor: &'a Executor<E>,
    statement: CreateTableStmt,
}

impl<'a, E: ObjectStoreEngine> CreateTableOperation<'a, E> {
    pub fn new(executor: &'a Executor<E>, statement: CreateTableStmt) -> Self {
        Self { executor, statement }
    }

    pub fn plan(&self) -> Result<SchemaPlan> {
        SchemaPlan::compile(&self.statement)
    }

    /// Create the object store and its indexes; resolves once the upgrade
    /// transaction has committed
    pub async fn execute(self) -> Result<ResultSet> {
        let plan = self.plan()?;
        let context = format!("CREATE TABLE {}", plan.store_name);
        let storage_err = |e: SqlError| e.with_context(&context);

        let engine = self.executor.engine();
        let database = self.executor.database();

        let _schema_lock = self.executor.schema_lock().lock().await;

        let current = {
            let conn = engine.open(database).await.map_err(storage_err)?;
            let tables = engine.list_tables(&conn).map_err(storage_err)?;
            if tables.iter().any(|t| *t == plan.store_name) {
                if self.statement.if_not_exists {
                    info!("table {} already exists, skipping", plan.store_name);
                    return Ok(ResultSet::empty());
                }
                return Err(SqlError::Schema(format!("table {} already exists", plan.store_name)));
            }
            conn.version()
        };

        if self.statement.temporary {
            debug!("table {} is TEMPORARY; creating it as a regular object store", plan.store_name);
        }

        let (_conn, mut tx) = engine
            .open_for_upgrade(database, current + 1)
            .await
            .map_err(storage_err)?;

        let store = tx
            .create_object_store(&plan.store_name, plan.options.clone())
            .map_err(storage_err)?;
        for index in &plan.indexes {
            tx.create_index(&store, &index.name, &index.key_path, index.options)
                .map_err(storage_err)?;
        }

        engine.commit(tx).await.map_err(storage_err)?;
        info!(
            "created table {} in '{}' at version {}",
            plan.store_name,
            database,
            current + 1
        );
        Ok(ResultSet::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parser::{Parser, Statement};

    fn plan(sql: &str) -> Result<SchemaPlan> {
        match Parser::parse(sql)? {
            Statement::CreateTable(create) => SchemaPlan::compile(&create),
            other => panic!("expected CREATE TABLE, got {:?}", other),
        }
    }

    fn index_names(plan: &SchemaPlan) -> Vec<&str> {
        plan.indexes.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn test_primary_key_becomes_key_path() {
        let plan = plan("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)").unwrap();
        assert_eq!(plan.store_name, "users");
        assert_eq!(plan.options.key_path.as_deref(), Some("id"));
        assert!(!plan.options.auto_increment);
        assert_eq!(index_names(&plan), vec!["name", "age"]);
        assert!(plan.indexes.iter().all(|i| !i.options.unique && i.key_path == i.name));
    }

    #[test]
    fn test_autoincrement_primary_key() {
        let plan = plan("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT)").unwrap();
        assert_eq!(plan.options.key_path.as_deref(), Some("id"));
        assert!(plan.options.auto_increment);
    }

    #[test]
    fn test_standalone_auto_increment() {
        let plan = plan("CREATE TABLE t (id INT AUTO_INCREMENT PRIMARY KEY, v TEXT)").unwrap();
        assert!(plan.options.auto_increment);
    }

    #[test]
    fn test_no_primary_key() {
        let plan = plan("CREATE TABLE log (msg TEXT, at TIMESTAMP)").unwrap();
        assert_eq!(plan.options.key_path, None);
        assert!(!plan.options.auto_increment);
        assert_eq!(index_names(&plan), vec!["msg", "at"]);
    }

    #[test]
    fn test_first_primary_key_wins() {
        let plan = plan("CREATE TABLE t (a INTEGER PRIMARY KEY, b INTEGER PRIMARY KEY, c TEXT)").unwrap();
        assert_eq!(plan.options.key_path.as_deref(), Some("a"));
        assert_eq!(index_names(&plan), vec!["b", "c"]);
    }

    #[test]
    fn test_table_constraints_are_ignored() {
        let plan = plan("CREATE TABLE t (a INTEGER, b TEXT, PRIMARY KEY (a, b))").unwrap();
        assert_eq!(plan.options.key_path, None);
        assert_eq!(index_names(&plan), vec!["a", "b"]);
    }

    #[test]
    fn test_qualified_name_is_unsupported() {
        let err = plan("CREATE TABLE main.t (a INTEGER)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_as_select_is_unsupported() {
        let err = plan("CREATE TABLE t AS SELECT a FROM s").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}

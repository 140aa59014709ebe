use std::path::{Path, PathBuf};

use log::debug;

use crate::{
    executor::{
        query::{Query, QueryResult, QueryType},
        query_executor::{ExecutionContext, QueryHandler},
    },
    storage::{schema::TableSchema, table_store::TableStore},
    types::{RecordIndex, error::DatabaseError, row::Row, value::Value},
};

/// Trait for inserting data into database tables
pub trait Inserter {
    /// Insert a single row, returning its record index
    fn insert(&mut self, row: Row) -> Result<RecordIndex, DatabaseError>;

    /// Insert multiple rows in order
    fn insert_batch(&mut self, rows: Vec<Row>) -> Result<Vec<RecordIndex>, DatabaseError>;

    /// Get the table name this inserter operates on
    fn table_name(&self) -> &str;
}

/// Appends rows to one table file, coercing textual literals to the
/// column types of the table.
pub struct TableInserter {
    store: TableStore,
    table_name: String,
    path: PathBuf,
    schema: TableSchema,
}

impl TableInserter {
    pub fn new(store: &TableStore, table_name: &str, path: &Path) -> Result<Self, DatabaseError> {
        let schema = store.read_schema(path)?;
        Ok(Self {
            store: store.clone(),
            table_name: table_name.to_string(),
            path: path.to_path_buf(),
            schema,
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Coerce and validate `values` without writing anything.
    pub fn prepare(&self, values: &[Value]) -> Result<Row, DatabaseError> {
        let values = values
            .iter()
            .zip(&self.schema.columns)
            .map(|(value, data_type)| value.coerce_to(data_type))
            .chain(values.iter().skip(self.schema.len()).cloned())
            .collect();
        let row = Row::new(values);
        row.validate(&self.schema)?;
        Ok(row)
    }
}

impl Inserter for TableInserter {
    fn insert(&mut self, row: Row) -> Result<RecordIndex, DatabaseError> {
        let row = self.prepare(&row.values)?;
        let index = self.store.add_record(&self.path, &row.values)?;
        debug!("Inserted record {} into '{}'", index, self.table_name);
        Ok(index)
    }

    fn insert_batch(&mut self, rows: Vec<Row>) -> Result<Vec<RecordIndex>, DatabaseError> {
        rows.into_iter().map(|row| self.insert(row)).collect()
    }

    fn table_name(&self) -> &str {
        &self.table_name
    }
}

pub struct InsertHandler;

impl QueryHandler for InsertHandler {
    fn can_handle(&self, query_type: QueryType) -> bool {
        query_type == QueryType::Insert
    }

    fn handle(&self, query: &Query, ctx: &mut ExecutionContext) -> Result<QueryResult, DatabaseError> {
        let name = ctx.table_name(query)?;
        let path = ctx.require_table(name)?;
        let mut inserter = TableInserter::new(&ctx.store, name, &path)?;

        // validate before logging so the log only holds applicable inserts
        let row = inserter.prepare(&query.values)?;
        let payload = row
            .values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let transaction_id = ctx.transaction_id();
        ctx.wal
            .log_insert_record(transaction_id.as_deref(), name, &payload)?;

        let index = inserter.insert(row)?;
        Ok(QueryResult::ok(format!(
            "1 row inserted into '{}' at index {}",
            name, index
        )))
    }
}

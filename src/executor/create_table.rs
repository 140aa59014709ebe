use log::info;

use crate::{
    executor::{
        query::{Query, QueryResult, QueryType},
        query_executor::{ExecutionContext, QueryHandler},
    },
    storage::{schema::TableSchema, table_store::is_reserved_table_name},
    types::error::DatabaseError,
};

/// Creates a table page, registers it in the catalog and logs it. Inside a
/// transaction the new table is shadowed right away so later writes go
/// through the copy.
pub struct CreateTableHandler;

impl CreateTableHandler {
    fn validate_name(name: &str) -> Result<(), DatabaseError> {
        let bad_char = name
            .chars()
            .any(|c| c.is_whitespace() || std::path::is_separator(c) || c == '.');
        if bad_char {
            return Err(DatabaseError::InvalidQuery {
                details: format!(
                    "table name '{}' may not contain whitespace, dots or path separators",
                    name
                ),
            });
        }
        if is_reserved_table_name(name) {
            return Err(DatabaseError::ReservedTableName {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

impl QueryHandler for CreateTableHandler {
    fn can_handle(&self, query_type: QueryType) -> bool {
        query_type == QueryType::CreateTable
    }

    fn handle(&self, query: &Query, ctx: &mut ExecutionContext) -> Result<QueryResult, DatabaseError> {
        let name = ctx.table_name(query)?;
        Self::validate_name(name)?;
        let schema = TableSchema::from_tokens(&query.column_types)?;

        let primary = ctx.config.table_path(name);
        if ctx.catalog.is_table_exists(&primary)? || primary.exists() {
            return Err(DatabaseError::TableAlreadyExists {
                name: name.to_string(),
            });
        }

        let transaction_id = ctx.transaction_id();
        ctx.wal
            .log_create_table(transaction_id.as_deref(), name, &schema.to_string())?;
        ctx.store.create_table(&primary, name, &schema.tokens())?;
        ctx.catalog.add_table_reference(&primary)?;
        if ctx.transactions.is_in_transaction() {
            ctx.transactions.create_temp_table_copy(name)?;
        }

        info!("Table '{}' created with schema {}", name, schema);
        Ok(QueryResult::ok(format!("Table '{}' created", name)))
    }
}

/// Deletes a table's chain (and shadow) and unregisters it.
pub struct DropTableHandler;

impl QueryHandler for DropTableHandler {
    fn can_handle(&self, query_type: QueryType) -> bool {
        query_type == QueryType::DropTable
    }

    fn handle(&self, query: &Query, ctx: &mut ExecutionContext) -> Result<QueryResult, DatabaseError> {
        let name = ctx.table_name(query)?;
        ctx.require_table(name)?;
        let primary = ctx.config.table_path(name);

        let transaction_id = ctx.transaction_id();
        ctx.wal.log_drop_table(transaction_id.as_deref(), name)?;
        ctx.transactions.delete_temp_table(name)?;
        if primary.exists() {
            ctx.store.delete_table_file(&primary)?;
        }
        ctx.catalog.remove_table_reference(&primary)?;

        info!("Table '{}' dropped", name);
        Ok(QueryResult::ok(format!("Table '{}' dropped", name)))
    }
}

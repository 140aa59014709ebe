use std::collections::BTreeMap;

use crate::{
    executor::{
        query::{Query, QueryResult, QueryType},
        query_executor::{ExecutionContext, QueryHandler},
    },
    types::{error::DatabaseError, value::Value},
};

/// BEGIN, COMMIT and ROLLBACK.
pub struct TransactionHandler;

impl QueryHandler for TransactionHandler {
    fn can_handle(&self, query_type: QueryType) -> bool {
        matches!(
            query_type,
            QueryType::BeginTransaction | QueryType::Commit | QueryType::Rollback
        )
    }

    fn handle(&self, query: &Query, ctx: &mut ExecutionContext) -> Result<QueryResult, DatabaseError> {
        match query.query_type {
            QueryType::BeginTransaction => {
                let id = ctx
                    .transactions
                    .begin(&ctx.catalog, query.transaction_name.as_deref())?;
                Ok(QueryResult::ok(format!("Transaction {} started", id)))
            }
            QueryType::Commit => {
                ctx.transactions.commit()?;
                Ok(QueryResult::ok("Transaction committed"))
            }
            QueryType::Rollback => {
                ctx.transactions.rollback()?;
                Ok(QueryResult::ok("Transaction rolled back"))
            }
            other => Err(DatabaseError::InvalidQuery {
                details: format!("{:?} is not a transaction statement", other),
            }),
        }
    }
}

/// Lists the tables of the catalog, one row per table with the name in
/// column 0.
pub struct ShowTablesHandler;

impl QueryHandler for ShowTablesHandler {
    fn can_handle(&self, query_type: QueryType) -> bool {
        query_type == QueryType::ShowTables
    }

    fn handle(&self, _query: &Query, ctx: &mut ExecutionContext) -> Result<QueryResult, DatabaseError> {
        let names = ctx.catalog.get_all_table_names()?;
        let rows: Vec<_> = names
            .into_iter()
            .map(|name| BTreeMap::from([(0, Value::Text(name))]))
            .collect();
        let message = format!("{} table(s)", rows.len());
        Ok(QueryResult::with_rows(rows, message))
    }
}

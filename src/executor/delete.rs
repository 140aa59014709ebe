use log::info;

use crate::{
    executor::{
        query::{Query, QueryResult, QueryType},
        query_executor::{ExecutionContext, QueryHandler},
    },
    types::error::DatabaseError,
};

/// Deletes one record by index, the records matching a where-clause, or
/// every record.
pub struct DeleteHandler;

impl QueryHandler for DeleteHandler {
    fn can_handle(&self, query_type: QueryType) -> bool {
        query_type == QueryType::Delete
    }

    fn handle(&self, query: &Query, ctx: &mut ExecutionContext) -> Result<QueryResult, DatabaseError> {
        let name = ctx.table_name(query)?;
        let path = ctx.require_table(name)?;

        let mut targets = match (query.row_index, &query.where_clause) {
            (Some(_), Some(_)) => {
                return Err(DatabaseError::InvalidQuery {
                    details: "DELETE takes either a row index or a where-clause".to_string(),
                });
            }
            (Some(index), None) => {
                let total = ctx.store.record_count(&path)?;
                if index >= total {
                    return Err(DatabaseError::InvalidRecordIndex { index, total });
                }
                vec![index]
            }
            (None, clause) => ctx.matching_indices(&path, clause.as_ref())?,
        };

        // highest first, so earlier deletions never shift a pending target
        targets.sort_unstable_by(|a, b| b.cmp(a));
        targets.dedup();

        let transaction_id = ctx.transaction_id();
        for &index in &targets {
            ctx.wal
                .log_delete_record(transaction_id.as_deref(), name, index)?;
            ctx.store.delete_record(&path, index)?;
        }

        info!("Deleted {} row(s) from '{}'", targets.len(), name);
        Ok(QueryResult::ok(format!("{} row(s) deleted", targets.len())))
    }
}

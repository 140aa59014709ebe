use std::collections::BTreeSet;

use log::trace;

use crate::{
    executor::{
        query::{Query, QueryResult, QueryType, project},
        query_executor::{ExecutionContext, QueryHandler},
    },
    types::error::DatabaseError,
};

pub struct SelectHandler;

impl QueryHandler for SelectHandler {
    fn can_handle(&self, query_type: QueryType) -> bool {
        query_type == QueryType::Select
    }

    fn handle(&self, query: &Query, ctx: &mut ExecutionContext) -> Result<QueryResult, DatabaseError> {
        let name = ctx.table_name(query)?;
        let path = ctx.require_table(name)?;

        let schema = ctx.store.read_schema(&path)?;
        if let Some(columns) = &query.columns {
            for &column in columns {
                schema.column(column)?;
            }
        }

        let rows = match &query.where_clause {
            None => ctx.store.read_all(&path)?,
            Some(clause) => {
                let matches: BTreeSet<_> = ctx.matching_indices(&path, Some(clause))?.into_iter().collect();
                trace!("{} rows of '{}' match {:?}", matches.len(), name, clause);
                ctx.store
                    .read_all(&path)?
                    .into_iter()
                    .filter(|row| row.row_id.is_some_and(|id| matches.contains(&id)))
                    .collect()
            }
        };

        let projected: Vec<_> = rows
            .iter()
            .map(|row| project(row, query.columns.as_deref()))
            .collect();
        let message = format!("{} row(s) selected", projected.len());
        Ok(QueryResult::with_rows(projected, message))
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{RecordIndex, row::Row, value::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryType {
    CreateTable,
    DropTable,
    Insert,
    Select,
    Delete,
    BeginTransaction,
    Commit,
    Rollback,
    ShowTables,
}

/// Row filter of a SELECT or DELETE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WhereClause {
    /// `column <op> literal`
    Constant {
        column: usize,
        operator: String,
        value: Value,
    },
    /// `column <op> column`
    Columns {
        left: usize,
        operator: String,
        right: usize,
    },
    /// `column LIKE pattern`
    Pattern {
        column: usize,
        pattern: String,
        case_sensitive: bool,
    },
}

/// A parsed statement, as handed over by a front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub query_type: QueryType,
    pub table_name: Option<String>,
    /// Column type tokens of a CREATE_TABLE, e.g. `["int", "str_20"]`.
    pub column_types: Vec<String>,
    /// Projection of a SELECT by column index. `None` selects every column.
    pub columns: Option<Vec<usize>>,
    pub where_clause: Option<WhereClause>,
    pub values: Vec<Value>,
    /// DELETE a single record by index.
    pub row_index: Option<RecordIndex>,
    pub transaction_name: Option<String>,
}

impl Query {
    fn of(query_type: QueryType, table_name: Option<&str>) -> Self {
        Self {
            query_type,
            table_name: table_name.map(str::to_string),
            column_types: Vec::new(),
            columns: None,
            where_clause: None,
            values: Vec::new(),
            row_index: None,
            transaction_name: None,
        }
    }

    pub fn create_table<S: Into<String>>(table_name: &str, column_types: Vec<S>) -> Self {
        Self {
            column_types: column_types.into_iter().map(Into::into).collect(),
            ..Self::of(QueryType::CreateTable, Some(table_name))
        }
    }

    pub fn drop_table(table_name: &str) -> Self {
        Self::of(QueryType::DropTable, Some(table_name))
    }

    pub fn insert(table_name: &str, values: Vec<Value>) -> Self {
        Self {
            values,
            ..Self::of(QueryType::Insert, Some(table_name))
        }
    }

    pub fn select(table_name: &str) -> Self {
        Self::of(QueryType::Select, Some(table_name))
    }

    pub fn delete(table_name: &str) -> Self {
        Self::of(QueryType::Delete, Some(table_name))
    }

    pub fn begin(transaction_name: Option<&str>) -> Self {
        Self {
            transaction_name: transaction_name.map(str::to_string),
            ..Self::of(QueryType::BeginTransaction, None)
        }
    }

    pub fn commit() -> Self {
        Self::of(QueryType::Commit, None)
    }

    pub fn rollback() -> Self {
        Self::of(QueryType::Rollback, None)
    }

    pub fn show_tables() -> Self {
        Self::of(QueryType::ShowTables, None)
    }

    pub fn with_columns(mut self, columns: Vec<usize>) -> Self {
        self.columns = Some(columns);
        self
    }

    pub fn with_where(mut self, where_clause: WhereClause) -> Self {
        self.where_clause = Some(where_clause);
        self
    }

    pub fn with_row_index(mut self, index: RecordIndex) -> Self {
        self.row_index = Some(index);
        self
    }
}

/// One output row, keyed by column index.
pub type ResultRow = BTreeMap<usize, Value>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    pub rows: Vec<ResultRow>,
    pub message: String,
}

impl QueryResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            rows: Vec::new(),
            message: message.into(),
        }
    }

    pub fn with_rows(rows: Vec<ResultRow>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            rows,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            rows: Vec::new(),
            message: message.into(),
        }
    }
}

/// Project `row` onto `columns`, or every column when `columns` is `None`.
pub fn project(row: &Row, columns: Option<&[usize]>) -> ResultRow {
    match columns {
        Some(columns) => columns
            .iter()
            .filter_map(|&i| row.get_value(i).map(|v| (i, v.clone())))
            .collect(),
        None => row.values.iter().cloned().enumerate().collect(),
    }
}

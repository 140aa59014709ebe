use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{
    MAX_SCHEMA_FIELDS, TABLE_SCHEMA_SIZE,
    error::DatabaseError,
    value::DataType,
};

/// Ordered column types of a table. Immutable once the table exists; stored
/// in the page header as a comma-joined token string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<DataType>,
}

impl TableSchema {
    pub fn new(columns: Vec<DataType>) -> Result<Self, DatabaseError> {
        if columns.is_empty() || columns.len() > MAX_SCHEMA_FIELDS {
            return Err(DatabaseError::InvalidSchema {
                details: format!("Schema must contain 1-{} fields", MAX_SCHEMA_FIELDS),
            });
        }
        let schema = Self { columns };
        let encoded_len = schema.to_string().len();
        if encoded_len > TABLE_SCHEMA_SIZE {
            return Err(DatabaseError::InvalidSchema {
                details: format!(
                    "Schema too large ({} bytes), maximum is {}",
                    encoded_len, TABLE_SCHEMA_SIZE
                ),
            });
        }
        Ok(schema)
    }

    /// Parse a list of column type tokens such as `["int", "str_20"]`.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, DatabaseError> {
        let columns = tokens
            .iter()
            .map(|token| token.as_ref().trim().parse::<DataType>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(columns)
    }

    /// Parse the comma-joined form stored in a page header.
    pub fn parse(encoded: &str) -> Result<Self, DatabaseError> {
        let tokens: Vec<&str> = encoded
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .collect();
        Self::from_tokens(&tokens)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Result<&DataType, DatabaseError> {
        self.columns
            .get(index)
            .ok_or(DatabaseError::ColumnIndexOutOfBounds {
                index,
                count: self.columns.len(),
            })
    }

    /// Encoded size of every record of this table. Strings are stored at
    /// their declared width, so the size does not depend on the values.
    pub fn record_size(&self) -> usize {
        self.columns.iter().map(DataType::encoded_size).sum()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.columns.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens().join(","))
    }
}

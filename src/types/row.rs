use serde::{Deserialize, Serialize};

use crate::{
    storage::schema::TableSchema,
    types::{
        INT_SIZE, RecordIndex, STRING_LENGTH_PREFIX_SIZE,
        error::DatabaseError,
        value::{DataType, Value},
    },
};

/// A decoded record. `row_id` carries the logical record index when the row
/// was produced by a read or a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub row_id: Option<RecordIndex>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            row_id: None,
            values,
        }
    }

    pub fn with_row_id(row_id: RecordIndex, values: Vec<Value>) -> Self {
        Self {
            row_id: Some(row_id),
            values,
        }
    }

    pub fn get_value(&self, column_index: usize) -> Option<&Value> {
        self.values.get(column_index)
    }

    /// Exact encoded length of this row under `schema`.
    pub fn size(&self, schema: &TableSchema) -> usize {
        schema.record_size()
    }

    /// Check value count, value types and string byte lengths.
    pub fn validate(&self, schema: &TableSchema) -> Result<(), DatabaseError> {
        if self.values.len() != schema.len() {
            return Err(DatabaseError::ValueCountMismatch {
                expected: schema.len(),
                actual: self.values.len(),
            });
        }

        for (column, (value, data_type)) in self.values.iter().zip(&schema.columns).enumerate() {
            match (value, data_type) {
                (Value::Integer(_), DataType::Int) => {}
                (Value::Text(s), DataType::Str { max_len }) => {
                    if s.len() > *max_len {
                        return Err(DatabaseError::StringTooLong {
                            column,
                            max: *max_len,
                            actual: s.len(),
                        });
                    }
                }
                _ => {
                    return Err(DatabaseError::TypeMismatch {
                        column,
                        expected: data_type.name().to_string(),
                        actual: value.type_name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self, schema: &TableSchema) -> Result<Vec<u8>, DatabaseError> {
        self.validate(schema)?;

        let mut buffer = Vec::with_capacity(schema.record_size());
        for (column, (value, data_type)) in self.values.iter().zip(&schema.columns).enumerate() {
            match (value, data_type) {
                (Value::Integer(i), DataType::Int) => {
                    buffer.extend_from_slice(&i.to_be_bytes());
                }
                (Value::Text(s), DataType::Str { max_len }) => {
                    let bytes = s.as_bytes();
                    buffer.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
                    buffer.extend_from_slice(bytes);
                    // zero padding up to the declared width
                    buffer.resize(buffer.len() + (max_len - bytes.len()), 0);
                }
                (value, data_type) => {
                    return Err(DatabaseError::TypeMismatch {
                        column,
                        expected: data_type.name().to_string(),
                        actual: value.type_name().to_string(),
                    });
                }
            }
        }

        Ok(buffer)
    }

    pub fn from_bytes(schema: &TableSchema, bytes: &[u8]) -> Result<Self, DatabaseError> {
        if bytes.len() < schema.record_size() {
            return Err(DatabaseError::CorruptedRecord {
                details: format!(
                    "expected {} bytes, got {}",
                    schema.record_size(),
                    bytes.len()
                ),
            });
        }

        let mut cursor = 0;
        let mut values = Vec::with_capacity(schema.len());

        for data_type in &schema.columns {
            match data_type {
                DataType::Int => {
                    values.push(Value::Integer(read_i32(bytes, cursor)));
                    cursor += INT_SIZE;
                }
                DataType::Str { max_len } => {
                    let length = read_i32(bytes, cursor) as i64;
                    cursor += STRING_LENGTH_PREFIX_SIZE;

                    if length > *max_len as i64 {
                        return Err(DatabaseError::StringLengthExceeded {
                            length,
                            max: *max_len,
                        });
                    }
                    if length < 0 {
                        return Err(DatabaseError::CorruptedRecord {
                            details: format!("negative string length {}", length),
                        });
                    }

                    let text = std::str::from_utf8(&bytes[cursor..cursor + length as usize])
                        .map_err(|e| DatabaseError::CorruptedRecord {
                            details: format!("string is not valid UTF-8: {}", e),
                        })?;
                    values.push(Value::Text(text.to_string()));
                    cursor += max_len;
                }
            }
        }

        Ok(Row::new(values))
    }
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

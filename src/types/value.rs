use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::types::{
    INT_SIZE, MAX_STRING_LENGTH, STRING_LENGTH_PREFIX_SIZE,
    error::DatabaseError,
};

/// Column type as declared in a table schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// 4-byte signed integer, token `int`
    Int,
    /// UTF-8 string of at most `max_len` bytes, token `str_<max_len>`
    Str { max_len: usize },
}

impl DataType {
    /// Bytes one value of this type occupies inside an encoded record.
    pub fn encoded_size(&self) -> usize {
        match self {
            DataType::Int => INT_SIZE,
            DataType::Str { max_len } => STRING_LENGTH_PREFIX_SIZE + max_len,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, DataType::Str { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int => "Integer",
            DataType::Str { .. } => "String",
        }
    }
}

impl FromStr for DataType {
    type Err = DatabaseError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        if token.starts_with("int") {
            if token != "int" {
                return Err(DatabaseError::InvalidSchema {
                    details: "Integer field must be 'int'".to_string(),
                });
            }
            return Ok(DataType::Int);
        }

        if let Some(length) = token.strip_prefix("str_") {
            let max_len: usize = length.parse().map_err(|_| DatabaseError::InvalidSchema {
                details: format!("Invalid string length format in field: {}", token),
            })?;
            if max_len == 0 || max_len > MAX_STRING_LENGTH {
                return Err(DatabaseError::InvalidSchema {
                    details: format!("String length must be 1-{}", MAX_STRING_LENGTH),
                });
            }
            return Ok(DataType::Str { max_len });
        }

        Err(DatabaseError::InvalidSchema {
            details: format!(
                "Invalid field type: {}. Expected 'int' or 'str_<length>'.",
                token
            ),
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "int"),
            DataType::Str { max_len } => write!(f, "str_{}", max_len),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Integer(i32),
    Text(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Text(_) => "String",
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Integer(_) => None,
        }
    }

    /// Interpret a literal for a column of `data_type`: text that parses as
    /// an integer is accepted for `int` columns, anything else is returned
    /// unchanged.
    pub fn coerce_to(&self, data_type: &DataType) -> Value {
        match (self, data_type) {
            (Value::Text(s), DataType::Int) => match s.trim().parse::<i32>() {
                Ok(i) => Value::Integer(i),
                Err(_) => self.clone(),
            },
            _ => self.clone(),
        }
    }

    pub fn matches_type(&self, data_type: &DataType) -> bool {
        matches!(
            (self, data_type),
            (Value::Integer(_), DataType::Int) | (Value::Text(_), DataType::Str { .. })
        )
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None, // Mixed types
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

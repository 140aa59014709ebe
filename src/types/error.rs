use std::{io, path::PathBuf};

use thiserror::Error;

/// Broad classes callers can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input: never retried, never partially applied.
    Validation,
    /// On-disk state contradicts itself.
    Corruption,
    /// Missing files, permissions, exhausted capacity.
    Resource,
    /// The write-ahead log could not be written.
    Durability,
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    // Validation
    #[error("Invalid schema: {details}")]
    InvalidSchema { details: String },

    #[error("{what} must be {max} bytes or less, got {actual}")]
    NameTooLong {
        what: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("Data size ({actual}) doesn't match schema size ({expected})")]
    ValueCountMismatch { expected: usize, actual: usize },

    #[error("Type mismatch in column {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: usize,
        expected: String,
        actual: String,
    },

    #[error("String too long for column {column}: {actual} bytes, max length {max}")]
    StringTooLong {
        column: usize,
        max: usize,
        actual: usize,
    },

    #[error("Record of {size} bytes cannot fit in a page of {page_size} bytes")]
    RecordTooLarge { size: usize, page_size: usize },

    #[error("Invalid record index: {index}, available records: {total}")]
    InvalidRecordIndex { index: usize, total: usize },

    #[error("Column index {index} out of bounds (table has {count} columns)")]
    ColumnIndexOutOfBounds { index: usize, count: usize },

    #[error("Unsupported operator '{0}'. Valid operators: ==, !=, <, <=, >, >=")]
    UnsupportedOperator(String),

    #[error("Cannot compare different types: {left} and {right}")]
    IncomparableTypes { left: String, right: String },

    #[error("Pattern search is only supported for string columns, column {index} is {actual}")]
    NotAStringColumn { index: usize, actual: String },

    #[error("Path exceeds {max} bytes: {path}")]
    PathTooLong { path: PathBuf, max: usize },

    #[error("Table reference already exists in database: {path}")]
    DuplicateTableReference { path: PathBuf },

    #[error("Table '{name}' already exists")]
    TableAlreadyExists { name: String },

    #[error("Table name '{name}' ends with a reserved suffix ('_tmp' or '_part<N>')")]
    ReservedTableName { name: String },

    #[error("Invalid log field '{value}': {reason}")]
    InvalidLogField { value: String, reason: String },

    #[error("Invalid query: {details}")]
    InvalidQuery { details: String },

    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("Transaction '{id}' is already active")]
    TransactionAlreadyActive { id: String },

    // Corruption
    #[error("Corrupted page {path}: {reason}")]
    CorruptedPage { path: PathBuf, reason: String },

    #[error("Corrupted database file {path}: {reason}")]
    CorruptedCatalog { path: PathBuf, reason: String },

    #[error("Invalid index position: {position} (header ends at {header_size})")]
    InvalidIndexPosition { position: i64, header_size: usize },

    #[error("Invalid data offset in index: {offset}")]
    InvalidDataOffset { offset: i64 },

    #[error("String length exceeds max allowed size: {length} > {max}")]
    StringLengthExceeded { length: i64, max: usize },

    #[error("Corrupted record: {details}")]
    CorruptedRecord { details: String },

    // Resource
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Table part not found: {path}")]
    TablePartNotFound { path: PathBuf },

    #[error("Failed to read next part pointer from {path}: {reason}")]
    NextPointerUnreadable { path: PathBuf, reason: String },

    #[error("Database {path} cannot contain more tables (capacity {capacity})")]
    CatalogFull { path: PathBuf, capacity: usize },

    #[error("Table '{name}' not found")]
    TableNotFound { name: String },

    #[error("Page {path} belongs to another table")]
    PageOwnedByOtherTable { path: PathBuf },

    #[error("{step} failed after completing [{}]: {source}", .completed.join(", "))]
    PartialFailure {
        step: String,
        completed: Vec<String>,
        #[source]
        source: Box<DatabaseError>,
    },

    // Durability
    #[error("Failed to write to transaction log: {reason}")]
    LogWrite { reason: String },
}

impl DatabaseError {
    pub fn kind(&self) -> ErrorKind {
        use DatabaseError::*;
        match self {
            InvalidSchema { .. }
            | NameTooLong { .. }
            | ValueCountMismatch { .. }
            | TypeMismatch { .. }
            | StringTooLong { .. }
            | RecordTooLarge { .. }
            | InvalidRecordIndex { .. }
            | ColumnIndexOutOfBounds { .. }
            | UnsupportedOperator(_)
            | IncomparableTypes { .. }
            | NotAStringColumn { .. }
            | PathTooLong { .. }
            | DuplicateTableReference { .. }
            | TableAlreadyExists { .. }
            | ReservedTableName { .. }
            | InvalidLogField { .. }
            | InvalidQuery { .. }
            | NoActiveTransaction
            | TransactionAlreadyActive { .. } => ErrorKind::Validation,
            CorruptedPage { .. }
            | CorruptedCatalog { .. }
            | InvalidIndexPosition { .. }
            | InvalidDataOffset { .. }
            | StringLengthExceeded { .. }
            | CorruptedRecord { .. } => ErrorKind::Corruption,
            Io(_)
            | FileNotFound { .. }
            | PermissionDenied { .. }
            | TablePartNotFound { .. }
            | NextPointerUnreadable { .. }
            | CatalogFull { .. }
            | TableNotFound { .. }
            | PageOwnedByOtherTable { .. } => ErrorKind::Resource,
            PartialFailure { source, .. } => source.kind(),
            LogWrite { .. } => ErrorKind::Durability,
        }
    }

    /// Attach the path that an I/O failure concerns, keeping the specific
    /// not-found and permission cases distinguishable.
    pub fn from_io(err: io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => DatabaseError::FileNotFound { path: path.into() },
            io::ErrorKind::PermissionDenied => DatabaseError::PermissionDenied { path: path.into() },
            _ => DatabaseError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

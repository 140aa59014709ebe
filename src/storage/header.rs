use std::path::PathBuf;

use crate::types::{
    CATALOG_HEADER_SIZE, CATALOG_NAME_SIZE, NEXT_POINTER_OFFSET, RECORDS_IN_PAGE_OFFSET,
    SCHEMA_OFFSET, TABLE_HEADER_SIZE, TABLE_NAME_SIZE, TABLE_POINTER_SIZE, TOTAL_RECORDS_OFFSET,
    error::DatabaseError,
};

/*
 * Table page header (258 bytes, big-endian integers)
 * ┌──────────────┬──────────────────┬──────────────┬─────────────┬──────────────────┐
 * │ name (50)    │ recordsInPage(4) │ totalRecs(4) │ schema(100) │ nextPointer(100) │
 * └──────────────┴──────────────────┴──────────────┴─────────────┴──────────────────┘
 */
#[derive(Debug, Clone, PartialEq)]
pub struct TableHeader {
    pub name: String,
    pub records_in_page: usize,
    /// Authoritative only on the first page of a chain.
    pub total_records: usize,
    pub schema: String,
    pub next_page: Option<PathBuf>,
}

impl TableHeader {
    pub fn new(name: &str, schema: String) -> Self {
        Self {
            name: name.to_string(),
            records_in_page: 0,
            total_records: 0,
            schema,
            next_page: None,
        }
    }

    pub fn write_into(&self, buffer: &mut [u8]) -> Result<(), DatabaseError> {
        write_padded(
            &mut buffer[0..TABLE_NAME_SIZE],
            self.name.as_bytes(),
            "Table name",
        )?;
        buffer[RECORDS_IN_PAGE_OFFSET..TOTAL_RECORDS_OFFSET]
            .copy_from_slice(&(self.records_in_page as i32).to_be_bytes());
        buffer[TOTAL_RECORDS_OFFSET..SCHEMA_OFFSET]
            .copy_from_slice(&(self.total_records as i32).to_be_bytes());
        write_padded(
            &mut buffer[SCHEMA_OFFSET..NEXT_POINTER_OFFSET],
            self.schema.as_bytes(),
            "Schema",
        )?;

        let pointer = match &self.next_page {
            Some(path) => path.to_string_lossy().into_owned(),
            None => String::new(),
        };
        if pointer.len() > TABLE_POINTER_SIZE {
            return Err(DatabaseError::PathTooLong {
                path: PathBuf::from(pointer),
                max: TABLE_POINTER_SIZE,
            });
        }
        write_padded(
            &mut buffer[NEXT_POINTER_OFFSET..TABLE_HEADER_SIZE],
            pointer.as_bytes(),
            "Next page pointer",
        )
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DatabaseError> {
        let mut buffer = vec![0u8; TABLE_HEADER_SIZE];
        self.write_into(&mut buffer)?;
        Ok(buffer)
    }

    /// `path` only labels corruption errors.
    pub fn from_bytes(bytes: &[u8], path: &std::path::Path) -> Result<Self, DatabaseError> {
        if bytes.len() < TABLE_HEADER_SIZE {
            return Err(DatabaseError::InvalidIndexPosition {
                position: bytes.len() as i64,
                header_size: TABLE_HEADER_SIZE,
            });
        }

        let records_in_page = read_count(bytes, RECORDS_IN_PAGE_OFFSET, path, "recordCountInThisPage")?;
        let total_records = read_count(bytes, TOTAL_RECORDS_OFFSET, path, "totalRecords")?;
        let pointer = read_padded(&bytes[NEXT_POINTER_OFFSET..TABLE_HEADER_SIZE]);

        Ok(Self {
            name: read_padded(&bytes[0..TABLE_NAME_SIZE]),
            records_in_page,
            total_records,
            schema: read_padded(&bytes[SCHEMA_OFFSET..NEXT_POINTER_OFFSET]),
            next_page: if pointer.is_empty() {
                None
            } else {
                Some(PathBuf::from(pointer))
            },
        })
    }
}

/// Catalog file header: `name`(50) + `tableCount`(4).
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogHeader {
    pub name: String,
    pub table_count: i32,
}

impl CatalogHeader {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            table_count: 0,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DatabaseError> {
        let mut buffer = vec![0u8; CATALOG_HEADER_SIZE];
        write_padded(
            &mut buffer[0..CATALOG_NAME_SIZE],
            self.name.as_bytes(),
            "Database name",
        )?;
        buffer[CATALOG_NAME_SIZE..CATALOG_HEADER_SIZE]
            .copy_from_slice(&self.table_count.to_be_bytes());
        Ok(buffer)
    }

    pub fn from_bytes(bytes: &[u8], path: &std::path::Path) -> Result<Self, DatabaseError> {
        if bytes.len() < CATALOG_HEADER_SIZE {
            return Err(DatabaseError::CorruptedCatalog {
                path: path.to_path_buf(),
                reason: "too small".to_string(),
            });
        }
        let table_count = i32::from_be_bytes([
            bytes[CATALOG_NAME_SIZE],
            bytes[CATALOG_NAME_SIZE + 1],
            bytes[CATALOG_NAME_SIZE + 2],
            bytes[CATALOG_NAME_SIZE + 3],
        ]);
        Ok(Self {
            name: read_padded(&bytes[0..CATALOG_NAME_SIZE]),
            table_count,
        })
    }
}

/// Copy `value` into `field` and zero the remainder.
pub fn write_padded(field: &mut [u8], value: &[u8], what: &'static str) -> Result<(), DatabaseError> {
    if value.len() > field.len() {
        return Err(DatabaseError::NameTooLong {
            what,
            max: field.len(),
            actual: value.len(),
        });
    }
    field[..value.len()].copy_from_slice(value);
    field[value.len()..].fill(0);
    Ok(())
}

/// Read a zero-padded UTF-8 field, stopping at the first NUL.
pub fn read_padded(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn read_count(
    bytes: &[u8],
    at: usize,
    path: &std::path::Path,
    field: &str,
) -> Result<usize, DatabaseError> {
    let raw = i32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
    usize::try_from(raw).map_err(|_| DatabaseError::CorruptedPage {
        path: path.to_path_buf(),
        reason: format!("negative {}: {}", field, raw),
    })
}

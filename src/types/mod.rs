pub mod error;
pub mod page;
pub mod row;
pub mod value;

// Common type aliases
pub type RecordIndex = usize;
pub type TransactionId = String;

// Page file layout
pub const PAGE_SIZE: usize = 65536; // Canonical page file size
pub const TABLE_NAME_SIZE: usize = 50;
pub const RECORD_COUNT_SIZE: usize = 4; // big-endian i32
pub const TABLE_SCHEMA_SIZE: usize = 100;
pub const TABLE_POINTER_SIZE: usize = 100;
pub const TABLE_HEADER_SIZE: usize =
    TABLE_NAME_SIZE + RECORD_COUNT_SIZE + RECORD_COUNT_SIZE + TABLE_SCHEMA_SIZE + TABLE_POINTER_SIZE; // 258
pub const INDEX_ENTRY_SIZE: usize = 8; // big-endian i64 data offset

// Header field offsets
pub const RECORDS_IN_PAGE_OFFSET: usize = TABLE_NAME_SIZE; // 50
pub const TOTAL_RECORDS_OFFSET: usize = RECORDS_IN_PAGE_OFFSET + RECORD_COUNT_SIZE; // 54
pub const SCHEMA_OFFSET: usize = TOTAL_RECORDS_OFFSET + RECORD_COUNT_SIZE; // 58
pub const NEXT_POINTER_OFFSET: usize = SCHEMA_OFFSET + TABLE_SCHEMA_SIZE; // 158

// Catalog (master) file layout
pub const CATALOG_NAME_SIZE: usize = 50;
pub const CATALOG_HEADER_SIZE: usize = CATALOG_NAME_SIZE + RECORD_COUNT_SIZE; // 54
pub const CATALOG_SLOT_SIZE: usize = 100;
pub const CATALOG_MAX_SIZE: usize = 65536;
pub const CATALOG_CAPACITY: usize = (CATALOG_MAX_SIZE - CATALOG_HEADER_SIZE) / CATALOG_SLOT_SIZE;

// Schema limits
pub const MAX_SCHEMA_FIELDS: usize = 20;
pub const MAX_STRING_LENGTH: usize = 1000;
pub const INT_SIZE: usize = 4;
pub const STRING_LENGTH_PREFIX_SIZE: usize = 4;

// Chain traversal guard against pointer cycles
pub const MAX_CHAIN_PAGES: usize = 1000;

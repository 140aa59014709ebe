pub mod catalog;
pub mod header;
pub mod schema;
pub mod table_store;
pub mod transaction;
pub mod wal;

pub mod config;
pub mod executor;
pub mod storage;
pub mod types;
pub mod utils;

pub use config::{Config, ConfigBuilder};
pub use executor::query::{Query, QueryResult, QueryType, WhereClause};
pub use executor::query_executor::{QueryExecutor, RecoveryReport};
pub use storage::{
    catalog::Catalog, table_store::TableStore, transaction::TransactionManager,
    wal::WriteAheadLog,
};
pub use types::error::{DatabaseError, ErrorKind, Result};
pub use types::{row::Row, value::{DataType, Value}};

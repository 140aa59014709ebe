pub mod create_table;
pub mod delete;
pub mod insert;
pub mod predicate;
pub mod query;
pub mod query_executor;
pub mod scan;
pub mod select;
pub mod sequential_scan;
pub mod transaction;

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::{
    config::Config,
    executor::query_executor::QueryExecutor,
    storage::{catalog::Catalog, table_store::TableStore},
    types::error::DatabaseError,
};

/// Page size used by fixtures so overflow chains appear after a handful
/// of records.
pub const SMALL_PAGE_SIZE: usize = 1024;

/// A database directory that disappears when dropped.
pub struct TempDatabase {
    pub dir: TempDir,
    pub config: Config,
}

impl TempDatabase {
    pub fn new() -> Self {
        Self::with_page_size(crate::types::PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        let dir = tempfile::Builder::new()
            .prefix("tabula_test_")
            .tempdir()
            .expect("failed to create temp dir");
        let config = Config::builder()
            .data_dir(dir.path().join("data"))
            .page_size(page_size)
            .build();
        Self { dir, config }
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn table_path(&self, name: &str) -> PathBuf {
        self.config.table_path(name)
    }

    pub fn store(&self) -> TableStore {
        TableStore::with_page_size(self.config.page_size)
    }

    pub fn create_catalog(&self) -> Result<Catalog, DatabaseError> {
        Catalog::create(&self.config.catalog_path(), &self.config.database_name)
    }

    pub fn open_executor(&self) -> Result<QueryExecutor, DatabaseError> {
        QueryExecutor::open(self.config.clone())
    }
}

impl Default for TempDatabase {
    fn default() -> Self {
        Self::new()
    }
}

use std::path::PathBuf;

use crate::types::PAGE_SIZE;

/// Where a database lives on disk and how new pages are sized.
///
/// Layout under `data_dir`:
///   {data_dir}/
///     ├── master.db              (catalog)
///     ├── <table>.tbl            (first page of each table)
///     ├── <table>_part<k>.tbl    (overflow pages)
///     ├── <table>_tmp.tbl        (shadow copy while a transaction runs)
///     └── wal.log                (write-ahead log)
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Name written into the catalog header, at most 50 bytes.
    pub database_name: String,
    pub catalog_file: String,
    pub table_extension: String,
    pub log_file: String,
    /// Size of each newly created page file.
    pub page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./tabula_data"),
            database_name: "master".to_string(),
            catalog_file: "master.db".to_string(),
            table_extension: "tbl".to_string(),
            log_file: "wal.log".to_string(),
            page_size: PAGE_SIZE,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join(&self.catalog_file)
    }

    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", table_name, self.table_extension))
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_file)
    }

    pub fn log_backup_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.backup", self.log_file))
    }
}

#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    pub fn database_name(mut self, name: impl Into<String>) -> Self {
        self.config.database_name = name.into();
        self
    }

    pub fn catalog_file(mut self, file_name: impl Into<String>) -> Self {
        self.config.catalog_file = file_name.into();
        self
    }

    /// Set the table file extension, without the leading dot
    pub fn table_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.table_extension = extension.into();
        self
    }

    pub fn log_file(mut self, file_name: impl Into<String>) -> Self {
        self.config.log_file = file_name.into();
        self
    }

    /// Set the size of newly created page files (in bytes)
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

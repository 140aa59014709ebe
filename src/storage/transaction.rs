use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Local;
use log::{debug, info, warn};

use crate::{
    config::Config,
    storage::{catalog::Catalog, table_store::TableStore, wal::WriteAheadLog},
    types::{TransactionId, error::DatabaseError},
};

pub(crate) const SHADOW_SUFFIX: &str = "_tmp";

struct ActiveTransaction {
    id: TransactionId,
    name: String,
    /// table name to primary path, for every table with a live shadow
    shadowed: BTreeMap<String, PathBuf>,
}

/// Copy-on-begin isolation over whole tables. While a transaction is
/// active every touched table is read and written through its shadow
/// copy; commit moves the shadows over their primaries.
pub struct TransactionManager {
    config: Config,
    store: TableStore,
    wal: Arc<WriteAheadLog>,
    active: Option<ActiveTransaction>,
}

impl TransactionManager {
    pub fn new(config: Config, store: TableStore, wal: Arc<WriteAheadLog>) -> Self {
        Self {
            config,
            store,
            wal,
            active: None,
        }
    }

    pub fn is_in_transaction(&self) -> bool {
        self.active.is_some()
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.active.as_ref().map(|t| t.id.as_str())
    }

    pub fn transaction_name(&self) -> Option<&str> {
        self.active.as_ref().map(|t| t.name.as_str())
    }

    pub fn shadowed_tables(&self) -> Vec<String> {
        self.active
            .as_ref()
            .map(|t| t.shadowed.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Log BEGIN and shadow every table registered in `catalog`. If a copy
    /// fails the shadows made so far are removed and ROLLBACK is logged.
    pub fn begin(&mut self, catalog: &Catalog, name: Option<&str>) -> Result<TransactionId, DatabaseError> {
        if let Some(active) = &self.active {
            return Err(DatabaseError::TransactionAlreadyActive {
                id: active.id.clone(),
            });
        }

        let id = format!("txn-{}", Local::now().format("%Y%m%d%H%M%S%6f"));
        let name = name.unwrap_or("transaction").to_string();
        self.wal.log_begin_transaction(&id, &name)?;
        self.active = Some(ActiveTransaction {
            id: id.clone(),
            name: name.clone(),
            shadowed: BTreeMap::new(),
        });

        let copied = catalog.table_paths().and_then(|tables| {
            tables
                .iter()
                .try_for_each(|primary| self.shadow_primary(primary))
        });
        if let Err(e) = copied {
            warn!("Transaction {} failed to start: {}", id, e);
            if let Err(cleanup) = self.rollback() {
                warn!("Cleanup after failed begin also failed: {}", cleanup);
            }
            return Err(e);
        }

        info!("Began transaction {} ('{}')", id, name);
        Ok(id)
    }

    /// Log COMMIT, then move every shadow over its primary.
    pub fn commit(&mut self) -> Result<(), DatabaseError> {
        let transaction = self.active.take().ok_or(DatabaseError::NoActiveTransaction)?;
        if let Err(e) = self.wal.log_commit_transaction(&transaction.id) {
            self.active = Some(transaction);
            return Err(e);
        }

        let mut completed = Vec::new();
        for (table, primary) in &transaction.shadowed {
            let shadow = shadow_path(primary);
            if !shadow.exists() {
                continue;
            }
            if let Err(e) = self.store.move_table(&shadow, primary) {
                return Err(DatabaseError::PartialFailure {
                    step: format!("commit table '{}'", table),
                    completed,
                    source: Box::new(e),
                });
            }
            completed.push(format!("committed table '{}'", table));
        }

        info!("Committed transaction {}", transaction.id);
        Ok(())
    }

    /// Delete every shadow, then log ROLLBACK.
    pub fn rollback(&mut self) -> Result<(), DatabaseError> {
        let transaction = self.active.take().ok_or(DatabaseError::NoActiveTransaction)?;

        let mut completed = Vec::new();
        let mut failure = None;
        for (table, primary) in &transaction.shadowed {
            let shadow = shadow_path(primary);
            if !shadow.exists() {
                continue;
            }
            if let Err(e) = self.store.delete_table_file(&shadow) {
                failure = Some((format!("discard shadow of '{}'", table), e));
                break;
            }
            completed.push(format!("discarded shadow of '{}'", table));
        }

        if let Some((step, e)) = failure {
            // keep the transaction so the caller can retry the rollback
            self.active = Some(transaction);
            return Err(DatabaseError::PartialFailure {
                step,
                completed,
                source: Box::new(e),
            });
        }

        self.wal.log_rollback_transaction(&transaction.id)?;
        info!("Rolled back transaction {}", transaction.id);
        Ok(())
    }

    fn shadow_primary(&mut self, primary: &Path) -> Result<(), DatabaseError> {
        let table = table_name_of(primary);
        let transaction = self.active.as_mut().ok_or(DatabaseError::NoActiveTransaction)?;
        if transaction.shadowed.contains_key(&table) {
            return Ok(());
        }
        self.store.copy_table(primary, &shadow_path(primary))?;
        transaction.shadowed.insert(table.clone(), primary.to_path_buf());
        debug!("Shadowed table '{}'", table);
        Ok(())
    }

    /// Shadow one table. Used for tables that appear during a transaction.
    pub fn create_temp_table_copy(&mut self, table_name: &str) -> Result<PathBuf, DatabaseError> {
        let primary = self.table_path(table_name);
        self.shadow_primary(&primary)?;
        Ok(shadow_path(&primary))
    }

    /// Remove one table's shadow without touching its primary.
    pub fn delete_temp_table(&mut self, table_name: &str) -> Result<(), DatabaseError> {
        let Some(transaction) = self.active.as_mut() else {
            return Ok(());
        };
        if let Some(primary) = transaction.shadowed.remove(table_name) {
            let shadow = shadow_path(&primary);
            if shadow.exists() {
                self.store.delete_table_file(&shadow)?;
            }
        }
        Ok(())
    }

    /// Shadow path while a transaction is active and the table has a
    /// shadow on disk, primary path otherwise.
    pub fn get_actual_table_path(&self, table_name: &str) -> PathBuf {
        if let Some(primary) = self
            .active
            .as_ref()
            .and_then(|t| t.shadowed.get(table_name))
        {
            let shadow = shadow_path(primary);
            if shadow.exists() {
                return shadow;
            }
        }
        self.table_path(table_name)
    }

    pub fn get_temp_table_path(&self, table_name: &str) -> PathBuf {
        shadow_path(&self.table_path(table_name))
    }

    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.config.table_path(table_name)
    }

    /// Delete shadows left on disk by an unfinished transaction.
    pub fn discard_leftover_shadows(&self, catalog: &Catalog) -> Result<Vec<String>, DatabaseError> {
        let mut discarded = Vec::new();
        for primary in catalog.table_paths()? {
            let shadow = shadow_path(&primary);
            if shadow.exists() {
                self.store.delete_table_file(&shadow)?;
                discarded.push(table_name_of(&primary));
            }
        }
        Ok(discarded)
    }

    /// Finish a commit that was logged but interrupted: move any shadows
    /// still on disk over their primaries.
    pub fn complete_interrupted_commit(&self, catalog: &Catalog) -> Result<Vec<String>, DatabaseError> {
        let mut completed = Vec::new();
        for primary in catalog.table_paths()? {
            let shadow = shadow_path(&primary);
            if shadow.exists() {
                self.store.move_table(&shadow, &primary)?;
                completed.push(table_name_of(&primary));
            }
        }
        Ok(completed)
    }
}

/// `<stem>_tmp<.ext>` next to `primary`.
pub fn shadow_path(primary: &Path) -> PathBuf {
    let mut file_name: OsString = primary.file_stem().map(OsString::from).unwrap_or_default();
    file_name.push(SHADOW_SUFFIX);
    if let Some(ext) = primary.extension() {
        file_name.push(".");
        file_name.push(ext);
    }
    primary.with_file_name(file_name)
}

fn table_name_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

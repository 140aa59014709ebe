use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{
    storage::{
        header::{CatalogHeader, read_padded, write_padded},
        table_store::TableStore,
    },
    types::{
        CATALOG_CAPACITY, CATALOG_HEADER_SIZE, CATALOG_NAME_SIZE, CATALOG_SLOT_SIZE,
        error::DatabaseError,
    },
    utils::path::{canonical_form, normalize},
};

/*
 * Catalog (master) file
 * ┌──────────────┬───────────────┬────────────┬────────────┬─────┐
 * │ name (50)    │ tableCount(4) │ slot 0     │ slot 1     │ ... │
 * │              │               │ path (100) │ path (100) │     │
 * └──────────────┴───────────────┴────────────┴────────────┴─────┘
 * Paths inside the catalog's directory are stored relative to it.
 */
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
}

struct CatalogContents {
    header: CatalogHeader,
    slots: Vec<PathBuf>,
}

impl Catalog {
    pub fn create(path: &Path, name: &str) -> Result<Self, DatabaseError> {
        if name.len() > CATALOG_NAME_SIZE {
            return Err(DatabaseError::NameTooLong {
                what: "Database name",
                max: CATALOG_NAME_SIZE,
                actual: name.len(),
            });
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DatabaseError::from_io(e, parent))?;
        }

        let catalog = Self {
            path: path.to_path_buf(),
        };
        catalog.write(&CatalogContents {
            header: CatalogHeader::new(name),
            slots: Vec::new(),
        })?;
        info!("Created database '{}' at {}", name, path.display());
        Ok(catalog)
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let catalog = Self {
            path: path.to_path_buf(),
        };
        catalog.read()?;
        Ok(catalog)
    }

    pub fn open_or_create(path: &Path, name: &str) -> Result<Self, DatabaseError> {
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path, name)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> Result<String, DatabaseError> {
        Ok(self.read()?.header.name)
    }

    pub fn table_count(&self) -> Result<usize, DatabaseError> {
        Ok(self.read()?.slots.len())
    }

    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Slot form of `table_path`: relative to the catalog's directory when
    /// the table lives under it, absolute otherwise.
    fn slot_form(&self, table_path: &Path) -> Result<PathBuf, DatabaseError> {
        let table = canonical_form(table_path)?;
        let dir = canonical_form(&self.directory())?;
        Ok(match table.strip_prefix(&dir) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => table,
        })
    }

    fn resolve(&self, slot: &Path) -> PathBuf {
        if slot.is_absolute() {
            slot.to_path_buf()
        } else {
            normalize(&self.directory().join(slot))
        }
    }

    fn read(&self) -> Result<CatalogContents, DatabaseError> {
        let bytes = fs::read(&self.path).map_err(|e| DatabaseError::from_io(e, &self.path))?;
        let header = CatalogHeader::from_bytes(&bytes, &self.path)?;
        let corrupted = |reason: String| DatabaseError::CorruptedCatalog {
            path: self.path.clone(),
            reason,
        };

        let count = usize::try_from(header.table_count)
            .map_err(|_| corrupted(format!("negative table count {}", header.table_count)))?;
        let available = (bytes.len() - CATALOG_HEADER_SIZE) / CATALOG_SLOT_SIZE;
        if count > available || count > CATALOG_CAPACITY {
            return Err(corrupted(format!(
                "header declares {} tables but the file holds {} slots",
                count, available
            )));
        }

        let mut slots = Vec::with_capacity(count);
        for i in 0..available {
            let start = CATALOG_HEADER_SIZE + i * CATALOG_SLOT_SIZE;
            let slot = read_padded(&bytes[start..start + CATALOG_SLOT_SIZE]);
            match (i < count, slot.is_empty()) {
                (true, false) => slots.push(PathBuf::from(slot)),
                (true, true) => return Err(corrupted(format!("slot {} is empty", i))),
                (false, false) => {
                    return Err(corrupted(format!(
                        "slot {} is in use beyond table count {}",
                        i, count
                    )));
                }
                (false, true) => {}
            }
        }

        Ok(CatalogContents { header, slots })
    }

    fn write(&self, contents: &CatalogContents) -> Result<(), DatabaseError> {
        let mut header = contents.header.clone();
        header.table_count = contents.slots.len() as i32;

        let mut buffer = header.to_bytes()?;
        for slot in &contents.slots {
            let mut field = [0u8; CATALOG_SLOT_SIZE];
            write_padded(&mut field, slot.to_string_lossy().as_bytes(), "Table path")?;
            buffer.extend_from_slice(&field);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| DatabaseError::from_io(e, &self.path))?;
        file.write_all(&buffer)?;
        file.flush()?;
        Ok(())
    }

    pub fn add_table_reference(&self, table_path: &Path) -> Result<(), DatabaseError> {
        let slot = self.slot_form(table_path)?;
        if slot.as_os_str().len() > CATALOG_SLOT_SIZE {
            return Err(DatabaseError::PathTooLong {
                path: slot,
                max: CATALOG_SLOT_SIZE,
            });
        }

        let mut contents = self.read()?;
        if contents.slots.contains(&slot) {
            return Err(DatabaseError::DuplicateTableReference {
                path: table_path.to_path_buf(),
            });
        }
        if contents.slots.len() >= CATALOG_CAPACITY {
            return Err(DatabaseError::CatalogFull {
                path: self.path.clone(),
                capacity: CATALOG_CAPACITY,
            });
        }

        contents.slots.push(slot);
        self.write(&contents)?;
        debug!("Registered {} in {}", table_path.display(), self.path.display());
        Ok(())
    }

    /// Absent references are ignored.
    pub fn remove_table_reference(&self, table_path: &Path) -> Result<(), DatabaseError> {
        let slot = self.slot_form(table_path)?;
        let mut contents = self.read()?;
        let before = contents.slots.len();
        contents.slots.retain(|s| *s != slot);
        if contents.slots.len() == before {
            return Ok(());
        }
        self.write(&contents)?;
        debug!("Unregistered {} from {}", table_path.display(), self.path.display());
        Ok(())
    }

    pub fn is_table_exists(&self, table_path: &Path) -> Result<bool, DatabaseError> {
        let slot = self.slot_form(table_path)?;
        Ok(self.read()?.slots.contains(&slot))
    }

    /// Registered table paths, resolved against the catalog's directory.
    pub fn table_paths(&self) -> Result<Vec<PathBuf>, DatabaseError> {
        Ok(self
            .read()?
            .slots
            .iter()
            .map(|slot| self.resolve(slot))
            .collect())
    }

    pub fn get_all_table_names(&self) -> Result<Vec<String>, DatabaseError> {
        Ok(self
            .read()?
            .slots
            .iter()
            .filter_map(|slot| slot.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .collect())
    }

    /// Delete every registered table chain, then the catalog file. Stops at
    /// the first table that cannot be deleted and leaves the catalog intact.
    pub fn delete_database_file(self, store: &TableStore) -> Result<(), DatabaseError> {
        let mut completed = Vec::new();
        for table in self.table_paths()? {
            if !table.exists() {
                warn!("Registered table {} is already gone", table.display());
                continue;
            }
            if let Err(e) = store.delete_table_file(&table) {
                return Err(DatabaseError::PartialFailure {
                    step: format!("delete table {}", table.display()),
                    completed,
                    source: Box::new(e),
                });
            }
            completed.push(format!("deleted table {}", table.display()));
        }

        if let Err(e) = fs::remove_file(&self.path) {
            return Err(DatabaseError::PartialFailure {
                step: format!("delete database file {}", self.path.display()),
                completed,
                source: Box::new(DatabaseError::from_io(e, &self.path)),
            });
        }
        info!("Deleted database {}", self.path.display());
        Ok(())
    }
}

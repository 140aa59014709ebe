use std::path::{Path, PathBuf};

use log::trace;

use crate::{
    executor::{predicate::Predicate, scan::Scanner},
    storage::{schema::TableSchema, table_store::TableStore},
    types::{MAX_CHAIN_PAGES, RecordIndex, error::DatabaseError, page::TablePage, row::Row},
};

/// Walks a table chain page by page and yields rows tagged with their
/// logical record index. An optional predicate filters the output.
pub struct SequentialScanner {
    store: TableStore,
    table_path: PathBuf,
    schema: TableSchema,
    predicate: Option<Predicate>,
    current_page: Option<TablePage>,
    current_slot_index: usize,
    next_record_index: RecordIndex,
    pages_visited: usize,
    is_exhausted: bool,
}

impl SequentialScanner {
    pub fn new(store: &TableStore, table_path: &Path) -> Result<Self, DatabaseError> {
        let schema = store.read_schema(table_path)?;
        Ok(Self {
            store: store.clone(),
            table_path: table_path.to_path_buf(),
            schema,
            predicate: None,
            current_page: None,
            current_slot_index: 0,
            next_record_index: 0,
            pages_visited: 0,
            is_exhausted: false,
        })
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn advance_page(&mut self) -> Result<bool, DatabaseError> {
        let next_path = match &self.current_page {
            None => Some(self.table_path.clone()),
            Some(page) => self.store.next_page_path(page)?,
        };
        let Some(path) = next_path else {
            return Ok(false);
        };

        self.pages_visited += 1;
        if self.pages_visited > MAX_CHAIN_PAGES {
            return Err(DatabaseError::CorruptedPage {
                path,
                reason: format!("chain exceeds {} pages", MAX_CHAIN_PAGES),
            });
        }

        let page = if self.pages_visited == 1 {
            self.store.read_page(&path)?
        } else {
            self.store.read_part(&path)?
        };
        trace!(
            "Scanning page {} ({} records)",
            path.display(),
            page.record_count()
        );
        self.current_page = Some(page);
        self.current_slot_index = 0;
        Ok(true)
    }

    fn next_row(&mut self) -> Result<Option<Row>, DatabaseError> {
        loop {
            let needs_page = match &self.current_page {
                None => true,
                Some(page) => self.current_slot_index >= page.record_count(),
            };
            if needs_page {
                if !self.advance_page()? {
                    return Ok(None);
                }
                continue;
            }

            if let Some(page) = &self.current_page {
                let bytes = page.record_bytes(self.current_slot_index, self.schema.record_size())?;
                let row = Row::from_bytes(&self.schema, bytes)?;
                let row = Row::with_row_id(self.next_record_index, row.values);
                self.current_slot_index += 1;
                self.next_record_index += 1;
                return Ok(Some(row));
            }
        }
    }
}

impl Scanner for SequentialScanner {
    fn scan(&mut self) -> Result<Option<Row>, DatabaseError> {
        if self.is_exhausted {
            return Ok(None);
        }
        while let Some(row) = self.next_row()? {
            let keep = match &self.predicate {
                Some(predicate) => predicate.evaluate(&row)?,
                None => true,
            };
            if keep {
                return Ok(Some(row));
            }
        }
        self.is_exhausted = true;
        Ok(None)
    }

    fn scan_batch(&mut self, batch_size: usize) -> Result<Vec<Row>, DatabaseError> {
        let mut rows = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            match self.scan()? {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        Ok(rows)
    }

    fn reset(&mut self) -> Result<(), DatabaseError> {
        self.current_page = None;
        self.current_slot_index = 0;
        self.next_record_index = 0;
        self.pages_visited = 0;
        self.is_exhausted = false;
        Ok(())
    }
}

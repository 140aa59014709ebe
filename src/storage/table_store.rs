use std::{
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::{Read, Write},
    ops::Range,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{
    executor::{
        predicate::{ComparisonOp, Predicate},
        scan::{ScanIterator, Scanner},
        sequential_scan::SequentialScanner,
    },
    storage::{header::TableHeader, schema::TableSchema, transaction::SHADOW_SUFFIX},
    types::{
        INDEX_ENTRY_SIZE, MAX_CHAIN_PAGES, PAGE_SIZE, RecordIndex, TABLE_HEADER_SIZE,
        TABLE_NAME_SIZE,
        error::DatabaseError,
        page::TablePage,
        row::Row,
        value::Value,
    },
};

const PART_INFIX: &str = "_part";

/// Where to start looking for a record: a page of the chain and the
/// number of records stored in the pages before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageHint {
    pub page_path: PathBuf,
    pub records_before: usize,
}

/// Record CRUD over single-file pages chained through `nextPagePointer`.
///
/// The store holds no open handles: every operation reads and writes whole
/// page files, so callers must serialize access to one table.
#[derive(Debug, Clone)]
pub struct TableStore {
    page_size: usize,
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore {
    pub fn new() -> Self {
        Self {
            page_size: PAGE_SIZE,
        }
    }

    /// Size of newly created page files. Existing pages are always read
    /// at their on-disk length.
    pub fn with_page_size(page_size: usize) -> Self {
        Self { page_size }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn create_table<S: AsRef<str>>(
        &self,
        path: &Path,
        name: &str,
        schema_tokens: &[S],
    ) -> Result<TableSchema, DatabaseError> {
        if name.len() > TABLE_NAME_SIZE {
            return Err(DatabaseError::NameTooLong {
                what: "Table name",
                max: TABLE_NAME_SIZE,
                actual: name.len(),
            });
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if is_reserved_table_name(&stem) {
            return Err(DatabaseError::ReservedTableName { name: stem });
        }
        let schema = TableSchema::from_tokens(schema_tokens)?;
        self.check_record_fits(schema.record_size())?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DatabaseError::from_io(e, parent))?;
        }

        let header = TableHeader::new(name, schema.to_string());
        let mut page = TablePage::new(path, header, self.page_size)?;
        self.write_page(&mut page)?;
        info!("Created table '{}' at {} ({})", name, path.display(), schema);
        Ok(schema)
    }

    fn check_record_fits(&self, record_size: usize) -> Result<(), DatabaseError> {
        if TABLE_HEADER_SIZE + record_size + INDEX_ENTRY_SIZE > self.page_size {
            return Err(DatabaseError::RecordTooLarge {
                size: record_size,
                page_size: self.page_size,
            });
        }
        Ok(())
    }

    /// Append a record to the last page of the chain, growing the chain
    /// when the record does not fit. Returns the new record's index.
    pub fn add_record(&self, path: &Path, values: &[Value]) -> Result<RecordIndex, DatabaseError> {
        let mut first = self.read_page(path)?;
        let schema = TableSchema::parse(&first.header.schema)?;
        let record = Row::new(values.to_vec()).to_bytes(&schema)?;
        self.check_record_fits(record.len())?;

        let chain = self.chain_paths(path)?;
        let mut last = match chain.last() {
            Some(last_path) if chain.len() > 1 => Some(self.read_part(last_path)?),
            _ => None,
        };
        let tail_is_first = last.is_none();

        {
            let tail = match last.as_mut() {
                Some(page) => page,
                None => &mut first,
            };

            if tail.can_fit(record.len()) {
                tail.append_record(&record)?;
                if !tail_is_first {
                    self.write_page(tail)?;
                }
            } else {
                let part_path = self.generate_next_table_part_path(path)?;
                let header = TableHeader::new(&tail.header.name, tail.header.schema.clone());
                let mut part = TablePage::new(&part_path, header, self.page_size)?;
                part.append_record(&record)?;
                self.write_page(&mut part)?;

                tail.header.next_page = Some(pointer_to(&tail.path, &part_path));
                if !tail_is_first {
                    self.write_page(tail)?;
                }
                debug!(
                    "Table {} grew a new page {}",
                    path.display(),
                    part_path.display()
                );
            }
        }

        let index = first.header.total_records;
        first.header.total_records += 1;
        self.write_page(&mut first)?;
        Ok(index)
    }

    pub fn read_record(&self, path: &Path, index: RecordIndex) -> Result<Row, DatabaseError> {
        let hint = PageHint {
            page_path: path.to_path_buf(),
            records_before: 0,
        };
        self.read_record_with_hint(path, index, &hint)
    }

    /// Like `read_record`, but starts the chain walk at `hint` instead of
    /// the first page.
    pub fn read_record_with_hint(
        &self,
        path: &Path,
        index: RecordIndex,
        hint: &PageHint,
    ) -> Result<Row, DatabaseError> {
        let first = self.read_page(path)?;
        let total = first.header.total_records;
        if index >= total {
            return Err(DatabaseError::InvalidRecordIndex { index, total });
        }
        let schema = TableSchema::parse(&first.header.schema)?;

        let start = if hint.page_path == path || hint.records_before > index {
            (first, 0)
        } else {
            (self.read_part(&hint.page_path)?, hint.records_before)
        };
        let (page, slot) = self.walk_to(start, index)?;
        let bytes = page.record_bytes(slot, schema.record_size())?;
        let row = Row::from_bytes(&schema, bytes)?;
        Ok(Row::with_row_id(index, row.values))
    }

    /// Follow the chain from `start` until the page owning `index`.
    fn walk_to(
        &self,
        start: (TablePage, usize),
        index: RecordIndex,
    ) -> Result<(TablePage, usize), DatabaseError> {
        let (mut page, mut before) = start;
        for _ in 0..MAX_CHAIN_PAGES {
            if index < before + page.record_count() {
                return Ok((page, index - before));
            }
            before += page.record_count();
            match self.next_page_path(&page)? {
                Some(next) => page = self.read_part(&next)?,
                None => {
                    return Err(DatabaseError::CorruptedPage {
                        path: page.path.clone(),
                        reason: format!(
                            "chain holds {} records, record {} is missing",
                            before, index
                        ),
                    });
                }
            }
        }
        Err(DatabaseError::CorruptedPage {
            path: page.path,
            reason: format!("chain exceeds {} pages", MAX_CHAIN_PAGES),
        })
    }

    /// Delete a record and compact its page. Later records shift down by
    /// one logical index.
    pub fn delete_record(&self, path: &Path, index: RecordIndex) -> Result<(), DatabaseError> {
        let mut first = self.read_page(path)?;
        let total = first.header.total_records;
        if index >= total {
            return Err(DatabaseError::InvalidRecordIndex { index, total });
        }
        let record_size = TableSchema::parse(&first.header.schema)?.record_size();

        if index < first.record_count() {
            first.remove_record(index, record_size)?;
        } else {
            let records_in_first = first.record_count();
            let next = self.next_page_path(&first)?.ok_or_else(|| DatabaseError::CorruptedPage {
                path: path.to_path_buf(),
                reason: format!("record {} lies beyond the last page", index),
            })?;
            let (mut owner, slot) = self.walk_to((self.read_part(&next)?, records_in_first), index)?;
            owner.remove_record(slot, record_size)?;
            self.write_page(&mut owner)?;
        }

        first.header.total_records -= 1;
        self.write_page(&mut first)?;
        debug!("Deleted record {} from {}", index, path.display());
        Ok(())
    }

    pub fn get_all_record_indices(&self, path: &Path) -> Result<Range<RecordIndex>, DatabaseError> {
        Ok(0..self.record_count(path)?)
    }

    pub fn record_count(&self, path: &Path) -> Result<usize, DatabaseError> {
        Ok(self.read_header(path)?.total_records)
    }

    pub fn find_records_by_constant(
        &self,
        path: &Path,
        column: usize,
        operator: &str,
        literal: &Value,
    ) -> Result<Vec<RecordIndex>, DatabaseError> {
        let op: ComparisonOp = operator.parse()?;
        let schema = self.read_schema(path)?;
        let data_type = schema.column(column)?;
        let literal = literal.coerce_to(data_type);
        if !literal.matches_type(data_type) {
            return Err(DatabaseError::IncomparableTypes {
                left: data_type.name().to_string(),
                right: literal.type_name().to_string(),
            });
        }
        self.find_records(path, Predicate::constant(column, op, literal))
    }

    pub fn find_records_by_condition(
        &self,
        path: &Path,
        left: usize,
        operator: &str,
        right: usize,
    ) -> Result<Vec<RecordIndex>, DatabaseError> {
        let op: ComparisonOp = operator.parse()?;
        let schema = self.read_schema(path)?;
        let (left_type, right_type) = (schema.column(left)?, schema.column(right)?);
        if left_type.is_string() != right_type.is_string() {
            return Err(DatabaseError::IncomparableTypes {
                left: left_type.name().to_string(),
                right: right_type.name().to_string(),
            });
        }
        self.find_records(path, Predicate::columns(left, op, right))
    }

    pub fn find_records_by_pattern(
        &self,
        path: &Path,
        column: usize,
        pattern: &str,
        case_sensitive: bool,
    ) -> Result<Vec<RecordIndex>, DatabaseError> {
        let schema = self.read_schema(path)?;
        let data_type = schema.column(column)?;
        if !data_type.is_string() {
            return Err(DatabaseError::NotAStringColumn {
                index: column,
                actual: data_type.name().to_string(),
            });
        }
        self.find_records(path, Predicate::pattern(column, pattern, case_sensitive))
    }

    fn find_records(&self, path: &Path, predicate: Predicate) -> Result<Vec<RecordIndex>, DatabaseError> {
        let scanner = SequentialScanner::new(self, path)?.with_predicate(predicate);
        ScanIterator::new(scanner)
            .map(|row| row.map(|r| r.row_id.unwrap_or_default()))
            .collect()
    }

    /// All live rows in index order.
    pub fn read_all(&self, path: &Path) -> Result<Vec<Row>, DatabaseError> {
        let mut scanner = SequentialScanner::new(self, path)?;
        let mut rows = Vec::new();
        while let Some(row) = scanner.scan()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Delete every page of a table. The chain is resolved before anything
    /// is removed; the primary page goes first.
    pub fn delete_table_file(&self, path: &Path) -> Result<(), DatabaseError> {
        let chain = self.chain_paths(path)?;

        fs::remove_file(path).map_err(|e| DatabaseError::from_io(e, path))?;
        let mut completed = vec![format!("deleted {}", path.display())];

        for part in &chain[1..] {
            if let Err(e) = fs::remove_file(part) {
                return Err(DatabaseError::PartialFailure {
                    step: format!("delete {}", part.display()),
                    completed,
                    source: Box::new(DatabaseError::from_io(e, part)),
                });
            }
            completed.push(format!("deleted {}", part.display()));
        }

        info!("Deleted table file {} ({} pages)", path.display(), chain.len());
        Ok(())
    }

    /// Copy a whole chain so that `dst` and its `_partK` pages form an
    /// independent table. An existing chain at `dst` is replaced.
    pub fn copy_table(&self, src: &Path, dst: &Path) -> Result<(), DatabaseError> {
        let chain = self.chain_paths(src)?;
        let owner = self.read_header(src)?.name;
        if dst.exists() {
            self.delete_table_file(dst)?;
        }

        let targets: Vec<PathBuf> = (0..chain.len()).map(|k| part_path(dst, k)).collect();
        self.check_targets_owned(&targets[1..], &owner, &[])?;
        // tail first so the primary only appears once its parts exist
        for (k, source) in chain.iter().enumerate().rev() {
            let mut page = if k == 0 {
                self.read_page(source)?
            } else {
                self.read_part(source)?
            };
            page.path = targets[k].clone();
            page.header.next_page = targets.get(k + 1).map(|next| pointer_to(&targets[k], next));
            self.write_page(&mut page)?;
        }

        debug!("Copied table {} to {}", src.display(), dst.display());
        Ok(())
    }

    /// Rename a chain over `dst`, replacing whatever chain `dst` held.
    ///
    /// Pages move tail first and the primary last, so `src` exists until the
    /// move is complete. Calling this again after an interrupted move picks
    /// up the pages still left under `src`.
    pub fn move_table(&self, src: &Path, dst: &Path) -> Result<(), DatabaseError> {
        let owner = self.read_header(src)?.name;
        let (pending, moved_tail) = self.pending_move(src, dst, &owner)?;
        let moved = match &moved_tail {
            Some(first) => self.chain_paths(first)?.len(),
            None => 0,
        };
        let total = pending.len() + moved;

        let stale = if dst.exists() {
            self.chain_paths(dst).unwrap_or_else(|e| {
                warn!("Replacing unreadable chain at {}: {}", dst.display(), e);
                Vec::new()
            })
        } else {
            Vec::new()
        };

        let targets: Vec<PathBuf> = (0..pending.len()).map(|k| part_path(dst, k)).collect();
        self.check_targets_owned(&targets[1..], &owner, &stale)?;
        let links: Vec<PathBuf> = targets.iter().cloned().chain(moved_tail).collect();
        let mut completed = Vec::new();

        for (k, source) in pending.iter().enumerate().rev() {
            let step = || format!("move {} to {}", source.display(), targets[k].display());
            let result = (|| {
                let mut page = if k == 0 {
                    self.read_page(source)?
                } else {
                    self.read_part(source)?
                };
                page.header.next_page = links.get(k + 1).map(|next| pointer_to(&targets[k], next));
                self.write_page(&mut page)?;
                fs::rename(source, &targets[k]).map_err(|e| DatabaseError::from_io(e, source))
            })();

            if let Err(err) = result {
                if completed.is_empty() {
                    return Err(err);
                }
                return Err(DatabaseError::PartialFailure {
                    step: step(),
                    completed,
                    source: Box::new(err),
                });
            }
            completed.push(step());
        }

        let live: Vec<PathBuf> = (0..total).map(|k| part_path(dst, k)).collect();
        let mut leftovers: Vec<PathBuf> = stale.into_iter().filter(|p| !live.contains(p)).collect();
        // pages an earlier, interrupted move orphaned past the new tail
        for k in total..MAX_CHAIN_PAGES {
            let candidate = part_path(dst, k);
            if !self.belongs_to(&candidate, &owner) {
                break;
            }
            if !leftovers.contains(&candidate) {
                leftovers.push(candidate);
            }
        }

        for old in &leftovers {
            if let Err(e) = fs::remove_file(old) {
                return Err(DatabaseError::PartialFailure {
                    step: format!("delete stale page {}", old.display()),
                    completed,
                    source: Box::new(DatabaseError::from_io(e, old)),
                });
            }
            completed.push(format!("deleted {}", old.display()));
        }

        debug!("Moved table {} over {}", src.display(), dst.display());
        Ok(())
    }

    /// Pages of `src` that still have to move over `dst`, plus the first
    /// page of a tail that an interrupted move already placed under `dst`.
    fn pending_move(
        &self,
        src: &Path,
        dst: &Path,
        owner: &str,
    ) -> Result<(Vec<PathBuf>, Option<PathBuf>), DatabaseError> {
        let mut header = self.read_header(src)?;
        let mut paths = vec![src.to_path_buf()];

        while let Some(pointer) = header.next_page.take() {
            if paths.len() >= MAX_CHAIN_PAGES {
                return Err(DatabaseError::CorruptedPage {
                    path: src.to_path_buf(),
                    reason: format!("chain exceeds {} pages", MAX_CHAIN_PAGES),
                });
            }
            let current = paths.last().cloned().unwrap_or_default();
            let next = resolve_pointer(&current, &pointer);
            let twin = part_path(dst, paths.len());
            if next == twin || (!next.exists() && self.belongs_to(&twin, owner)) {
                debug!("Resuming move of {} at page {}", src.display(), paths.len());
                return Ok((paths, Some(twin)));
            }
            if !next.exists() {
                return Err(DatabaseError::TablePartNotFound { path: next });
            }
            header = self.read_header(&next).map_err(|e| DatabaseError::NextPointerUnreadable {
                path: next.clone(),
                reason: e.to_string(),
            })?;
            paths.push(next);
        }
        Ok((paths, None))
    }

    /// Whether `path` is a page whose header names table `owner`.
    fn belongs_to(&self, path: &Path, owner: &str) -> bool {
        path.exists()
            && self
                .read_header(path)
                .is_ok_and(|header| header.name == owner)
    }

    /// Refuse to overwrite an existing page of some other table.
    fn check_targets_owned(
        &self,
        targets: &[PathBuf],
        owner: &str,
        replaced: &[PathBuf],
    ) -> Result<(), DatabaseError> {
        for target in targets {
            if target.exists() && !replaced.contains(target) && !self.belongs_to(target, owner) {
                return Err(DatabaseError::PageOwnedByOtherTable {
                    path: target.clone(),
                });
            }
        }
        Ok(())
    }

    /// Smallest `_partK` sibling of `path` that does not exist yet.
    pub fn generate_next_table_part_path(&self, path: &Path) -> Result<PathBuf, DatabaseError> {
        for k in 1..=MAX_CHAIN_PAGES {
            let candidate = part_path(path, k);
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(DatabaseError::CorruptedPage {
            path: path.to_path_buf(),
            reason: format!("no free part name within {} pages", MAX_CHAIN_PAGES),
        })
    }

    /// Every page file of the chain starting at `path`, in order.
    pub fn chain_paths(&self, path: &Path) -> Result<Vec<PathBuf>, DatabaseError> {
        let mut header = self.read_header(path)?;
        let mut paths = vec![path.to_path_buf()];

        while let Some(pointer) = header.next_page.take() {
            if paths.len() >= MAX_CHAIN_PAGES {
                return Err(DatabaseError::CorruptedPage {
                    path: path.to_path_buf(),
                    reason: format!("chain exceeds {} pages", MAX_CHAIN_PAGES),
                });
            }
            let current = paths.last().cloned().unwrap_or_default();
            let next = resolve_pointer(&current, &pointer);
            if !next.exists() {
                return Err(DatabaseError::TablePartNotFound { path: next });
            }
            header = self.read_header(&next).map_err(|e| DatabaseError::NextPointerUnreadable {
                path: next.clone(),
                reason: e.to_string(),
            })?;
            paths.push(next);
        }
        Ok(paths)
    }

    pub fn next_page_path(&self, page: &TablePage) -> Result<Option<PathBuf>, DatabaseError> {
        match &page.header.next_page {
            Some(pointer) => {
                let next = resolve_pointer(&page.path, pointer);
                if !next.exists() {
                    return Err(DatabaseError::TablePartNotFound { path: next });
                }
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }

    pub fn read_page(&self, path: &Path) -> Result<TablePage, DatabaseError> {
        let bytes = fs::read(path).map_err(|e| DatabaseError::from_io(e, path))?;
        TablePage::from_bytes(path, bytes)
    }

    /// Read a page reached through a chain pointer.
    pub fn read_part(&self, path: &Path) -> Result<TablePage, DatabaseError> {
        match self.read_page(path) {
            Err(DatabaseError::FileNotFound { path }) => Err(DatabaseError::TablePartNotFound { path }),
            other => other,
        }
    }

    pub fn read_header(&self, path: &Path) -> Result<TableHeader, DatabaseError> {
        let file = File::open(path).map_err(|e| DatabaseError::from_io(e, path))?;
        let mut buffer = Vec::with_capacity(TABLE_HEADER_SIZE);
        file.take(TABLE_HEADER_SIZE as u64)
            .read_to_end(&mut buffer)
            .map_err(|e| DatabaseError::from_io(e, path))?;
        TableHeader::from_bytes(&buffer, path)
    }

    pub fn read_schema(&self, path: &Path) -> Result<TableSchema, DatabaseError> {
        TableSchema::parse(&self.read_header(path)?.schema)
    }

    pub fn write_page(&self, page: &mut TablePage) -> Result<(), DatabaseError> {
        page.sync_header()?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&page.path)
            .map_err(|e| DatabaseError::from_io(e, &page.path))?;
        file.write_all(page.as_bytes())?;
        file.flush()?;
        page.is_dirty = false;
        Ok(())
    }
}

/// `<stem>_part<k><.ext>` next to `path`; `k == 0` is `path` itself.
pub fn part_path(path: &Path, k: usize) -> PathBuf {
    if k == 0 {
        return path.to_path_buf();
    }
    let mut file_name: OsString = path.file_stem().map(OsString::from).unwrap_or_default();
    file_name.push(format!("{}{}", PART_INFIX, k));
    if let Some(ext) = path.extension() {
        file_name.push(".");
        file_name.push(ext);
    }
    path.with_file_name(file_name)
}

/// Names ending like a shadow copy (`_tmp`) or an overflow page
/// (`_part<k>`) would share files with the pages of another table.
pub fn is_reserved_table_name(name: &str) -> bool {
    if name.ends_with(SHADOW_SUFFIX) {
        return true;
    }
    match name.rsplit_once(PART_INFIX) {
        Some((_, k)) => !k.is_empty() && k.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Pointer stored in `from`'s header for `target`. Pages of one chain share
/// a directory, so the bare file name is enough and survives renames of
/// the directory.
fn pointer_to(from: &Path, target: &Path) -> PathBuf {
    match (from.parent(), target.parent(), target.file_name()) {
        (Some(a), Some(b), Some(name)) if a == b => PathBuf::from(name),
        _ => target.to_path_buf(),
    }
}

fn resolve_pointer(from: &Path, pointer: &Path) -> PathBuf {
    if pointer.is_absolute() {
        return pointer.to_path_buf();
    }
    match from.parent() {
        Some(dir) => dir.join(pointer),
        None => pointer.to_path_buf(),
    }
}

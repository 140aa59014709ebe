use std::path::{Path, PathBuf};

use crate::{
    storage::header::TableHeader,
    types::{INDEX_ENTRY_SIZE, TABLE_HEADER_SIZE, error::DatabaseError},
};

/*
 * Page Layout on Disk
 * ┌─────────────────────────────────────────────────────────────────┐
 * │                 TABLE HEADER (258 bytes)                        │
 * ├─────────────────────────────────────────────────────────────────┤
 * │  RECORD DATA  [rec 0][rec 1][rec 2] ...           grows  ──▶    │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    FREE SPACE                                   │
 * ├─────────────────────────────────────────────────────────────────┤
 * │  INDEX   ◀── grows   ... [off 2][off 1][off 0]   (i64 each)     │
 * └─────────────────────────────────────────────────────────────────┘
 * Index entry i lives at len - 8 * (i + 1) and holds the absolute byte
 * offset of record i inside this page.
 */
pub struct TablePage {
    pub path: PathBuf,
    pub header: TableHeader,
    data: Vec<u8>,
    pub is_dirty: bool,
}

impl TablePage {
    /// Fresh page of `page_size` bytes with no records.
    pub fn new(path: &Path, header: TableHeader, page_size: usize) -> Result<Self, DatabaseError> {
        if page_size < TABLE_HEADER_SIZE + INDEX_ENTRY_SIZE {
            return Err(DatabaseError::CorruptedPage {
                path: path.to_path_buf(),
                reason: format!("page size {} is smaller than the header", page_size),
            });
        }
        let mut data = vec![0u8; page_size];
        header.write_into(&mut data[..TABLE_HEADER_SIZE])?;
        Ok(Self {
            path: path.to_path_buf(),
            header,
            data,
            is_dirty: true,
        })
    }

    pub fn from_bytes(path: &Path, data: Vec<u8>) -> Result<Self, DatabaseError> {
        let header = TableHeader::from_bytes(&data, path)?;

        let index_bytes = header.records_in_page * INDEX_ENTRY_SIZE;
        if TABLE_HEADER_SIZE + index_bytes > data.len() {
            return Err(DatabaseError::InvalidIndexPosition {
                position: data.len() as i64 - index_bytes as i64,
                header_size: TABLE_HEADER_SIZE,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            header,
            data,
            is_dirty: false,
        })
    }

    /// Copy the header fields into the buffer so `as_bytes` is current.
    pub fn sync_header(&mut self) -> Result<(), DatabaseError> {
        self.header.write_into(&mut self.data[..TABLE_HEADER_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn page_size(&self) -> usize {
        self.data.len()
    }

    pub fn record_count(&self) -> usize {
        self.header.records_in_page
    }

    pub fn index_entry_position(&self, slot: usize) -> usize {
        self.data.len() - INDEX_ENTRY_SIZE * (slot + 1)
    }

    /// First byte of the index region.
    fn index_start(&self) -> usize {
        self.data.len() - INDEX_ENTRY_SIZE * self.header.records_in_page
    }

    pub fn record_offset(&self, slot: usize) -> Result<usize, DatabaseError> {
        if slot >= self.header.records_in_page {
            return Err(DatabaseError::InvalidRecordIndex {
                index: slot,
                total: self.header.records_in_page,
            });
        }
        let at = self.index_entry_position(slot);
        let mut raw = [0u8; INDEX_ENTRY_SIZE];
        raw.copy_from_slice(&self.data[at..at + INDEX_ENTRY_SIZE]);
        let offset = i64::from_be_bytes(raw);

        if offset < TABLE_HEADER_SIZE as i64 || offset >= self.index_start() as i64 {
            return Err(DatabaseError::InvalidDataOffset { offset });
        }
        Ok(offset as usize)
    }

    fn write_index_entry(&mut self, slot: usize, offset: usize) {
        let at = self.index_entry_position(slot);
        self.data[at..at + INDEX_ENTRY_SIZE].copy_from_slice(&(offset as i64).to_be_bytes());
    }

    /// End of the data region. Records of a table share one size and are
    /// kept contiguous, so this follows from the count alone.
    pub fn data_end(&self, record_size: usize) -> usize {
        TABLE_HEADER_SIZE + self.header.records_in_page * record_size
    }

    pub fn can_fit(&self, record_size: usize) -> bool {
        let next = self.header.records_in_page + 1;
        TABLE_HEADER_SIZE + next * record_size + next * INDEX_ENTRY_SIZE <= self.data.len()
    }

    /// Append an encoded record and its index entry. Returns the in-page slot.
    pub fn append_record(&mut self, record: &[u8]) -> Result<usize, DatabaseError> {
        if !self.can_fit(record.len()) {
            return Err(DatabaseError::RecordTooLarge {
                size: record.len(),
                page_size: self.data.len(),
            });
        }
        let slot = self.header.records_in_page;
        let offset = self.data_end(record.len());
        self.data[offset..offset + record.len()].copy_from_slice(record);

        self.header.records_in_page += 1;
        self.write_index_entry(slot, offset);
        self.is_dirty = true;
        Ok(slot)
    }

    pub fn record_bytes(&self, slot: usize, record_size: usize) -> Result<&[u8], DatabaseError> {
        let offset = self.record_offset(slot)?;
        let end = offset + record_size;
        if end > self.index_start() {
            return Err(DatabaseError::InvalidDataOffset {
                offset: offset as i64,
            });
        }
        Ok(&self.data[offset..end])
    }

    /// Remove the record in `slot`, shifting later records and index
    /// entries of this page down by one.
    pub fn remove_record(&mut self, slot: usize, record_size: usize) -> Result<(), DatabaseError> {
        let count = self.header.records_in_page;
        let mut offsets = (0..count)
            .map(|s| self.record_offset(s))
            .collect::<Result<Vec<_>, _>>()?;
        let removed = offsets.remove(slot);

        let data_end = self.data_end(record_size);
        let tail_start = removed + record_size;
        if tail_start > data_end {
            return Err(DatabaseError::InvalidDataOffset {
                offset: removed as i64,
            });
        }
        self.data.copy_within(tail_start..data_end, removed);
        self.data[data_end - record_size..data_end].fill(0);

        // zero the whole old index region, then rewrite it one entry shorter
        let old_index_start = self.index_start();
        let len = self.data.len();
        self.data[old_index_start..len].fill(0);
        self.header.records_in_page -= 1;
        for (s, offset) in offsets.into_iter().enumerate() {
            let adjusted = if offset > removed {
                offset - record_size
            } else {
                offset
            };
            self.write_index_entry(s, adjusted);
        }

        self.is_dirty = true;
        Ok(())
    }
}

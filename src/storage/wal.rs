use std::{
    collections::BTreeMap,
    fmt,
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::{Local, NaiveDateTime};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::types::{TransactionId, error::DatabaseError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogOperation {
    Begin,
    Commit,
    Rollback,
    CreateTable,
    DropTable,
    InsertRecord,
    DeleteRecord,
}

impl LogOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogOperation::Begin => "BEGIN",
            LogOperation::Commit => "COMMIT",
            LogOperation::Rollback => "ROLLBACK",
            LogOperation::CreateTable => "CREATE_TABLE",
            LogOperation::DropTable => "DROP_TABLE",
            LogOperation::InsertRecord => "INSERT_RECORD",
            LogOperation::DeleteRecord => "DELETE_RECORD",
        }
    }
}

impl fmt::Display for LogOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogOperation {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BEGIN" => Ok(LogOperation::Begin),
            "COMMIT" => Ok(LogOperation::Commit),
            "ROLLBACK" => Ok(LogOperation::Rollback),
            "CREATE_TABLE" => Ok(LogOperation::CreateTable),
            "DROP_TABLE" => Ok(LogOperation::DropTable),
            "INSERT_RECORD" => Ok(LogOperation::InsertRecord),
            "DELETE_RECORD" => Ok(LogOperation::DeleteRecord),
            other => Err(DatabaseError::InvalidLogField {
                value: other.to_string(),
                reason: "unknown operation".to_string(),
            }),
        }
    }
}

/// One line of the log:
/// `[<timestamp>] <OPERATION> <transaction> <table> <data>`.
///
/// The transaction field carries the transaction id; a BEGIN entry keeps the
/// transaction's name in `data`. Empty fields are written as empty strings.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: NaiveDateTime,
    pub operation: LogOperation,
    pub transaction: String,
    pub table_name: String,
    pub data: String,
}

impl LogEntry {
    pub fn new(operation: LogOperation, transaction: &str, table_name: &str, data: &str) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            operation,
            transaction: transaction.to_string(),
            table_name: table_name.to_string(),
            data: data.to_string(),
        }
    }

    pub fn to_log_line(&self) -> String {
        format!(
            "[{}] {} {} {} {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.operation,
            self.transaction,
            self.table_name,
            self.data
        )
    }

    /// Parse one line. Missing trailing fields read as empty.
    pub fn parse(line: &str) -> Result<Self, DatabaseError> {
        let malformed = |reason: &str| DatabaseError::InvalidLogField {
            value: line.to_string(),
            reason: reason.to_string(),
        };

        let rest = line
            .strip_prefix('[')
            .ok_or_else(|| malformed("missing timestamp"))?;
        let (timestamp, rest) = rest
            .split_once("] ")
            .ok_or_else(|| malformed("unterminated timestamp"))?;
        let timestamp = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S%.f")
            .map_err(|e| malformed(&e.to_string()))?;

        let mut fields = rest.splitn(4, ' ');
        let operation = fields.next().unwrap_or_default().parse()?;
        let transaction = fields.next().unwrap_or_default();
        let table_name = fields.next().unwrap_or_default();
        let data = fields.next().unwrap_or_default();

        Ok(Self {
            timestamp,
            operation,
            transaction: transaction.to_string(),
            table_name: table_name.to_string(),
            data: data.to_string(),
        })
    }
}

/// Outcome of replaying the log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveryResult {
    pub entries_read: usize,
    pub skipped_lines: usize,
    /// Transaction id to name for every BEGIN without COMMIT or ROLLBACK.
    pub unfinished: BTreeMap<TransactionId, String>,
}

/// Append-only text journal. Every `log_*` call is flushed and synced to
/// disk before it returns; the writer is shared behind a mutex so entries
/// from several threads land in call-return order.
pub struct WriteAheadLog {
    path: PathBuf,
    backup_path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    active: Mutex<BTreeMap<TransactionId, String>>,
}

impl WriteAheadLog {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let mut backup_name = path.as_os_str().to_os_string();
        backup_name.push(".backup");
        Self::open_with_backup(path, &PathBuf::from(backup_name))
    }

    pub fn open_with_backup(path: &Path, backup_path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DatabaseError::from_io(e, parent))?;
        }
        let file = Self::open_append(path)?;
        debug!("Opened write-ahead log {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            backup_path: backup_path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
            active: Mutex::new(BTreeMap::new()),
        })
    }

    fn open_append(path: &Path) -> Result<File, DatabaseError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| DatabaseError::from_io(e, path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    fn append(&self, entry: &LogEntry) -> Result<(), DatabaseError> {
        let line = entry.to_log_line();
        let mut writer = self.writer.lock();
        let durable = (|| -> std::io::Result<()> {
            writeln!(writer, "{}", line)?;
            writer.flush()?;
            writer.get_ref().sync_data()
        })();
        durable.map_err(|e| DatabaseError::LogWrite {
            reason: format!("{}: {}", self.path.display(), e),
        })
    }

    pub fn log_begin_transaction(&self, id: &str, name: &str) -> Result<(), DatabaseError> {
        check_token(id, "transaction id")?;
        check_token(name, "transaction name")?;
        self.append(&LogEntry::new(LogOperation::Begin, id, "", name))?;
        self.active.lock().insert(id.to_string(), name.to_string());
        Ok(())
    }

    pub fn log_commit_transaction(&self, id: &str) -> Result<(), DatabaseError> {
        check_token(id, "transaction id")?;
        self.append(&LogEntry::new(LogOperation::Commit, id, "", ""))?;
        self.active.lock().remove(id);
        Ok(())
    }

    pub fn log_rollback_transaction(&self, id: &str) -> Result<(), DatabaseError> {
        check_token(id, "transaction id")?;
        self.append(&LogEntry::new(LogOperation::Rollback, id, "", ""))?;
        self.active.lock().remove(id);
        Ok(())
    }

    pub fn log_create_table(&self, id: Option<&str>, table: &str, schema: &str) -> Result<(), DatabaseError> {
        self.log_table_operation(LogOperation::CreateTable, id, table, schema)
    }

    pub fn log_drop_table(&self, id: Option<&str>, table: &str) -> Result<(), DatabaseError> {
        self.log_table_operation(LogOperation::DropTable, id, table, "")
    }

    pub fn log_insert_record(&self, id: Option<&str>, table: &str, record: &str) -> Result<(), DatabaseError> {
        self.log_table_operation(LogOperation::InsertRecord, id, table, record)
    }

    pub fn log_delete_record(&self, id: Option<&str>, table: &str, index: usize) -> Result<(), DatabaseError> {
        self.log_table_operation(LogOperation::DeleteRecord, id, table, &index.to_string())
    }

    fn log_table_operation(
        &self,
        operation: LogOperation,
        id: Option<&str>,
        table: &str,
        data: &str,
    ) -> Result<(), DatabaseError> {
        let id = id.unwrap_or_default();
        if !id.is_empty() {
            check_token(id, "transaction id")?;
        }
        check_token(table, "table name")?;
        if data.contains(['\n', '\r']) {
            return Err(DatabaseError::InvalidLogField {
                value: data.to_string(),
                reason: "data must be a single line".to_string(),
            });
        }
        self.append(&LogEntry::new(operation, id, table, data))
    }

    /// Every well-formed entry in append order. Malformed lines are skipped.
    pub fn read_entries(&self) -> Result<Vec<LogEntry>, DatabaseError> {
        Ok(self.scan()?.0)
    }

    fn scan(&self) -> Result<(Vec<LogEntry>, usize), DatabaseError> {
        // make buffered entries visible to the reader
        self.writer.lock().flush()?;

        let file = File::open(&self.path).map_err(|e| DatabaseError::from_io(e, &self.path))?;
        let mut entries = Vec::new();
        let mut skipped = 0;
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match LogEntry::parse(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!("Skipping malformed log line {}: {}", number + 1, e);
                    skipped += 1;
                }
            }
        }
        Ok((entries, skipped))
    }

    /// Replay the log from the start to find transactions left open.
    /// Data operations are counted but not reapplied.
    pub fn recover(&self) -> Result<RecoveryResult, DatabaseError> {
        let (entries, skipped_lines) = self.scan()?;
        let mut unfinished = BTreeMap::new();

        for entry in &entries {
            match entry.operation {
                LogOperation::Begin => {
                    unfinished.insert(entry.transaction.clone(), entry.data.clone());
                }
                LogOperation::Commit | LogOperation::Rollback => {
                    if unfinished.remove(&entry.transaction).is_none() {
                        warn!(
                            "{} for unknown transaction '{}'",
                            entry.operation, entry.transaction
                        );
                    }
                }
                _ => {}
            }
        }

        *self.active.lock() = unfinished.clone();
        info!(
            "Recovered {} log entries, {} unfinished transactions",
            entries.len(),
            unfinished.len()
        );
        Ok(RecoveryResult {
            entries_read: entries.len(),
            skipped_lines,
            unfinished,
        })
    }

    /// Ids of transactions begun but not finished, in sorted order.
    pub fn get_unfinished_transactions(&self) -> Vec<TransactionId> {
        self.active.lock().keys().cloned().collect()
    }

    pub fn active_transactions(&self) -> BTreeMap<TransactionId, String> {
        self.active.lock().clone()
    }

    /// Move the current log aside to the backup path and start an empty one.
    pub fn truncate_log(&self) -> Result<(), DatabaseError> {
        let mut writer = self.writer.lock();
        writer.flush().map_err(|e| DatabaseError::LogWrite {
            reason: e.to_string(),
        })?;
        fs::rename(&self.path, &self.backup_path)
            .map_err(|e| DatabaseError::from_io(e, &self.path))?;
        *writer = BufWriter::new(Self::open_append(&self.path)?);
        info!(
            "Truncated write-ahead log, previous entries kept in {}",
            self.backup_path.display()
        );
        Ok(())
    }
}

fn check_token(value: &str, what: &str) -> Result<(), DatabaseError> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(DatabaseError::InvalidLogField {
            value: value.to_string(),
            reason: format!("{} must be non-empty and contain no whitespace", what),
        });
    }
    Ok(())
}

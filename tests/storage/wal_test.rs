use std::{fs, sync::Arc, thread};

use tabula::{
    storage::wal::{LogEntry, LogOperation, WriteAheadLog},
    types::error::{DatabaseError, ErrorKind},
    utils::mock::TempDatabase,
};

fn open_log(db: &TempDatabase) -> WriteAheadLog {
    WriteAheadLog::open_with_backup(&db.config.log_path(), &db.config.log_backup_path()).unwrap()
}

#[test]
fn test_entries_are_durable_on_return() -> Result<(), DatabaseError> {
    let db = TempDatabase::new();
    let wal = open_log(&db);
    wal.log_begin_transaction("txn-1", "first")?;
    wal.log_insert_record(Some("txn-1"), "users", "1,Alice Smith")?;

    // visible to an independent reader without closing the log
    let text = fs::read_to_string(db.config.log_path())?;
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with('['));
    assert!(lines[0].ends_with("] BEGIN txn-1  first"));
    assert!(lines[1].ends_with("] INSERT_RECORD txn-1 users 1,Alice Smith"));
    Ok(())
}

#[test]
fn test_parse_tolerates_missing_trailing_fields() -> Result<(), DatabaseError> {
    let entry = LogEntry::parse("[2024-05-01 10:00:00.123] COMMIT txn-9")?;
    assert_eq!(entry.operation, LogOperation::Commit);
    assert_eq!(entry.transaction, "txn-9");
    assert_eq!(entry.table_name, "");
    assert_eq!(entry.data, "");

    let entry = LogEntry::parse("[2024-05-01 10:00:00] CREATE_TABLE  users int,str_20")?;
    assert_eq!(entry.operation, LogOperation::CreateTable);
    assert_eq!(entry.transaction, "");
    assert_eq!(entry.table_name, "users");
    assert_eq!(entry.data, "int,str_20");
    Ok(())
}

#[test]
fn test_parse_rejects_malformed_lines() {
    for line in ["no timestamp", "[2024-05-01 10:00:00] EXPLODE a b", "[yesterday] BEGIN a"] {
        assert!(LogEntry::parse(line).is_err(), "'{}' should not parse", line);
    }
}

#[test]
fn test_log_line_round_trip_keeps_spaces_in_data() -> Result<(), DatabaseError> {
    let entry = LogEntry::new(LogOperation::InsertRecord, "", "notes", "a b  c");
    let parsed = LogEntry::parse(&entry.to_log_line())?;
    assert_eq!(parsed.data, "a b  c");
    assert_eq!(parsed.table_name, "notes");
    Ok(())
}

#[test]
fn test_recover_finds_unfinished_transactions() -> Result<(), DatabaseError> {
    let db = TempDatabase::new();
    {
        let wal = open_log(&db);
        wal.log_begin_transaction("txn-1", "done")?;
        wal.log_commit_transaction("txn-1")?;
        wal.log_begin_transaction("txn-2", "undone")?;
        wal.log_delete_record(Some("txn-2"), "users", 3)?;
        wal.log_begin_transaction("txn-3", "aborted")?;
        wal.log_rollback_transaction("txn-3")?;
    }
    fs::OpenOptions::new()
        .append(true)
        .open(db.config.log_path())
        .and_then(|mut f| std::io::Write::write_all(&mut f, b"garbage line\n"))?;

    let wal = open_log(&db);
    let result = wal.recover()?;
    assert_eq!(result.entries_read, 6);
    assert_eq!(result.skipped_lines, 1);
    assert_eq!(result.unfinished.len(), 1);
    assert_eq!(result.unfinished.get("txn-2").map(String::as_str), Some("undone"));
    assert_eq!(wal.get_unfinished_transactions(), vec!["txn-2".to_string()]);
    Ok(())
}

#[test]
fn test_whitespace_in_identifiers_is_rejected() {
    let db = TempDatabase::new();
    let wal = open_log(&db);
    let result = wal.log_begin_transaction("txn 1", "x");
    assert!(matches!(result, Err(DatabaseError::InvalidLogField { .. })));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);
    assert!(wal.log_create_table(None, "my table", "int").is_err());
    assert!(wal.log_insert_record(None, "t", "line\nbreak").is_err());
    assert!(wal.read_entries().unwrap().is_empty());
}

#[test]
fn test_truncate_log_keeps_backup() -> Result<(), DatabaseError> {
    let db = TempDatabase::new();
    let wal = open_log(&db);
    wal.log_create_table(None, "users", "int")?;
    wal.truncate_log()?;

    assert!(wal.read_entries()?.is_empty());
    let backup = fs::read_to_string(db.config.log_backup_path())?;
    assert!(backup.contains("CREATE_TABLE"));

    wal.log_drop_table(None, "users")?;
    let entries = wal.read_entries()?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, LogOperation::DropTable);
    Ok(())
}

#[test]
fn test_concurrent_writers_produce_whole_lines() -> Result<(), DatabaseError> {
    let db = TempDatabase::new();
    let wal = Arc::new(open_log(&db));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let wal = Arc::clone(&wal);
            thread::spawn(move || {
                for i in 0..25 {
                    wal.log_insert_record(None, &format!("t{}", t), &i.to_string())
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let entries = wal.read_entries()?;
    assert_eq!(entries.len(), 100);
    assert!(entries.iter().all(|e| e.operation == LogOperation::InsertRecord));
    Ok(())
}

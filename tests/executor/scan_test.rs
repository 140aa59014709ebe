use tabula::{
    executor::{
        predicate::{ComparisonOp, Predicate},
        scan::{ScanIterator, Scanner},
        sequential_scan::SequentialScanner,
    },
    storage::table_store::TableStore,
    types::{error::DatabaseError, row::Row, value::Value},
    utils::mock::{SMALL_PAGE_SIZE, TempDatabase},
};

// spans three pages at 21 records per small page
const ROWS: i32 = 50;

fn populated(db: &TempDatabase) -> (TableStore, std::path::PathBuf) {
    let store = db.store();
    let path = db.table_path("people");
    store.create_table(&path, "people", &["int", "str_20"]).unwrap();
    for i in 0..ROWS {
        let name = if i % 2 == 0 { "even" } else { "odd" };
        store
            .add_record(&path, &[Value::Integer(i), Value::from(name)])
            .unwrap();
    }
    (store, path)
}

fn ids(rows: &[Row]) -> Vec<i32> {
    rows.iter()
        .map(|row| match row.values[0] {
            Value::Integer(id) => id,
            ref other => panic!("expected integer id, got {:?}", other),
        })
        .collect()
}

#[test]
fn test_scan_walks_whole_chain_in_order() -> Result<(), DatabaseError> {
    let db = TempDatabase::with_page_size(SMALL_PAGE_SIZE);
    let (store, path) = populated(&db);
    assert_eq!(store.chain_paths(&path)?.len(), 3);

    let mut scanner = SequentialScanner::new(&store, &path)?;
    let mut rows = Vec::new();
    while let Some(row) = scanner.scan()? {
        rows.push(row);
    }

    assert_eq!(ids(&rows), (0..ROWS).collect::<Vec<_>>());
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.row_id, Some(i));
    }
    assert_eq!(scanner.scan()?, None);
    Ok(())
}

#[test]
fn test_scan_empty_table() -> Result<(), DatabaseError> {
    let db = TempDatabase::new();
    let store = db.store();
    let path = db.table_path("empty");
    store.create_table(&path, "empty", &["int"])?;

    let mut scanner = SequentialScanner::new(&store, &path)?;
    assert_eq!(scanner.schema().to_string(), "int");
    assert!(scanner.scan()?.is_none());
    assert!(scanner.scan_batch(10)?.is_empty());
    Ok(())
}

#[test]
fn test_reset_restarts_from_first_record() -> Result<(), DatabaseError> {
    let db = TempDatabase::with_page_size(SMALL_PAGE_SIZE);
    let (store, path) = populated(&db);

    let mut scanner = SequentialScanner::new(&store, &path)?;
    let first = scanner.scan_batch(30)?;
    assert_eq!(first.len(), 30);
    scanner.reset()?;

    let again = scanner.scan()?.unwrap();
    assert_eq!(again.row_id, Some(0));
    assert_eq!(again.values[0], Value::Integer(0));
    Ok(())
}

#[test]
fn test_scan_batch_sizes() -> Result<(), DatabaseError> {
    let db = TempDatabase::with_page_size(SMALL_PAGE_SIZE);
    let (store, path) = populated(&db);

    let mut scanner = SequentialScanner::new(&store, &path)?;
    let mut sizes = Vec::new();
    loop {
        let batch = scanner.scan_batch(16)?;
        if batch.is_empty() {
            break;
        }
        sizes.push(batch.len());
    }
    assert_eq!(sizes, vec![16, 16, 16, 2]);
    Ok(())
}

#[test]
fn test_predicate_filters_but_keeps_record_indices() -> Result<(), DatabaseError> {
    let db = TempDatabase::with_page_size(SMALL_PAGE_SIZE);
    let (store, path) = populated(&db);

    let scanner = SequentialScanner::new(&store, &path)?
        .with_predicate(Predicate::pattern(1, "odd", true));
    let rows = ScanIterator::new(scanner).collect::<Result<Vec<_>, _>>()?;

    assert_eq!(rows.len(), 25);
    for (row, id) in rows.iter().zip(ids(&rows)) {
        assert_eq!(id % 2, 1);
        assert_eq!(row.row_id, Some(id as usize));
    }
    Ok(())
}

#[test]
fn test_predicate_error_stops_the_scan() -> Result<(), DatabaseError> {
    let db = TempDatabase::with_page_size(SMALL_PAGE_SIZE);
    let (store, path) = populated(&db);

    let mut scanner = SequentialScanner::new(&store, &path)?.with_predicate(Predicate::constant(
        1,
        ComparisonOp::Equal,
        Value::Integer(3),
    ));
    assert!(matches!(
        scanner.scan(),
        Err(DatabaseError::IncomparableTypes { .. })
    ));
    Ok(())
}

#[test]
fn test_scan_after_deletes() -> Result<(), DatabaseError> {
    let db = TempDatabase::with_page_size(SMALL_PAGE_SIZE);
    let (store, path) = populated(&db);
    store.delete_record(&path, 49)?;
    store.delete_record(&path, 21)?;
    store.delete_record(&path, 0)?;

    let rows = ScanIterator::new(SequentialScanner::new(&store, &path)?)
        .collect::<Result<Vec<_>, _>>()?;
    let expected: Vec<i32> = (0..ROWS).filter(|i| ![0, 21, 49].contains(i)).collect();
    assert_eq!(ids(&rows), expected);
    assert_eq!(rows.last().and_then(|row| row.row_id), Some(46));
    Ok(())
}

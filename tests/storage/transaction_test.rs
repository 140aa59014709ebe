use std::{fs, sync::Arc};

use tabula::{
    storage::{
        catalog::Catalog,
        table_store::{TableStore, part_path},
        transaction::{TransactionManager, shadow_path},
        wal::WriteAheadLog,
    },
    types::{error::DatabaseError, value::Value},
    utils::mock::{SMALL_PAGE_SIZE, TempDatabase},
};

struct Fixture {
    db: TempDatabase,
    store: TableStore,
    catalog: Catalog,
    wal: Arc<WriteAheadLog>,
    manager: TransactionManager,
}

fn fixture(page_size: usize) -> Fixture {
    let db = TempDatabase::with_page_size(page_size);
    let store = db.store();
    let catalog = db.create_catalog().unwrap();
    let wal = Arc::new(
        WriteAheadLog::open_with_backup(&db.config.log_path(), &db.config.log_backup_path())
            .unwrap(),
    );
    let manager = TransactionManager::new(db.config.clone(), store.clone(), Arc::clone(&wal));

    let path = db.table_path("t");
    store.create_table(&path, "t", &["int", "str_20"]).unwrap();
    catalog.add_table_reference(&path).unwrap();
    store.add_record(&path, &[Value::Integer(1), Value::from("Alice")]).unwrap();

    Fixture {
        db,
        store,
        catalog,
        wal,
        manager,
    }
}

#[test]
fn test_begin_shadows_every_table() -> Result<(), DatabaseError> {
    let mut f = fixture(SMALL_PAGE_SIZE);
    let primary = f.db.table_path("t");

    assert_eq!(f.manager.get_actual_table_path("t"), primary);
    let id = f.manager.begin(&f.catalog, Some("load"))?;
    assert!(f.manager.is_in_transaction());

    let shadow = f.manager.get_temp_table_path("t");
    assert!(shadow.ends_with("t_tmp.tbl"));
    assert!(shadow.exists());
    assert_eq!(f.manager.get_actual_table_path("t"), shadow);
    assert_eq!(fs::read(&shadow)?, fs::read(&primary)?);
    assert_eq!(f.wal.get_unfinished_transactions(), vec![id]);
    Ok(())
}

#[test]
fn test_rollback_restores_primary_bytes() -> Result<(), DatabaseError> {
    let mut f = fixture(SMALL_PAGE_SIZE);
    let primary = f.db.table_path("t");
    let before = fs::read(&primary)?;

    f.manager.begin(&f.catalog, None)?;
    let working = f.manager.get_actual_table_path("t");
    for i in 0..40 {
        f.store.add_record(&working, &[Value::Integer(i), Value::from("x")])?;
    }
    f.store.delete_record(&working, 0)?;
    f.manager.rollback()?;

    assert_eq!(fs::read(&primary)?, before);
    assert!(!part_path(&primary, 1).exists());
    assert!(!shadow_path(&primary).exists());
    assert!(!part_path(&shadow_path(&primary), 1).exists());
    assert!(!f.manager.is_in_transaction());
    assert_eq!(f.manager.get_actual_table_path("t"), primary);
    assert!(f.wal.get_unfinished_transactions().is_empty());
    Ok(())
}

#[test]
fn test_commit_installs_shadow_contents() -> Result<(), DatabaseError> {
    let mut f = fixture(65536);
    let primary = f.db.table_path("t");

    f.manager.begin(&f.catalog, None)?;
    let working = f.manager.get_actual_table_path("t");
    f.store.add_record(&working, &[Value::Integer(2), Value::from("Bob")])?;
    let shadow_bytes = fs::read(&working)?;
    f.manager.commit()?;

    assert_eq!(fs::read(&primary)?, shadow_bytes);
    assert!(!working.exists());
    assert_eq!(f.store.record_count(&primary)?, 2);
    assert!(f.wal.get_unfinished_transactions().is_empty());
    Ok(())
}

#[test]
fn test_commit_of_multi_page_shadow() -> Result<(), DatabaseError> {
    let mut f = fixture(SMALL_PAGE_SIZE);
    let primary = f.db.table_path("t");

    f.manager.begin(&f.catalog, None)?;
    let working = f.manager.get_actual_table_path("t");
    for i in 0..40 {
        f.store.add_record(&working, &[Value::Integer(i), Value::from("x")])?;
    }
    // the primary never grew while the shadow did
    assert!(!part_path(&primary, 1).exists());
    f.manager.commit()?;

    assert_eq!(f.store.record_count(&primary)?, 41);
    assert_eq!(f.store.chain_paths(&primary)?.len(), 2);
    assert_eq!(f.store.read_record(&primary, 40)?.values[0], Value::Integer(39));
    assert!(!part_path(&working, 1).exists());
    Ok(())
}

#[test]
fn test_single_active_transaction() -> Result<(), DatabaseError> {
    let mut f = fixture(SMALL_PAGE_SIZE);
    f.manager.begin(&f.catalog, None)?;
    assert!(matches!(
        f.manager.begin(&f.catalog, None),
        Err(DatabaseError::TransactionAlreadyActive { .. })
    ));
    f.manager.commit()?;
    assert!(matches!(
        f.manager.commit(),
        Err(DatabaseError::NoActiveTransaction)
    ));
    assert!(matches!(
        f.manager.rollback(),
        Err(DatabaseError::NoActiveTransaction)
    ));
    Ok(())
}

#[test]
fn test_temp_table_helpers() -> Result<(), DatabaseError> {
    let mut f = fixture(SMALL_PAGE_SIZE);
    f.manager.begin(&f.catalog, None)?;

    let late = f.db.table_path("late");
    f.store.create_table(&late, "late", &["int"])?;
    let shadow = f.manager.create_temp_table_copy("late")?;
    assert!(shadow.exists());
    assert_eq!(f.manager.get_actual_table_path("late"), shadow);
    assert_eq!(f.manager.shadowed_tables(), vec!["late", "t"]);

    f.manager.delete_temp_table("late")?;
    assert!(!shadow.exists());
    assert_eq!(f.manager.get_actual_table_path("late"), late);
    Ok(())
}

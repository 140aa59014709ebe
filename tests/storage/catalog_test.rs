use std::fs;

use tabula::{
    storage::{catalog::Catalog, table_store::TableStore},
    types::{CATALOG_CAPACITY, error::DatabaseError},
    utils::mock::TempDatabase,
};

fn header_table_count(catalog: &Catalog) -> i32 {
    let bytes = fs::read(catalog.path()).unwrap();
    i32::from_be_bytes([bytes[50], bytes[51], bytes[52], bytes[53]])
}

#[test]
fn test_create_database_writes_header() -> Result<(), DatabaseError> {
    let db = TempDatabase::new();
    let catalog = db.create_catalog()?;

    assert_eq!(fs::metadata(catalog.path())?.len(), 54);
    assert_eq!(catalog.name()?, "master");
    assert_eq!(catalog.table_count()?, 0);
    assert!(catalog.get_all_table_names()?.is_empty());
    Ok(())
}

#[test]
fn test_add_and_remove_keep_count_consistent() -> Result<(), DatabaseError> {
    let db = TempDatabase::new();
    let catalog = db.create_catalog()?;

    for name in ["users", "orders", "items"] {
        catalog.add_table_reference(&db.table_path(name))?;
    }
    assert_eq!(header_table_count(&catalog), 3);
    assert_eq!(fs::metadata(catalog.path())?.len(), 54 + 3 * 100);

    catalog.remove_table_reference(&db.table_path("orders"))?;
    assert_eq!(header_table_count(&catalog), 2);
    assert_eq!(catalog.get_all_table_names()?, vec!["users", "items"]);

    // removing an absent reference is a no-op
    catalog.remove_table_reference(&db.table_path("orders"))?;
    assert_eq!(header_table_count(&catalog), 2);
    Ok(())
}

#[test]
fn test_duplicate_reference_is_rejected() -> Result<(), DatabaseError> {
    let db = TempDatabase::new();
    let catalog = db.create_catalog()?;
    let path = db.table_path("users");
    catalog.add_table_reference(&path)?;

    // a different spelling of the same file
    let dotted = db.data_dir().join(".").join("users.tbl");
    assert!(matches!(
        catalog.add_table_reference(&dotted),
        Err(DatabaseError::DuplicateTableReference { .. })
    ));
    Ok(())
}

#[test]
fn test_is_table_exists_normalizes_paths() -> Result<(), DatabaseError> {
    let db = TempDatabase::new();
    let catalog = db.create_catalog()?;
    catalog.add_table_reference(&db.table_path("users"))?;

    let roundabout = db.data_dir().join("sub").join("..").join("users.tbl");
    assert!(catalog.is_table_exists(&roundabout)?);
    assert!(!catalog.is_table_exists(&db.table_path("orders"))?);
    Ok(())
}

#[test]
fn test_long_table_path_is_rejected() -> Result<(), DatabaseError> {
    let db = TempDatabase::new();
    let catalog = db.create_catalog()?;
    let long = db.data_dir().join("nested".repeat(20)).join("t.tbl");
    assert!(matches!(
        catalog.add_table_reference(&long),
        Err(DatabaseError::PathTooLong { max: 100, .. })
    ));
    Ok(())
}

#[test]
fn test_catalog_capacity_is_enforced() -> Result<(), DatabaseError> {
    let db = TempDatabase::new();
    let catalog = db.create_catalog()?;
    assert_eq!(CATALOG_CAPACITY, 654);

    for i in 0..CATALOG_CAPACITY {
        catalog.add_table_reference(&db.table_path(&format!("t{}", i)))?;
    }
    assert!(matches!(
        catalog.add_table_reference(&db.table_path("one_more")),
        Err(DatabaseError::CatalogFull { capacity: 654, .. })
    ));
    assert_eq!(catalog.table_count()?, CATALOG_CAPACITY);
    Ok(())
}

#[test]
fn test_count_mismatch_is_corruption() -> Result<(), DatabaseError> {
    let db = TempDatabase::new();
    let catalog = db.create_catalog()?;
    catalog.add_table_reference(&db.table_path("users"))?;

    let mut bytes = fs::read(catalog.path())?;
    bytes[50..54].copy_from_slice(&5i32.to_be_bytes());
    fs::write(catalog.path(), &bytes)?;

    assert!(matches!(
        catalog.is_table_exists(&db.table_path("users")),
        Err(DatabaseError::CorruptedCatalog { .. })
    ));
    Ok(())
}

#[test]
fn test_delete_database_cascades() -> Result<(), DatabaseError> {
    let db = TempDatabase::new();
    let store = TableStore::new();
    let catalog = db.create_catalog()?;
    for name in ["a", "b"] {
        let path = db.table_path(name);
        store.create_table(&path, name, &["int"])?;
        catalog.add_table_reference(&path)?;
    }
    let catalog_path = catalog.path().to_path_buf();

    catalog.delete_database_file(&store)?;
    assert!(!catalog_path.exists());
    assert!(!db.table_path("a").exists());
    assert!(!db.table_path("b").exists());
    Ok(())
}

#[test]
fn test_delete_database_stops_at_broken_table() -> Result<(), DatabaseError> {
    let db = TempDatabase::new();
    let store = TableStore::new();
    let catalog = db.create_catalog()?;
    let path = db.table_path("broken");
    store.create_table(&path, "broken", &["int"])?;
    catalog.add_table_reference(&path)?;

    // point the table at a part that does not exist
    let mut bytes = fs::read(&path)?;
    bytes[158..172].copy_from_slice(b"missing_p1.tbl");
    fs::write(&path, &bytes)?;

    let catalog_path = catalog.path().to_path_buf();
    let result = catalog.delete_database_file(&store);
    assert!(matches!(result, Err(DatabaseError::PartialFailure { .. })));
    assert!(catalog_path.exists());
    assert!(path.exists());
    Ok(())
}

use tabula::{
    storage::schema::TableSchema,
    types::{error::DatabaseError, value::DataType},
};

#[test]
fn test_parse_comma_joined_schema() -> Result<(), DatabaseError> {
    let schema = TableSchema::parse("int, str_20,int")?;
    assert_eq!(
        schema.columns,
        vec![DataType::Int, DataType::Str { max_len: 20 }, DataType::Int]
    );
    assert_eq!(schema.to_string(), "int,str_20,int");
    assert_eq!(schema.record_size(), 4 + 24 + 4);
    Ok(())
}

#[test]
fn test_schema_field_count_limits() {
    assert!(matches!(
        TableSchema::parse(""),
        Err(DatabaseError::InvalidSchema { .. })
    ));

    let twenty = vec!["int"; 20];
    assert!(TableSchema::from_tokens(&twenty).is_ok());

    let twenty_one = vec!["int"; 21];
    assert!(matches!(
        TableSchema::from_tokens(&twenty_one),
        Err(DatabaseError::InvalidSchema { .. })
    ));
}

#[test]
fn test_serialized_schema_must_fit_header_field() {
    // 12 x "str_1000" joined by commas is 107 bytes
    let tokens = vec!["str_1000"; 12];
    assert!(matches!(
        TableSchema::from_tokens(&tokens),
        Err(DatabaseError::InvalidSchema { .. })
    ));
}

#[test]
fn test_column_lookup() -> Result<(), DatabaseError> {
    let schema = TableSchema::parse("int,str_5")?;
    assert_eq!(schema.column(1)?, &DataType::Str { max_len: 5 });
    assert!(matches!(
        schema.column(2),
        Err(DatabaseError::ColumnIndexOutOfBounds { index: 2, count: 2 })
    ));
    Ok(())
}

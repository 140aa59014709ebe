use tabula::{
    storage::schema::TableSchema,
    types::{error::DatabaseError, row::Row, value::Value},
};

fn people_schema() -> TableSchema {
    TableSchema::parse("int,str_20").unwrap()
}

fn person(id: i32, name: &str) -> Row {
    Row::new(vec![Value::Integer(id), Value::from(name)])
}

#[test]
fn test_new_row_creation() {
    let values = vec![Value::Integer(123), Value::from("test")];
    let row = Row::new(values.clone());

    assert_eq!(row.row_id, None);
    assert_eq!(row.values, values);
}

#[test]
fn test_row_with_id_creation() {
    let row = Row::with_row_id(42, vec![Value::Integer(123)]);
    assert_eq!(row.row_id, Some(42));
    assert_eq!(row.get_value(0), Some(&Value::Integer(123)));
    assert_eq!(row.get_value(1), None);
}

#[test]
fn test_encoded_layout() -> Result<(), DatabaseError> {
    let schema = people_schema();
    let bytes = person(1, "Alice").to_bytes(&schema)?;

    assert_eq!(bytes.len(), 4 + 4 + 20);
    assert_eq!(&bytes[0..4], &1i32.to_be_bytes());
    assert_eq!(&bytes[4..8], &5i32.to_be_bytes());
    assert_eq!(&bytes[8..13], b"Alice");
    assert!(bytes[13..].iter().all(|&b| b == 0));
    Ok(())
}

#[test]
fn test_size_is_schema_determined() {
    let schema = people_schema();
    assert_eq!(person(1, "").size(&schema), 28);
    assert_eq!(person(1, "a much longer name").size(&schema), 28);
}

#[test]
fn test_decode_restores_values() -> Result<(), DatabaseError> {
    let schema = TableSchema::parse("str_10,int,int,str_3")?;
    let row = Row::new(vec![
        Value::from("héllo"),
        Value::Integer(-7),
        Value::Integer(i32::MAX),
        Value::from(""),
    ]);
    let decoded = Row::from_bytes(&schema, &row.to_bytes(&schema)?)?;
    assert_eq!(decoded.values, row.values);
    Ok(())
}

#[test]
fn test_encode_rejects_wrong_value_count() {
    let result = Row::new(vec![Value::Integer(1)]).to_bytes(&people_schema());
    assert!(matches!(
        result,
        Err(DatabaseError::ValueCountMismatch {
            expected: 2,
            actual: 1
        })
    ));
}

#[test]
fn test_encode_rejects_wrong_type() {
    let row = Row::new(vec![Value::from("1"), Value::from("Alice")]);
    assert!(matches!(
        row.to_bytes(&people_schema()),
        Err(DatabaseError::TypeMismatch { column: 0, .. })
    ));
}

#[test]
fn test_string_limit_counts_utf8_bytes() {
    let schema = TableSchema::parse("str_4").unwrap();
    // four characters, eight bytes
    let row = Row::new(vec![Value::from("éééé")]);
    assert!(matches!(
        row.to_bytes(&schema),
        Err(DatabaseError::StringTooLong {
            column: 0,
            max: 4,
            actual: 8
        })
    ));
    assert!(Row::new(vec![Value::from("éé")]).to_bytes(&schema).is_ok());
}

#[test]
fn test_decode_rejects_oversized_length_prefix() -> Result<(), DatabaseError> {
    let schema = people_schema();
    let mut bytes = person(1, "Bob").to_bytes(&schema)?;
    bytes[4..8].copy_from_slice(&21i32.to_be_bytes());

    assert!(matches!(
        Row::from_bytes(&schema, &bytes),
        Err(DatabaseError::StringLengthExceeded { length: 21, max: 20 })
    ));
    Ok(())
}

#[test]
fn test_decode_rejects_short_buffer() {
    let result = Row::from_bytes(&people_schema(), &[0u8; 10]);
    assert!(matches!(result, Err(DatabaseError::CorruptedRecord { .. })));
}

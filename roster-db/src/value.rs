//! Values bound to statements, trusted raw SQL fragments and result rows.

use crate::DbResult;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;

/// A parameter value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// JSON rendering used for result rows. Blobs become arrays of bytes.
    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::from(*i),
            SqlValue::Real(f) => Value::from(*f),
            SqlValue::Text(s) => Value::String(s.clone()),
            SqlValue::Blob(b) => Value::from(b.clone()),
        }
    }

    fn from_value_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => write!(f, "{:?}", s),
            SqlValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self {
            SqlValue::Null => ValueRef::Null,
            SqlValue::Integer(i) => ValueRef::Integer(*i),
            SqlValue::Real(f) => ValueRef::Real(*f),
            SqlValue::Text(s) => ValueRef::Text(s.as_bytes()),
            SqlValue::Blob(b) => ValueRef::Blob(b),
        }))
    }
}

macro_rules! integer_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(value: $ty) -> Self {
                    SqlValue::Integer(i64::from(value))
                }
            }
        )*
    };
}

integer_value!(i8, i16, i32, i64, u8, u16, u32, bool);

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<f32> for SqlValue {
    fn from(value: f32) -> Self {
        SqlValue::Real(f64::from(value))
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::Text(value.clone())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Blob(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Booleans become 0/1, whole numbers integers, nested values JSON text.
impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Integer(i64::from(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => SqlValue::Text(s),
            other => SqlValue::Text(other.to_string()),
        }
    }
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        SqlValue::from(value.clone())
    }
}

/// Literal SQL inlined into a statement without parameter binding.
///
/// Only `&'static str` literals convert implicitly. Runtime strings have to
/// go through [`RawSql::trusted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSql(Cow<'static, str>);

impl RawSql {
    /// Wrap a runtime string the caller has checked to be safe SQL.
    pub fn trusted(sql: String) -> Self {
        RawSql(Cow::Owned(sql))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for RawSql {
    fn from(sql: &'static str) -> Self {
        RawSql(Cow::Borrowed(sql))
    }
}

impl fmt::Display for RawSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Right-hand side of an INSERT column or an UPDATE `SET` assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// Bound as a `?` parameter.
    Param(SqlValue),
    /// Inlined verbatim, e.g. `NOW()`.
    Raw(RawSql),
}

impl ColumnValue {
    pub fn raw(sql: &'static str) -> Self {
        ColumnValue::Raw(RawSql::from(sql))
    }
}

impl From<RawSql> for ColumnValue {
    fn from(raw: RawSql) -> Self {
        ColumnValue::Raw(raw)
    }
}

impl From<SqlValue> for ColumnValue {
    fn from(value: SqlValue) -> Self {
        ColumnValue::Param(value)
    }
}

macro_rules! param_column_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ColumnValue {
                fn from(value: $ty) -> Self {
                    ColumnValue::Param(SqlValue::from(value))
                }
            }
        )*
    };
}

param_column_value!(
    i8, i16, i32, i64, u8, u16, u32, bool, f32, f64, String, &str, &String, Vec<u8>, Value,
    &Value
);

impl<T: Into<SqlValue>> From<Option<T>> for ColumnValue {
    fn from(value: Option<T>) -> Self {
        ColumnValue::Param(SqlValue::from(value))
    }
}

/// One result row, keyed by column name in select order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row {
    columns: Map<String, Value>,
}

impl Row {
    pub(crate) fn from_sqlite(row: &rusqlite::Row<'_>, names: &[String]) -> rusqlite::Result<Self> {
        let mut columns = Map::new();
        for (idx, name) in names.iter().enumerate() {
            let value = SqlValue::from_value_ref(row.get_ref(idx)?);
            columns.insert(name.clone(), value.to_json());
        }
        Ok(Row { columns })
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.columns)
    }

    /// Deserialize the row into a typed record.
    pub fn deserialize<T: DeserializeOwned>(&self) -> DbResult<T> {
        Ok(serde_json::from_value(Value::Object(self.columns.clone()))?)
    }
}

impl From<Map<String, Value>> for Row {
    fn from(columns: Map<String, Value>) -> Self {
        Row { columns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_json_conversion() {
        assert_eq!(SqlValue::from(json!(null)), SqlValue::Null);
        assert_eq!(SqlValue::from(json!(true)), SqlValue::Integer(1));
        assert_eq!(SqlValue::from(json!(12)), SqlValue::Integer(12));
        assert_eq!(SqlValue::from(json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(SqlValue::from(json!("x")), SqlValue::Text("x".into()));
        assert_eq!(
            SqlValue::from(json!(["a"])),
            SqlValue::Text("[\"a\"]".into())
        );
    }

    #[test]
    fn test_option_maps_to_null() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some("x")), SqlValue::Text("x".into()));
    }

    #[test]
    fn test_raw_sql_sources() {
        let literal: RawSql = "NOW()".into();
        assert_eq!(literal.as_str(), "NOW()");
        let runtime = RawSql::trusted(format!("datetime('now', '-{} days')", 7));
        assert_eq!(runtime.to_string(), "datetime('now', '-7 days')");
    }

    #[test]
    fn test_column_value_conversions() {
        assert_eq!(ColumnValue::from(5), ColumnValue::Param(SqlValue::Integer(5)));
        assert_eq!(
            ColumnValue::raw("CURRENT_TIMESTAMP"),
            ColumnValue::Raw(RawSql::from("CURRENT_TIMESTAMP"))
        );
    }

    #[derive(Deserialize)]
    struct Influencer {
        id: i64,
        name: String,
    }

    #[test]
    fn test_row_accessors() {
        let row = Row::from(
            json!({"id": 3, "name": "Ada"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(row.get_i64("id"), Some(3));
        assert_eq!(row.get_str("name"), Some("Ada"));
        assert!(row.get("missing").is_none());

        let typed: Influencer = row.deserialize().unwrap();
        assert_eq!(typed.id, 3);
        assert_eq!(typed.name, "Ada");
    }
}

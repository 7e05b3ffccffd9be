//! Row module - turning SQLite result rows into JSON maps

use crate::error::Result;
use crate::models::Row;
use rusqlite::types::ValueRef;
use serde_json::{Number, Value};

/// Convert one SQLite column value to JSON
///
/// Blobs become base64 text; non-finite reals become `null`.
pub fn sqlite_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b,
        )),
    }
}

pub(crate) fn column_names(stmt: &rusqlite::Statement<'_>) -> Vec<String> {
    stmt.column_names().iter().map(|s| s.to_string()).collect()
}

pub(crate) fn to_row(row: &rusqlite::Row<'_>, columns: &[String]) -> Result<Row> {
    let mut map = Row::new();
    for (i, name) in columns.iter().enumerate() {
        map.insert(name.clone(), sqlite_to_json(row.get_ref(i)?));
    }
    Ok(map)
}

/// Step an already bound statement once and return the row it yields.
pub(crate) fn first_row(stmt: &mut rusqlite::Statement<'_>) -> Result<Option<Row>> {
    let columns = column_names(stmt);
    let mut rows = stmt.raw_query();
    match rows.next()? {
        Some(row) => Ok(Some(to_row(row, &columns)?)),
        None => Ok(None),
    }
}

/// Step an already bound statement to completion, handing each row to `deliver`.
pub(crate) fn for_each_row<F>(stmt: &mut rusqlite::Statement<'_>, mut deliver: F) -> Result<usize>
where
    F: FnMut(Row) -> Result<()>,
{
    let columns = column_names(stmt);
    let mut rows = stmt.raw_query();
    let mut count = 0;
    while let Some(row) = rows.next()? {
        deliver(to_row(row, &columns)?)?;
        count += 1;
    }
    Ok(count)
}

pub(crate) fn all_rows(stmt: &mut rusqlite::Statement<'_>) -> Result<Vec<Row>> {
    let mut out = Vec::new();
    for_each_row(stmt, |row| {
        out.push(row);
        Ok(())
    })?;
    Ok(out)
}

/// Step a write statement to completion, discarding any rows it yields.
pub(crate) fn step_to_end(stmt: &mut rusqlite::Statement<'_>) -> Result<()> {
    let mut rows = stmt.raw_query();
    while rows.next()?.is_some() {}
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::params::{bind, Params};
    use rusqlite::Connection;
    use serde_json::json;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, score REAL, data BLOB);
             INSERT INTO t VALUES (1, 'a', 1.5, x'0102'), (2, 'b', NULL, NULL);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn column_types_map_to_json() {
        let conn = conn();
        let mut stmt = conn.prepare("SELECT * FROM t ORDER BY id").unwrap();
        let rows = all_rows(&mut stmt).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["name"], json!("a"));
        assert_eq!(rows[0]["score"], json!(1.5));
        assert_eq!(rows[0]["data"], json!("AQI="));
        assert_eq!(rows[1]["score"], Value::Null);
    }

    #[test]
    fn first_row_or_none() {
        let conn = conn();
        let mut stmt = conn.prepare("SELECT id FROM t ORDER BY id").unwrap();
        assert_eq!(first_row(&mut stmt).unwrap().unwrap()["id"], json!(1));
        let mut stmt = conn.prepare("SELECT id FROM t WHERE id > 2").unwrap();
        assert!(first_row(&mut stmt).unwrap().is_none());
    }

    #[test]
    fn delivery_error_stops_iteration() {
        let conn = conn();
        let mut stmt = conn.prepare("SELECT id FROM t WHERE id >= ?").unwrap();
        bind(&mut stmt, &Params::from(json!([1]))).unwrap();
        let mut seen = 0;
        let res = for_each_row(&mut stmt, |_| {
            seen += 1;
            Err(crate::Error::Delivery("stop".into()))
        });
        assert!(res.is_err());
        assert_eq!(seen, 1);
    }
}

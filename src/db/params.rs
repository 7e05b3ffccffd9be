//! Params module - caller parameters and how they bind to a prepared statement

use crate::error::Result;
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};

/// Parameters for one statement execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    #[default]
    None,
    /// Bound to `?`, `?NNN` placeholders in order.
    Positional(Vec<Value>),
    /// Bound by name; keys may include the `:`/`@`/`$` prefix or omit it.
    Named(Map<String, Value>),
}

impl Params {
    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Positional(values) => values.is_empty(),
            Params::Named(map) => map.is_empty(),
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Params::Named(map)
    }
}

/// `null` means no parameters, an array is positional, an object is named and
/// any other scalar is a single positional parameter.
impl From<Value> for Params {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Params::None,
            Value::Array(values) => Params::Positional(values),
            Value::Object(map) => Params::Named(map),
            scalar => Params::Positional(vec![scalar]),
        }
    }
}

impl From<Option<Value>> for Params {
    fn from(value: Option<Value>) -> Self {
        value.map(Params::from).unwrap_or_default()
    }
}

/// Convert a JSON value to the SQLite value it binds as
///
/// Booleans bind as 1/0, arrays and objects as their JSON text.
pub fn to_sql_value(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(v.to_string()),
    }
}

const NAME_PREFIXES: [char; 3] = [':', '@', '$'];

fn parameter_index(stmt: &rusqlite::Statement<'_>, name: &str) -> Result<Option<usize>> {
    if name.starts_with(NAME_PREFIXES) {
        return Ok(stmt.parameter_index(name)?);
    }
    for prefix in NAME_PREFIXES {
        if let Some(idx) = stmt.parameter_index(&format!("{prefix}{name}"))? {
            return Ok(Some(idx));
        }
    }
    Ok(None)
}

/// Bind `params` onto a freshly prepared (or freshly reset) statement.
pub(crate) fn bind(stmt: &mut rusqlite::Statement<'_>, params: &Params) -> Result<()> {
    match params {
        Params::None => {}
        Params::Positional(values) => {
            for (i, v) in values.iter().enumerate() {
                stmt.raw_bind_parameter(i + 1, to_sql_value(v))?;
            }
        }
        Params::Named(map) => {
            for (name, v) in map {
                let idx = parameter_index(stmt, name)?
                    .ok_or_else(|| rusqlite::Error::InvalidParameterName(name.clone()))?;
                stmt.raw_bind_parameter(idx, to_sql_value(v))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use serde_json::json;

    #[test]
    fn value_conversion() {
        assert_eq!(to_sql_value(&json!(null)), SqlValue::Null);
        assert_eq!(to_sql_value(&json!(true)), SqlValue::Integer(1));
        assert_eq!(to_sql_value(&json!(42)), SqlValue::Integer(42));
        assert_eq!(to_sql_value(&json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(to_sql_value(&json!("x")), SqlValue::Text("x".into()));
        assert_eq!(to_sql_value(&json!([1, 2])), SqlValue::Text("[1,2]".into()));
    }

    #[test]
    fn params_from_json_shape() {
        assert_eq!(Params::from(json!(null)), Params::None);
        assert!(matches!(Params::from(json!([1, 2])), Params::Positional(v) if v.len() == 2));
        assert!(matches!(Params::from(json!({"a": 1})), Params::Named(_)));
        assert_eq!(Params::from(json!(5)), Params::Positional(vec![json!(5)]));
        assert!(Params::from(json!([])).is_empty());
    }

    #[test]
    fn named_binding_accepts_bare_and_prefixed_keys() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT :a + @b + $c").unwrap();
        bind(&mut stmt, &Params::from(json!({"a": 1, "@b": 2, "c": 3}))).unwrap();
        let sum: i64 = stmt.raw_query().next().unwrap().unwrap().get(0).unwrap();
        assert_eq!(sum, 6);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT :a").unwrap();
        assert!(bind(&mut stmt, &Params::from(json!({"zzz": 1}))).is_err());
    }

    #[test]
    fn too_many_positional_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT ?").unwrap();
        assert!(bind(&mut stmt, &Params::from(json!([1, 2]))).is_err());
    }
}

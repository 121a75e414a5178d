//! Row to JSON conversion keyed on the column's PostgreSQL type.
//!
//! Integers and floats become JSON numbers, dates render as `YYYY-MM-DD`, arrays as JSON arrays.
//! The projection casts every other type to one of these.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};

pub(crate) fn row_to_json(row: &PgRow) -> Value {
    let mut map = Map::new();
    for (idx, col) in row.columns().iter().enumerate() {
        let v = cell_to_value(row, idx, col.type_info().name());
        map.insert(col.name().to_string(), v);
    }
    Value::Object(map)
}

fn float(n: Option<f64>) -> Value {
    n.and_then(Number::from_f64).map(Value::Number).unwrap_or(Value::Null)
}

fn array<T>(items: Vec<Option<T>>, f: impl Fn(T) -> Value) -> Value {
    Value::Array(items.into_iter().map(|v| v.map(&f).unwrap_or(Value::Null)).collect())
}

fn cell_to_value(row: &PgRow, idx: usize, type_name: &str) -> Value {
    let v = match type_name {
        "INT2" => row.try_get::<Option<i16>, _>(idx).map(|v| v.map(Value::from)),
        "INT4" => row.try_get::<Option<i32>, _>(idx).map(|v| v.map(Value::from)),
        "INT8" => row.try_get::<Option<i64>, _>(idx).map(|v| v.map(Value::from)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)
            .map(|v| Some(float(v.map(f64::from)))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx).map(|v| Some(float(v))),
        "BOOL" => row.try_get::<Option<bool>, _>(idx).map(|v| v.map(Value::Bool)),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(idx)
            .map(|v| v.map(|u| Value::String(u.to_string()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)))),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()))),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))),
        "TEXT[]" | "VARCHAR[]" => row
            .try_get::<Option<Vec<Option<String>>>, _>(idx)
            .map(|v| v.map(|items| array(items, Value::String))),
        "INT8[]" => row
            .try_get::<Option<Vec<Option<i64>>>, _>(idx)
            .map(|v| v.map(|items| array(items, Value::from))),
        "FLOAT8[]" => row
            .try_get::<Option<Vec<Option<f64>>>, _>(idx)
            .map(|v| v.map(|items| array(items, |n| float(Some(n))))),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx),
        _ => row.try_get::<Option<String>, _>(idx).map(|v| v.map(Value::String)),
    };
    match v {
        Ok(v) => v.unwrap_or(Value::Null),
        Err(e) => {
            tracing::warn!(column = idx, type_name, error = %e, "column did not decode");
            Value::Null
        }
    }
}

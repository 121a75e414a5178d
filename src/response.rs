//! Response helpers. Successful calls answer 200 with the bare row or row array as JSON.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde_json::Value;
use std::collections::HashSet;

/// Remove sensitive keys from a row (or each row of an array).
pub fn strip_sensitive(mut v: Value, sensitive: &HashSet<String>) -> Value {
    if sensitive.is_empty() {
        return v;
    }
    match &mut v {
        Value::Object(map) => map.retain(|k, _| !sensitive.contains(k)),
        Value::Array(items) => {
            for item in items.iter_mut() {
                if let Value::Object(map) = item {
                    map.retain(|k, _| !sensitive.contains(k));
                }
            }
        }
        _ => {}
    }
    v
}

pub fn json_one(row: Value, sensitive: &HashSet<String>) -> Response {
    (StatusCode::OK, Json(strip_sensitive(row, sensitive))).into_response()
}

pub fn json_many(rows: Vec<Value>, sensitive: &HashSet<String>) -> Response {
    (StatusCode::OK, Json(strip_sensitive(Value::Array(rows), sensitive))).into_response()
}

/// 200 with an empty body (delete).
pub fn empty_ok() -> Response {
    StatusCode::OK.into_response()
}

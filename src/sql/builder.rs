//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from a resolved entity.

use crate::config::{AuthConfig, ColumnKind, ColumnRef, ResolvedEntity};
use serde_json::Value;
use std::collections::HashMap;

/// Quote identifier for PostgreSQL (safe: only from config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified(qualifier: &str, column: &str) -> String {
    format!("{}.{}", quoted(qualifier), quoted(column))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its placeholder with a cast, e.g. `$2::integer`.
    fn bind(&mut self, v: Value, pg_type: &str) -> String {
        self.params.push(v);
        format!("${}::{}", self.params.len(), pg_type)
    }
}

/// A filter predicate with the values it compares against, taken from the query string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Empty,
    NotEmpty,
    Contains(String),
    Equals(String),
    /// Also `Before` for dates.
    LessThan(String),
    /// Also `After` for dates.
    GreaterThan(String),
    Between(String, String),
}

fn is_text_type(ty: &str) -> bool {
    ["text", "varchar", "character", "char", "bpchar"]
        .iter()
        .any(|t| ty.starts_with(t))
}

fn is_integer_type(ty: &str) -> bool {
    matches!(ty, "smallint" | "int2" | "integer" | "int" | "int4" | "bigint" | "int8")
}

/// Output expression for a projected column, cast so every type decodes to JSON:
/// numerics become float8, integer and float arrays widen, and anything else
/// without a native mapping (time, interval, enum arrays, ...) comes back as text.
fn output_expr(expr: String, kind: ColumnKind, pg_type: &str) -> String {
    let ty = pg_type.trim().to_lowercase();
    let cast = match kind {
        ColumnKind::Float if ty.starts_with("numeric") || ty.starts_with("decimal") => Some("float8"),
        ColumnKind::TextArray => match ty.trim_end_matches("[]").trim() {
            elem if is_integer_type(elem) => Some("int8[]"),
            elem if ColumnKind::from_pg_type(elem) == ColumnKind::Float => Some("float8[]"),
            "text" => None,
            _ => Some("text[]"),
        },
        ColumnKind::Text if !is_text_type(&ty) => Some("text"),
        _ => None,
    };
    match cast {
        Some(cast) => format!("{}::{}", expr, cast),
        None => expr,
    }
}

/// SELECT list: base columns qualified by table, then joined columns under their aliases.
fn projection(entity: &ResolvedEntity) -> String {
    let mut parts: Vec<String> = entity
        .columns
        .iter()
        .map(|c| {
            let expr = output_expr(qualified(&entity.table, &c.name), c.kind, &c.pg_type);
            format!("{} AS {}", expr, quoted(&c.name))
        })
        .collect();
    for j in &entity.joins {
        for c in &j.columns {
            let expr = output_expr(qualified(&j.alias, &c.column), c.kind, &c.pg_type);
            parts.push(format!("{} AS {}", expr, quoted(&c.output)));
        }
    }
    parts.join(", ")
}

/// RETURNING list for writes: base table columns only.
fn returning(entity: &ResolvedEntity) -> String {
    entity
        .columns
        .iter()
        .map(|c| {
            let expr = output_expr(quoted(&c.name), c.kind, &c.pg_type);
            format!("{} AS {}", expr, quoted(&c.name))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn from_clause(entity: &ResolvedEntity) -> String {
    let mut out = quoted(&entity.table);
    for j in &entity.joins {
        out.push_str(&format!(
            " JOIN {} AS {} ON {} = {}",
            quoted(&j.table),
            quoted(&j.alias),
            qualified(&entity.table, &j.local_column),
            qualified(&j.alias, &j.foreign_column)
        ));
    }
    out
}

fn order_by_pk(entity: &ResolvedEntity) -> String {
    format!(" ORDER BY {}", qualified(&entity.table, &entity.pk))
}

fn where_clause(parts: &[String]) -> String {
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn column_sql(c: &ColumnRef) -> String {
    qualified(&c.qualifier, &c.name)
}

/// Escape LIKE metacharacters so the value matches literally.
fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for ch in s.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// One WHERE predicate for a filter route.
fn predicate(q: &mut QueryBuf, column: &ColumnRef, condition: &Condition) -> String {
    let col = column_sql(column);
    let typed = |q: &mut QueryBuf, v: &str| q.bind(Value::String(v.to_string()), &column.pg_type);
    match condition {
        Condition::Empty => format!("{} IS NULL", col),
        Condition::NotEmpty => format!("{} IS NOT NULL", col),
        Condition::Contains(v) => {
            let lhs = if column.kind == ColumnKind::Text { col } else { format!("{}::text", col) };
            let ph = q.bind(Value::String(format!("%{}%", like_escape(v))), "text");
            format!("{} ILIKE {}", lhs, ph)
        }
        Condition::Equals(v) => format!("{} = {}", col, typed(q, v)),
        Condition::LessThan(v) => format!("{} < {}", col, typed(q, v)),
        Condition::GreaterThan(v) => format!("{} > {}", col, typed(q, v)),
        Condition::Between(low, high) => {
            let low = typed(q, low);
            let high = typed(q, high);
            format!("{} BETWEEN {} AND {}", col, low, high)
        }
    }
}

fn select_where(entity: &ResolvedEntity, q: &mut QueryBuf, parts: &[String], limit: Option<u32>) {
    let limit_clause = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}",
        projection(entity),
        from_clause(entity),
        where_clause(parts),
        order_by_pk(entity),
        limit_clause
    );
}

/// SELECT by primary key with joins applied.
pub fn select_by_id(entity: &ResolvedEntity, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = entity.pk_column();
    let ph = q.bind(id.clone(), &pk.pg_type);
    let parts = vec![format!("{} = {}", qualified(&entity.table, &pk.name), ph)];
    select_where(entity, &mut q, &parts, None);
    q
}

/// SELECT rows, optionally restricted to one scope key, ORDER BY pk, optional LIMIT.
pub fn select_list(entity: &ResolvedEntity, scope: Option<(&ColumnRef, &Value)>, limit: Option<u32>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut parts = Vec::new();
    if let Some((column, value)) = scope {
        let ph = q.bind(value.clone(), &column.pg_type);
        parts.push(format!("{} = {}", column_sql(column), ph));
    }
    select_where(entity, &mut q, &parts, limit);
    q
}

/// SELECT rows matching one filter predicate, optionally within a scope.
pub fn select_filtered(
    entity: &ResolvedEntity,
    scope: Option<(&ColumnRef, &Value)>,
    column: &ColumnRef,
    condition: &Condition,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut parts = Vec::new();
    if let Some((scope_col, value)) = scope {
        let ph = q.bind(value.clone(), &scope_col.pg_type);
        parts.push(format!("{} = {}", column_sql(scope_col), ph));
    }
    parts.push(predicate(&mut q, column, condition));
    select_where(entity, &mut q, &parts, None);
    q
}

/// SELECT by email and password against the credential table.
pub fn select_by_credentials(entity: &ResolvedEntity, auth: &AuthConfig, email: &str, password: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let email_ph = q.bind(Value::String(email.to_string()), "text");
    let password_ph = q.bind(Value::String(password.to_string()), "text");
    let parts = vec![
        format!("{} = {}", qualified(&entity.table, &auth.email_column), email_ph),
        format!("{} = {}", qualified(&entity.table, &auth.password_column), password_ph),
    ];
    select_where(entity, &mut q, &parts, Some(1));
    q
}

/// INSERT of every non-key column. Columns missing from the body are NULL unless the DB has a default.
pub fn insert(entity: &ResolvedEntity, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        if c.is_pk {
            continue;
        }
        let val = body.get(&c.name).cloned();
        if val.is_none() && c.has_default() {
            continue;
        }
        placeholders.push(q.bind(val.unwrap_or(Value::Null), &c.pg_type));
        cols.push(quoted(&c.name));
    }
    let table = quoted(&entity.table);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning(entity))
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning(entity)
        )
    };
    q
}

/// UPDATE by id: SET only columns present in body. With nothing to set, reads the row instead.
pub fn update(entity: &ResolvedEntity, id: &Value, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted(&entity.table);
    let mut sets = Vec::new();
    for c in &entity.columns {
        if c.is_pk {
            continue;
        }
        let Some(v) = body.get(&c.name) else { continue };
        let ph = q.bind(v.clone(), &c.pg_type);
        sets.push(format!("{} = {}", quoted(&c.name), ph));
    }
    let pk = entity.pk_column();
    let id_ph = q.bind(id.clone(), &pk.pg_type);
    if sets.is_empty() {
        q.sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            returning(entity),
            table,
            quoted(&pk.name),
            id_ph
        );
        return q;
    }
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        table,
        sets.join(", "),
        quoted(&pk.name),
        id_ph,
        returning(entity)
    );
    q
}

/// DELETE by id. Matching no row is not an error.
pub fn delete(entity: &ResolvedEntity, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = entity.pk_column();
    let ph = q.bind(id.clone(), &pk.pg_type);
    q.sql = format!("DELETE FROM {} WHERE {} = {}", quoted(&entity.table), quoted(&pk.name), ph);
    q
}

/// Name, email and password of one user, read inside the create transaction.
pub fn select_welcome_recipient(auth: &AuthConfig, user_id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.bind(user_id.clone(), "integer");
    q.sql = format!(
        "SELECT {}::text AS name, {}::text AS email, {}::text AS password FROM {} WHERE {} = {}",
        quoted(&auth.name_column),
        quoted(&auth.email_column),
        quoted(&auth.password_column),
        quoted(&auth.table),
        quoted(&auth.id_column),
        ph
    );
    q
}

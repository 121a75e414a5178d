//! Resolved model: config validated and flattened into a route table for runtime use.

use crate::config::{AuthConfig, FilterOp};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Coarse column type; decides bind casts, result coercion and which filters make sense.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
    TextArray,
    Json,
    Uuid,
}

impl ColumnKind {
    pub fn from_pg_type(ty: &str) -> ColumnKind {
        let lower = ty.trim().to_lowercase();
        if lower.ends_with("[]") {
            return ColumnKind::TextArray;
        }
        match lower.as_str() {
            "serial" | "bigserial" | "smallserial" | "integer" | "int" | "int4" | "bigint" | "int8"
            | "smallint" | "int2" => ColumnKind::Integer,
            "real" | "float4" | "double precision" | "float8" | "numeric" | "decimal" => ColumnKind::Float,
            "boolean" | "bool" => ColumnKind::Boolean,
            "date" => ColumnKind::Date,
            "json" | "jsonb" => ColumnKind::Json,
            "uuid" => ColumnKind::Uuid,
            s if s.starts_with("numeric") || s.starts_with("decimal") => ColumnKind::Float,
            s if s.starts_with("timestamp") => ColumnKind::Timestamp,
            _ => ColumnKind::Text,
        }
    }

    /// Operators offered when a filter does not list its own.
    pub fn default_ops(&self) -> Vec<FilterOp> {
        use FilterOp::*;
        match self {
            ColumnKind::Text | ColumnKind::Uuid => vec![Contains, Empty, NotEmpty],
            ColumnKind::Integer | ColumnKind::Float => {
                vec![LessThan, Equals, GreaterThan, Between, Empty, NotEmpty]
            }
            ColumnKind::Date | ColumnKind::Timestamp => vec![Before, Equals, After, Between, Empty, NotEmpty],
            ColumnKind::Boolean => vec![Equals, Empty, NotEmpty],
            ColumnKind::TextArray | ColumnKind::Json => vec![Empty, NotEmpty],
        }
    }
}

/// Type name usable in a `$n::type` cast. Serial pseudo-types map to their storage type.
pub fn cast_type(ty: &str) -> String {
    match ty.trim().to_lowercase().as_str() {
        "serial" => "integer".into(),
        "bigserial" => "bigint".into(),
        "smallserial" => "smallint".into(),
        other => other.to_string(),
    }
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    /// Type as declared (used for DDL).
    pub declared_type: String,
    /// Type used in parameter casts.
    pub pg_type: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub default: Option<String>,
    pub is_pk: bool,
}

impl ColumnInfo {
    /// Whether the DB fills the column when insert omits it.
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.declared_type.to_lowercase().ends_with("serial")
    }
}

/// A column as it appears in SQL: `"qualifier"."name"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnRef {
    pub qualifier: String,
    pub name: String,
    pub pg_type: String,
    pub kind: ColumnKind,
}

/// Column of a joined table as projected: `"alias"."column" AS "output"`.
#[derive(Clone, Debug)]
pub struct JoinedColumn {
    pub column: String,
    pub output: String,
    pub pg_type: String,
    pub kind: ColumnKind,
}

#[derive(Clone, Debug)]
pub struct ResolvedJoin {
    pub table: String,
    pub alias: String,
    pub local_column: String,
    pub foreign_column: String,
    pub columns: Vec<JoinedColumn>,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub name: String,
    pub plural: String,
    pub table: String,
    pub pk: String,
    pub columns: Vec<ColumnInfo>,
    pub joins: Vec<ResolvedJoin>,
    pub read_roles: Vec<String>,
    pub write_roles: Vec<String>,
    /// Column names to strip from all API responses.
    pub sensitive_columns: HashSet<String>,
    /// Foreign key to the user who receives a welcome email on create.
    pub welcome_user_column: Option<String>,
}

impl ResolvedEntity {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn pk_column(&self) -> &ColumnInfo {
        // resolve() refuses entities whose primary key is not among the columns
        self.columns
            .iter()
            .find(|c| c.is_pk)
            .unwrap_or(&self.columns[0])
    }

    pub fn column_ref(&self, name: &str) -> Option<ColumnRef> {
        self.column(name).map(|c| ColumnRef {
            qualifier: self.table.clone(),
            name: c.name.clone(),
            pg_type: c.pg_type.clone(),
            kind: c.kind,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ScopeSpec {
    pub column: ColumnRef,
    pub param: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteMethod {
    Get,
    Post,
}

impl RouteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Get => "GET",
            RouteMethod::Post => "POST",
        }
    }
}

#[derive(Clone, Debug)]
pub enum RouteKind {
    Create,
    Update,
    Delete,
    ReadById,
    List {
        scope: Option<ScopeSpec>,
        limit: Option<u32>,
    },
    Filter {
        scope: Option<ScopeSpec>,
        column: ColumnRef,
        op: FilterOp,
    },
    Lookup {
        column: ColumnRef,
        param: String,
    },
    Login,
}

#[derive(Clone, Debug)]
pub struct Route {
    pub name: String,
    pub method: RouteMethod,
    pub entity: Arc<ResolvedEntity>,
    pub kind: RouteKind,
    /// Empty only for the login route, which runs without credentials.
    pub roles: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ResolvedService {
    pub name: String,
    pub port: u16,
    pub entities: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub entities: Vec<Arc<ResolvedEntity>>,
    pub routes: HashMap<String, Route>,
    pub services: Vec<ResolvedService>,
    pub auth: AuthConfig,
}

impl ResolvedModel {
    pub fn route(&self, name: &str) -> Option<&Route> {
        self.routes.get(name)
    }

    pub fn entity(&self, name: &str) -> Option<&Arc<ResolvedEntity>> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Same model restricted to the routes of one service's entities.
    pub fn for_service(&self, service: &ResolvedService) -> ResolvedModel {
        let names: HashSet<&str> = service.entities.iter().map(String::as_str).collect();
        ResolvedModel {
            entities: self
                .entities
                .iter()
                .filter(|e| names.contains(e.name.as_str()))
                .cloned()
                .collect(),
            routes: self
                .routes
                .iter()
                .filter(|(_, r)| names.contains(r.entity.name.as_str()))
                .map(|(k, r)| (k.clone(), r.clone()))
                .collect(),
            services: vec![service.clone()],
            auth: self.auth.clone(),
        }
    }
}

//! Raw model types matching the JSON model file (config/clinic.json).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whole model: role groups, entities and how entities are grouped into services.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Named role sets, referenced from role lists as `@name`.
    #[serde(default)]
    pub role_groups: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    pub entities: Vec<EntityConfig>,
}

/// Where credentials live. Defaults match the clinic database's `"user"` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_user_table")]
    pub table: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_name_column")]
    pub name_column: String,
    #[serde(default = "default_email_column")]
    pub email_column: String,
    #[serde(default = "default_password_column")]
    pub password_column: String,
    #[serde(default = "default_roles_column")]
    pub roles_column: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            table: default_user_table(),
            id_column: default_id_column(),
            name_column: default_name_column(),
            email_column: default_email_column(),
            password_column: default_password_column(),
            roles_column: default_roles_column(),
        }
    }
}

fn default_user_table() -> String {
    "user".into()
}

fn default_id_column() -> String {
    "id".into()
}

fn default_name_column() -> String {
    "name".into()
}

fn default_email_column() -> String {
    "emailaddress".into()
}

fn default_password_column() -> String {
    "password".into()
}

fn default_roles_column() -> String {
    "roles".into()
}

/// A named listener serving a subset of entities on its own port.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub port: u16,
    pub entities: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    /// PostgreSQL type as written in DDL (e.g. `serial`, `text`, `integer`, `date`, `text[]`).
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// SQL default expression used when the create body omits the column.
    #[serde(default)]
    pub default: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Column of a joined table projected under an alias (e.g. `user.name AS username`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProjectionConfig {
    pub column: String,
    pub alias: String,
    #[serde(rename = "type", default = "default_text")]
    pub type_: String,
}

fn default_text() -> String {
    "text".into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JoinConfig {
    pub table: String,
    /// Alias used to qualify columns of the joined table. Defaults to the table name.
    #[serde(default)]
    pub alias: Option<String>,
    /// Our foreign key column.
    pub local_column: String,
    #[serde(default = "default_id_column")]
    pub foreign_column: String,
    #[serde(default)]
    pub columns: Vec<ProjectionConfig>,
}

/// A parent key lists can be restricted to (e.g. patients of one staff member).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub name: String,
    pub column: String,
    /// Query parameter carrying the key. Defaults to the column name.
    #[serde(default)]
    pub param: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    Contains,
    Empty,
    NotEmpty,
    Equals,
    LessThan,
    GreaterThan,
    Before,
    After,
    Between,
}

impl FilterOp {
    /// Route suffix, e.g. `getUsersByName` + `Contains`.
    pub fn suffix(&self) -> &'static str {
        match self {
            FilterOp::Contains => "Contains",
            FilterOp::Empty => "Empty",
            FilterOp::NotEmpty => "NotEmpty",
            FilterOp::Equals => "Equals",
            FilterOp::LessThan => "LessThan",
            FilterOp::GreaterThan => "GreaterThan",
            FilterOp::Before => "Before",
            FilterOp::After => "After",
            FilterOp::Between => "Between",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Route fragment, e.g. `Name` or `DateTimeCreated`.
    pub name: String,
    /// Base column (`name`) or joined column (`user.name`).
    pub column: String,
    /// Empty means "every operator that fits the column type".
    #[serde(default)]
    pub ops: Vec<FilterOp>,
}

/// Single-row lookup by a non-key column, e.g. `getPatientByUser?userid=`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LookupConfig {
    pub name: String,
    pub column: String,
    #[serde(default)]
    pub param: Option<String>,
    /// Overrides the entity's read roles for this lookup.
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoleConfig {
    pub read: Vec<String>,
    pub write: Vec<String>,
}

/// Send a welcome email to the user referenced by `user_column` inside the create transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WelcomeEmailConfig {
    pub user_column: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Singular PascalCase name used in routes (`Patient` -> `createPatient`).
    pub name: String,
    /// Plural used by list routes. Defaults to `name` + "s".
    #[serde(default)]
    pub plural: Option<String>,
    pub table: String,
    #[serde(default = "default_id_column")]
    pub primary_key: String,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub joins: Vec<JoinConfig>,
    #[serde(default)]
    pub scopes: Vec<ScopeConfig>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
    #[serde(default)]
    pub lookups: Vec<LookupConfig>,
    pub roles: RoleConfig,
    /// Column names that must never be exposed in API responses.
    #[serde(default)]
    pub sensitive_columns: Vec<String>,
    #[serde(default)]
    pub welcome_email: Option<WelcomeEmailConfig>,
    /// Exposes an unauthenticated `POST /get{Name}By{login}` credential check.
    #[serde(default)]
    pub login: Option<String>,
}

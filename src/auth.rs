//! Credential check: `Authorization: email:password` against the user table, then a role whitelist.

use crate::config::AuthConfig;
use crate::error::{AppError, AuthError};
use crate::sql::quoted;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::collections::HashMap;

/// The account a request was authorized as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl User {
    pub fn has_any_role(&self, allowed: &[String]) -> bool {
        self.roles.iter().any(|r| allowed.contains(r))
    }
}

/// Split the header value on the first `:`. The password may itself contain colons.
pub fn parse_credentials(header: &str) -> Result<(&str, &str), AuthError> {
    header.split_once(':').ok_or(AuthError::InvalidLogin)
}

#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn find_by_credentials(&self, email: &str, password: &str) -> Result<Option<User>, AppError>;
}

/// Looks users up in PostgreSQL.
pub struct PgUserLookup {
    pool: PgPool,
    sql: String,
}

impl PgUserLookup {
    pub fn new(pool: PgPool, auth: &AuthConfig) -> Self {
        let sql = format!(
            "SELECT {}::text AS id, {}::text AS email, {}::text[] AS roles FROM {} WHERE {} = $1::text AND {} = $2::text LIMIT 1",
            quoted(&auth.id_column),
            quoted(&auth.email_column),
            quoted(&auth.roles_column),
            quoted(&auth.table),
            quoted(&auth.email_column),
            quoted(&auth.password_column),
        );
        PgUserLookup { pool, sql }
    }
}

#[async_trait]
impl UserLookup for PgUserLookup {
    async fn find_by_credentials(&self, email: &str, password: &str) -> Result<Option<User>, AppError> {
        tracing::debug!(sql = %self.sql, email, "credential query");
        let row = sqlx::query(&self.sql)
            .bind(email)
            .bind(password)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        let roles: Option<Vec<Option<String>>> = row.try_get("roles")?;
        Ok(Some(User {
            id: row.try_get::<Option<String>, _>("id")?.unwrap_or_default(),
            email: row.try_get::<Option<String>, _>("email")?.unwrap_or_default(),
            roles: roles.unwrap_or_default().into_iter().flatten().collect(),
        }))
    }
}

/// Fixed set of users keyed by (email, password). Used by router tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryUserLookup {
    users: HashMap<(String, String), User>,
}

impl InMemoryUserLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, email: &str, password: &str, roles: &[&str]) -> Self {
        let user = User {
            id: (self.users.len() + 1).to_string(),
            email: email.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        };
        self.users.insert((email.to_string(), password.to_string()), user);
        self
    }
}

#[async_trait]
impl UserLookup for InMemoryUserLookup {
    async fn find_by_credentials(&self, email: &str, password: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&(email.to_string(), password.to_string())).cloned())
    }
}

/// Resolve the caller and require at least one of `required_roles`.
pub async fn authorize(
    credentials: Option<&str>,
    required_roles: &[String],
    lookup: &dyn UserLookup,
) -> Result<User, AppError> {
    let header = credentials.ok_or(AuthError::MissingCredentials)?;
    let (email, password) = parse_credentials(header)?;
    let user = lookup
        .find_by_credentials(email, password)
        .await?
        .ok_or_else(|| {
            tracing::debug!(email, "login rejected");
            AuthError::InvalidLogin
        })?;
    if !user.has_any_role(required_roles) {
        tracing::debug!(email, roles = ?user.roles, "role check failed");
        return Err(AuthError::InsufficientRole.into());
    }
    Ok(user)
}

//! Generic CRUD execution against PostgreSQL.

use crate::config::{AuthConfig, ColumnRef, ResolvedEntity};
use crate::error::AppError;
use crate::mail::{Mailer, WelcomeRecipient, WelcomeTemplate};
use crate::service::row::row_to_json;
use crate::sql::{
    delete, insert, select_by_credentials, select_by_id, select_filtered, select_list, select_welcome_recipient,
    update, Condition, PgBindValue, QueryBuf,
};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres, Row};
use std::collections::HashMap;

/// Welcome mail settings for a create that registers an account holder.
pub struct Welcome<'a> {
    pub auth: &'a AuthConfig,
    pub mailer: &'a dyn Mailer,
    pub template: &'a WelcomeTemplate,
}

pub struct CrudService;

impl CrudService {
    /// Rows of an entity, optionally restricted to one scope key and limited.
    pub async fn list(
        pool: &PgPool,
        entity: &ResolvedEntity,
        scope: Option<(&ColumnRef, &Value)>,
        limit: Option<u32>,
    ) -> Result<Vec<Value>, AppError> {
        let q = select_list(entity, scope, limit);
        Self::query_many(pool, &q).await
    }

    /// Rows matching one filter predicate.
    pub async fn filter(
        pool: &PgPool,
        entity: &ResolvedEntity,
        scope: Option<(&ColumnRef, &Value)>,
        column: &ColumnRef,
        condition: &Condition,
    ) -> Result<Vec<Value>, AppError> {
        let q = select_filtered(entity, scope, column, condition);
        Self::query_many(pool, &q).await
    }

    /// Fetch one row by primary key.
    pub async fn read(pool: &PgPool, entity: &ResolvedEntity, id: &Value) -> Result<Option<Value>, AppError> {
        let q = select_by_id(entity, id);
        Self::query_optional(pool, &q).await
    }

    /// First row whose column equals the value (e.g. the patient record of a user).
    pub async fn lookup(
        pool: &PgPool,
        entity: &ResolvedEntity,
        column: &ColumnRef,
        value: &Value,
    ) -> Result<Option<Value>, AppError> {
        let q = select_list(entity, Some((column, value)), Some(1));
        Self::query_optional(pool, &q).await
    }

    /// Row of the credential table matching email and password.
    pub async fn login(
        pool: &PgPool,
        entity: &ResolvedEntity,
        auth: &AuthConfig,
        email: &str,
        password: &str,
    ) -> Result<Option<Value>, AppError> {
        let q = select_by_credentials(entity, auth, email, password);
        Self::query_optional(pool, &q).await
    }

    /// Insert one row and return it. The primary key is always generated.
    pub async fn create(
        pool: &PgPool,
        entity: &ResolvedEntity,
        body: &HashMap<String, Value>,
    ) -> Result<Value, AppError> {
        let q = insert(entity, body);
        Self::query_optional(pool, &q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    /// Insert one row and mail its account holder, all in one serializable transaction.
    /// The row is only kept if the mail was handed to the transport.
    pub async fn create_with_welcome(
        pool: &PgPool,
        entity: &ResolvedEntity,
        user_column: &str,
        body: &HashMap<String, Value>,
        welcome: Welcome<'_>,
    ) -> Result<Value, AppError> {
        let mut tx = pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let q = insert(entity, body);
        let row = Self::tx_optional(&mut *tx, &q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;

        let user_id = row.get(user_column).cloned().unwrap_or(Value::Null);
        let q = select_welcome_recipient(welcome.auth, &user_id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let recipient = bind_all(&q)
            .fetch_optional(&mut *tx)
            .await?
            .map(|r| recipient_from_row(&r))
            .transpose()?
            .ok_or_else(|| AppError::NotFound("User".into()))?;

        let message = welcome.template.render(&recipient);
        welcome.mailer.send(&message).await?;

        tx.commit().await?;
        Ok(row)
    }

    /// Update the columns present in the body. None when no row has the id.
    pub async fn update(
        pool: &PgPool,
        entity: &ResolvedEntity,
        id: &Value,
        body: &HashMap<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let q = update(entity, id, body);
        Self::query_optional(pool, &q).await
    }

    /// Delete by id; deleting a missing id is not an error.
    pub async fn delete(pool: &PgPool, entity: &ResolvedEntity, id: &Value) -> Result<u64, AppError> {
        let q = delete(entity, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let done = bind_all(&q).execute(pool).await?;
        Ok(done.rows_affected())
    }

    async fn query_optional(pool: &PgPool, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(q).fetch_optional(pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    async fn query_many(pool: &PgPool, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(q).fetch_all(pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn tx_optional(tx: &mut PgConnection, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let row = bind_all(q).fetch_optional(&mut *tx).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }
}

fn bind_all(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

fn recipient_from_row(row: &PgRow) -> Result<WelcomeRecipient, AppError> {
    Ok(WelcomeRecipient {
        name: row.try_get::<Option<String>, _>("name")?.unwrap_or_default(),
        email: row.try_get::<Option<String>, _>("email")?.unwrap_or_default(),
        password: row.try_get::<Option<String>, _>("password")?.unwrap_or_default(),
    })
}

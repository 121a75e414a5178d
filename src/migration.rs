//! Bring up a fresh database from the model: one `CREATE TABLE IF NOT EXISTS` per entity.
//! Existing tables are left alone, so this is safe to run on every start.

use crate::config::{ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use crate::sql::quoted;
use sqlx::PgPool;

/// DDL for one entity's table, columns in model order.
pub fn create_table_sql(entity: &ResolvedEntity) -> String {
    let cols: Vec<String> = entity
        .columns
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", quoted(&c.name), c.declared_type);
            if c.is_pk {
                def.push_str(" PRIMARY KEY");
            } else if !c.nullable {
                def.push_str(" NOT NULL");
            }
            if let Some(d) = &c.default {
                def.push_str(&format!(" DEFAULT {}", d));
            }
            def
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quoted(&entity.table),
        cols.join(", ")
    )
}

pub async fn apply_schema(pool: &PgPool, model: &ResolvedModel) -> Result<(), AppError> {
    for entity in &model.entities {
        let sql = create_table_sql(entity);
        tracing::debug!(sql = %sql, "ddl");
        sqlx::query(&sql).execute(pool).await?;
        tracing::info!(table = %entity.table, "table ready");
    }
    Ok(())
}

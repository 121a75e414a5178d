//! Load the model from JSON and resolve it into the route table.

use crate::config::resolved::{
    cast_type, ColumnInfo, ColumnKind, ColumnRef, JoinedColumn, ResolvedEntity, ResolvedJoin, ResolvedModel,
    ResolvedService, Route, RouteKind, RouteMethod, ScopeSpec,
};
use crate::config::types::*;
use crate::config::{expand_roles, validate};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Rows returned by the `getInitial...` routes.
pub const INITIAL_PAGE_SIZE: u32 = 10;

const DEFAULT_MODEL: &str = include_str!("../../config/clinic.json");

/// Parse a model from JSON text.
pub fn parse_model(json: &str) -> Result<ModelConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// The clinic model shipped with the crate.
pub fn default_model() -> Result<ModelConfig, ConfigError> {
    parse_model(DEFAULT_MODEL)
}

/// Load a model file, or the shipped clinic model when no path is given.
pub async fn load_model(path: Option<&Path>) -> Result<ModelConfig, ConfigError> {
    match path {
        Some(p) => {
            let text = tokio::fs::read_to_string(p)
                .await
                .map_err(|e| ConfigError::Load(format!("{}: {}", p.display(), e)))?;
            parse_model(&text)
        }
        None => default_model(),
    }
}

/// Build the resolved model from config (validates first).
pub fn resolve(config: &ModelConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let mut entities = Vec::with_capacity(config.entities.len());
    let mut routes: HashMap<String, Route> = HashMap::new();

    for e in &config.entities {
        let entity = Arc::new(resolve_entity(config, e)?);
        for route in build_routes(config, e, &entity)? {
            if routes.contains_key(&route.name) {
                return Err(ConfigError::DuplicateRoute(route.name));
            }
            routes.insert(route.name.clone(), route);
        }
        entities.push(entity);
    }

    let services = config
        .services
        .iter()
        .map(|s| ResolvedService {
            name: s.name.clone(),
            port: s.port,
            entities: s.entities.clone(),
        })
        .collect();

    Ok(ResolvedModel {
        entities,
        routes,
        services,
        auth: config.auth.clone(),
    })
}

fn resolve_entity(config: &ModelConfig, e: &EntityConfig) -> Result<ResolvedEntity, ConfigError> {
    let columns: Vec<ColumnInfo> = e
        .columns
        .iter()
        .map(|c| ColumnInfo {
            name: c.name.clone(),
            declared_type: c.type_.clone(),
            pg_type: cast_type(&c.type_),
            kind: ColumnKind::from_pg_type(&c.type_),
            nullable: c.nullable && c.name != e.primary_key,
            default: c.default.clone(),
            is_pk: c.name == e.primary_key,
        })
        .collect();

    let joins = e
        .joins
        .iter()
        .map(|j| ResolvedJoin {
            table: j.table.clone(),
            alias: j.alias.clone().unwrap_or_else(|| j.table.clone()),
            local_column: j.local_column.clone(),
            foreign_column: j.foreign_column.clone(),
            columns: j
                .columns
                .iter()
                .map(|p| JoinedColumn {
                    column: p.column.clone(),
                    output: p.alias.clone(),
                    pg_type: cast_type(&p.type_),
                    kind: ColumnKind::from_pg_type(&p.type_),
                })
                .collect(),
        })
        .collect();

    Ok(ResolvedEntity {
        name: e.name.clone(),
        plural: plural_of(e),
        table: e.table.clone(),
        pk: e.primary_key.clone(),
        columns,
        joins,
        read_roles: expand_roles(config, &e.roles.read)?,
        write_roles: expand_roles(config, &e.roles.write)?,
        sensitive_columns: e.sensitive_columns.iter().cloned().collect::<HashSet<_>>(),
        welcome_user_column: e.welcome_email.as_ref().map(|w| w.user_column.clone()),
    })
}

fn plural_of(e: &EntityConfig) -> String {
    e.plural.clone().unwrap_or_else(|| format!("{}s", e.name))
}

/// Column referenced by a filter: base column or `alias.column` of a join projection.
fn filter_column(e: &EntityConfig, entity: &ResolvedEntity, column: &str) -> Result<ColumnRef, ConfigError> {
    match column.split_once('.') {
        Some((alias, col)) => {
            let projection = e
                .joins
                .iter()
                .filter(|j| j.alias.as_deref().unwrap_or(&j.table) == alias)
                .flat_map(|j| j.columns.iter())
                .find(|p| p.column == col)
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "joined column",
                    id: column.to_string(),
                })?;
            Ok(ColumnRef {
                qualifier: alias.to_string(),
                name: col.to_string(),
                pg_type: cast_type(&projection.type_),
                kind: ColumnKind::from_pg_type(&projection.type_),
            })
        }
        None => entity.column_ref(column).ok_or_else(|| ConfigError::MissingReference {
            kind: "column",
            id: column.to_string(),
        }),
    }
}

fn build_routes(
    config: &ModelConfig,
    e: &EntityConfig,
    entity: &Arc<ResolvedEntity>,
) -> Result<Vec<Route>, ConfigError> {
    let name = &entity.name;
    let plural = &entity.plural;
    let read = entity.read_roles.clone();
    let write = entity.write_roles.clone();
    let route = |route_name: String, method: RouteMethod, kind: RouteKind, roles: &Vec<String>| Route {
        name: route_name,
        method,
        entity: Arc::clone(entity),
        kind,
        roles: roles.clone(),
    };

    let mut out = vec![
        route(format!("create{}", name), RouteMethod::Post, RouteKind::Create, &write),
        route(format!("update{}", name), RouteMethod::Post, RouteKind::Update, &write),
        route(format!("delete{}", name), RouteMethod::Get, RouteKind::Delete, &write),
        route(format!("get{}ById", name), RouteMethod::Get, RouteKind::ReadById, &read),
    ];

    let scopes: Vec<(String, Option<ScopeSpec>)> = if e.scopes.is_empty() {
        vec![(String::new(), None)]
    } else {
        e.scopes
            .iter()
            .map(|s| {
                let column = entity.column_ref(&s.column).ok_or_else(|| ConfigError::MissingReference {
                    kind: "column",
                    id: s.column.clone(),
                })?;
                let spec = ScopeSpec {
                    column,
                    param: s.param.clone().unwrap_or_else(|| s.column.clone()),
                };
                Ok((s.name.clone(), Some(spec)))
            })
            .collect::<Result<_, ConfigError>>()?
    };

    for (scope_name, scope) in &scopes {
        let (list_suffix, filter_prefix) = if scope.is_some() {
            (format!("By{}", scope_name), format!("By{}And", scope_name))
        } else {
            (String::new(), "By".to_string())
        };
        out.push(route(
            format!("get{}{}", plural, list_suffix),
            RouteMethod::Get,
            RouteKind::List { scope: scope.clone(), limit: None },
            &read,
        ));
        out.push(route(
            format!("getInitial{}{}", plural, list_suffix),
            RouteMethod::Get,
            RouteKind::List {
                scope: scope.clone(),
                limit: Some(INITIAL_PAGE_SIZE),
            },
            &read,
        ));
        for f in &e.filters {
            let column = filter_column(e, entity, &f.column)?;
            let ops = if f.ops.is_empty() { column.kind.default_ops() } else { f.ops.clone() };
            for op in ops {
                out.push(route(
                    format!("get{}{}{}{}", plural, filter_prefix, f.name, op.suffix()),
                    RouteMethod::Get,
                    RouteKind::Filter {
                        scope: scope.clone(),
                        column: column.clone(),
                        op,
                    },
                    &read,
                ));
            }
        }
    }

    for l in &e.lookups {
        let column = entity.column_ref(&l.column).ok_or_else(|| ConfigError::MissingReference {
            kind: "column",
            id: l.column.clone(),
        })?;
        let roles = match &l.roles {
            Some(r) => expand_roles(config, r)?,
            None => read.clone(),
        };
        out.push(route(
            format!("get{}By{}", name, l.name),
            RouteMethod::Get,
            RouteKind::Lookup {
                column,
                param: l.param.clone().unwrap_or_else(|| l.column.clone()),
            },
            &roles,
        ));
    }

    if let Some(login) = &e.login {
        out.push(route(format!("get{}By{}", name, login), RouteMethod::Post, RouteKind::Login, &Vec::new()));
    }

    Ok(out)
}

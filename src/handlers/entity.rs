//! Route dispatch: one GET and one POST handler look the route name up in the resolved model.

use crate::auth::authorize;
use crate::config::{FilterOp, ResolvedEntity, Route, RouteKind, RouteMethod, ScopeSpec};
use crate::error::AppError;
use crate::extractors::Credentials;
use crate::response::{empty_ok, json_many, json_one};
use crate::service::{CrudService, Welcome};
use crate::sql::Condition;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::Response,
};
use serde_json::Value;
use std::collections::HashMap;

fn find_route<'a>(state: &'a AppState, name: &str, method: RouteMethod) -> Result<&'a Route, AppError> {
    state
        .model
        .route(name)
        .filter(|r| r.method == method)
        .ok_or_else(|| AppError::UnknownRoute {
            method: method.as_str(),
            route: name.to_string(),
        })
}

/// Non-empty query parameter.
fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn required(params: &HashMap<String, String>, key: &str) -> Result<Value, AppError> {
    param(params, key)
        .map(|v| Value::String(v.to_string()))
        .ok_or_else(|| AppError::Validation(format!("{} required", key)))
}

/// The predicate a filter operator asks for, with values from `value` or `value1`/`value2`.
pub(crate) fn condition(op: FilterOp, params: &HashMap<String, String>) -> Result<Condition, AppError> {
    let value = || {
        param(params, "value")
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("Value required".into()))
    };
    Ok(match op {
        FilterOp::Empty => Condition::Empty,
        FilterOp::NotEmpty => Condition::NotEmpty,
        FilterOp::Contains => Condition::Contains(value()?),
        FilterOp::Equals => Condition::Equals(value()?),
        FilterOp::LessThan | FilterOp::Before => Condition::LessThan(value()?),
        FilterOp::GreaterThan | FilterOp::After => Condition::GreaterThan(value()?),
        FilterOp::Between => match (param(params, "value1"), param(params, "value2")) {
            (Some(low), Some(high)) => Condition::Between(low.to_string(), high.to_string()),
            _ => return Err(AppError::Validation("Two values required".into())),
        },
    })
}

fn scope_value(scope: &Option<ScopeSpec>, params: &HashMap<String, String>) -> Result<Option<Value>, AppError> {
    scope.as_ref().map(|s| required(params, &s.param)).transpose()
}

fn body_to_map(body: &Bytes) -> Result<HashMap<String, Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(HashMap::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(m)) => Ok(m.into_iter().collect()),
        Ok(_) => Err(AppError::BadRequest("Request body must be a JSON object".into())),
        Err(e) => Err(AppError::BadRequest(format!("Invalid JSON body: {}", e))),
    }
}

fn body_id(entity: &ResolvedEntity, body: &HashMap<String, Value>) -> Result<Value, AppError> {
    body.get(&entity.pk)
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| AppError::Validation(format!("{} required", entity.pk)))
}

fn body_text<'a>(body: &'a HashMap<String, Value>, key: &str) -> Result<&'a str, AppError> {
    body.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Validation(format!("{} required", key)))
}

pub async fn dispatch_get(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Credentials(credentials): Credentials,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let route = find_route(&state, &name, RouteMethod::Get)?;
    authorize(credentials.as_deref(), &route.roles, state.users.as_ref()).await?;
    let entity = route.entity.as_ref();
    let pool = &state.pool;

    match &route.kind {
        RouteKind::Delete => {
            let id = required(&params, "id")?;
            let deleted = CrudService::delete(pool, entity, &id).await?;
            tracing::debug!(entity = %entity.name, deleted, "delete");
            Ok(empty_ok())
        }
        RouteKind::ReadById => {
            let id = required(&params, "id")?;
            let row = CrudService::read(pool, entity, &id)
                .await?
                .ok_or_else(|| AppError::NotFound(entity.name.clone()))?;
            Ok(json_one(row, &entity.sensitive_columns))
        }
        RouteKind::List { scope, limit } => {
            let value = scope_value(scope, &params)?;
            let scope = scope.as_ref().zip(value.as_ref()).map(|(s, v)| (&s.column, v));
            let rows = CrudService::list(pool, entity, scope, *limit).await?;
            Ok(json_many(rows, &entity.sensitive_columns))
        }
        RouteKind::Filter { scope, column, op } => {
            let value = scope_value(scope, &params)?;
            let condition = condition(*op, &params)?;
            let scope = scope.as_ref().zip(value.as_ref()).map(|(s, v)| (&s.column, v));
            let rows = CrudService::filter(pool, entity, scope, column, &condition).await?;
            Ok(json_many(rows, &entity.sensitive_columns))
        }
        RouteKind::Lookup { column, param } => {
            let value = required(&params, param)?;
            let row = CrudService::lookup(pool, entity, column, &value)
                .await?
                .ok_or_else(|| AppError::NotFound(entity.name.clone()))?;
            Ok(json_one(row, &entity.sensitive_columns))
        }
        RouteKind::Create | RouteKind::Update | RouteKind::Login => Err(AppError::UnknownRoute {
            method: RouteMethod::Get.as_str(),
            route: name,
        }),
    }
}

pub async fn dispatch_post(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Credentials(credentials): Credentials,
    body: Bytes,
) -> Result<Response, AppError> {
    let route = find_route(&state, &name, RouteMethod::Post)?;
    let entity = route.entity.as_ref();
    let pool = &state.pool;

    if matches!(route.kind, RouteKind::Login) {
        let body = body_to_map(&body)?;
        let auth = &state.model.auth;
        let email = body_text(&body, &auth.email_column)?;
        let password = body_text(&body, &auth.password_column)?;
        let row = CrudService::login(pool, entity, auth, email, password)
            .await?
            .ok_or_else(|| AppError::NotFound(entity.name.clone()))?;
        return Ok(json_one(row, &entity.sensitive_columns));
    }

    authorize(credentials.as_deref(), &route.roles, state.users.as_ref()).await?;
    let body = body_to_map(&body)?;

    match &route.kind {
        RouteKind::Create => {
            let row = match &entity.welcome_user_column {
                Some(user_column) => {
                    let welcome = Welcome {
                        auth: &state.model.auth,
                        mailer: state.mailer.as_ref(),
                        template: &state.welcome,
                    };
                    CrudService::create_with_welcome(pool, entity, user_column, &body, welcome).await?
                }
                None => CrudService::create(pool, entity, &body).await?,
            };
            Ok(json_one(row, &entity.sensitive_columns))
        }
        RouteKind::Update => {
            let id = body_id(entity, &body)?;
            let row = CrudService::update(pool, entity, &id, &body)
                .await?
                .ok_or_else(|| AppError::NotFound(entity.name.clone()))?;
            Ok(json_one(row, &entity.sensitive_columns))
        }
        _ => Err(AppError::UnknownRoute {
            method: RouteMethod::Post.as_str(),
            route: name,
        }),
    }
}

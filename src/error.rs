//! Typed errors and HTTP mapping. Every request-level failure is reported the same way:
//! status 409 with the message as a plain-text body.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: entity {entity} column {column}")]
    InvalidPrimaryKey { entity: String, column: String },
    #[error("duplicate route: {0}")]
    DuplicateRoute(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("environment: {0}")]
    Env(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header required")]
    MissingCredentials,
    #[error("Login is not valid")]
    InvalidLogin,
    #[error("Login does not have the required roles")]
    InsufficientRole,
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("invalid mail address: {0}")]
    Address(String),
    #[error("mail build: {0}")]
    Build(String),
    #[error("mail transport: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Db(#[from] sqlx::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("Cannot {method} /{route}")]
    UnknownRoute { method: &'static str, route: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::UnknownRoute { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::CONFLICT,
        };
        match &self {
            AppError::Db(e) => tracing::warn!(error = %e, "database error"),
            AppError::Mail(e) => tracing::warn!(error = %e, "mail error"),
            AppError::Config(e) => tracing::error!(error = %e, "config error"),
            _ => tracing::debug!(error = %self, "request failed"),
        }
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

//! Runtime settings from the environment (`.env` is loaded by the binary via dotenvy).

use crate::error::ConfigError;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub model_path: Option<PathBuf>,
    pub bind_host: String,
    /// Serve every service on this port instead of each service's own.
    pub single_port: Option<u16>,
    pub db_max_connections: u32,
    pub apply_schema: bool,
    /// None: mail is logged, not delivered.
    pub smtp: Option<SmtpSettings>,
    pub mail_from: String,
    pub mail_brand: String,
    pub mail_support: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let smtp = match var("SMTP_HOST") {
            Some(host) => Some(SmtpSettings {
                host,
                port: parse_or(var("SMTP_PORT"), "SMTP_PORT", 465)?,
                username: var("SMTP_USERNAME"),
                password: var("SMTP_PASSWORD"),
            }),
            None => None,
        };

        Ok(Settings {
            database_url: var("DATABASE_URL").unwrap_or_else(|| "postgres://localhost/clinic".into()),
            model_path: var("MODEL_PATH").map(PathBuf::from),
            bind_host: var("BIND_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            single_port: var("SINGLE_PORT")
                .map(|v| parse_value(&v, "SINGLE_PORT"))
                .transpose()?,
            db_max_connections: parse_or(var("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 5)?,
            apply_schema: parse_flag(var("APPLY_SCHEMA"), "APPLY_SCHEMA")?,
            smtp,
            mail_from: var("MAIL_FROM").unwrap_or_else(|| "no-reply@localhost".into()),
            mail_brand: var("MAIL_BRAND").unwrap_or_else(|| "Health Gainz".into()),
            mail_support: var("MAIL_SUPPORT").unwrap_or_else(|| "support@localhost".into()),
        })
    }
}

fn parse_value<T: std::str::FromStr>(v: &str, key: &str) -> Result<T, ConfigError> {
    v.parse()
        .map_err(|_| ConfigError::Env(format!("{}: invalid value '{}'", key, v)))
}

fn parse_or<T: std::str::FromStr>(v: Option<String>, key: &str, default: T) -> Result<T, ConfigError> {
    match v {
        Some(v) => parse_value(&v, key),
        None => Ok(default),
    }
}

fn parse_flag(v: Option<String>, key: &str) -> Result<bool, ConfigError> {
    match v.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Env(format!("{}: invalid flag '{}'", key, other))),
    }
}

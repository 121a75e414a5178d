//! Clinic service: model-driven CRUD microservices for a physiotherapy clinic.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod mail;
pub mod migration;
pub mod response;
pub mod settings;
pub mod sql;
pub mod state;
pub mod service;
pub mod handlers;
pub mod routes;

pub use auth::{authorize, InMemoryUserLookup, PgUserLookup, User, UserLookup};
pub use config::{load_model, resolve, ResolvedEntity, ResolvedModel};
pub use db::{connect, ensure_database_exists};
pub use error::{AppError, AuthError, ConfigError, MailError};
pub use mail::{LogMailer, MailMessage, Mailer, SmtpMailer, WelcomeTemplate};
pub use migration::apply_schema;
pub use settings::Settings;
pub use state::AppState;
pub use routes::{service_routers, service_routes, ServiceRouter};
pub use service::CrudService;

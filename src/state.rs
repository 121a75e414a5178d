//! Shared application state for all routes.

use crate::auth::UserLookup;
use crate::config::ResolvedModel;
use crate::mail::{Mailer, WelcomeTemplate};
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Routes served by this listener (one service, or all of them in single-port mode).
    pub model: Arc<ResolvedModel>,
    pub users: Arc<dyn UserLookup>,
    pub mailer: Arc<dyn Mailer>,
    pub welcome: WelcomeTemplate,
}

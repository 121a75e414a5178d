//! Clinic server: every service of the model on its own port (or all on `SINGLE_PORT`).
//!
//! Run from repo root: `cargo run -p clinic-server`

use clinic_service::{
    apply_schema, connect, ensure_database_exists, load_model, resolve, service_routers, AppState, LogMailer,
    Mailer, PgUserLookup, Settings, SmtpMailer, WelcomeTemplate,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("clinic_service=info,clinic_server=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    ensure_database_exists(&settings.database_url).await?;
    let pool = connect(&settings).await?;

    let config = load_model(settings.model_path.as_deref()).await?;
    let model = resolve(&config)?;
    if settings.apply_schema {
        apply_schema(&pool, &model).await?;
    }

    let mailer: Arc<dyn Mailer> = match &settings.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(
            &smtp.host,
            smtp.port,
            smtp.username.as_deref(),
            smtp.password.as_deref(),
            &settings.mail_from,
        )?),
        None => {
            tracing::warn!("SMTP_HOST not set; welcome mail will be logged only");
            Arc::new(LogMailer)
        }
    };

    let state = AppState {
        pool: pool.clone(),
        users: Arc::new(PgUserLookup::new(pool, &model.auth)),
        model: Arc::new(model),
        mailer,
        welcome: WelcomeTemplate {
            brand: settings.mail_brand.clone(),
            support: settings.mail_support.clone(),
        },
    };

    let mut servers = JoinSet::new();
    for service in service_routers(state, settings.single_port) {
        let listener = TcpListener::bind((settings.bind_host.as_str(), service.port)).await?;
        tracing::info!(
            "Service '{}' listening on http://{}",
            service.name,
            listener.local_addr()?
        );
        servers.spawn(async move { axum::serve(listener, service.router).await });
    }

    while let Some(done) = servers.join_next().await {
        done??;
    }
    Ok(())
}

use anyhow::Result;
use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use common::settings::Settings;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

mod debounce;
mod error;
mod live;
mod middleware;
mod models;
mod repositories;
mod routes;
mod scanner;
mod spreadsheet;
mod state;
mod validation;
mod verification;

use crate::{middleware::JwtVerifier, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_max_level(Level::INFO)
        .init();

    info!("Starting API service");

    let settings = Settings::load()?;
    if settings.auth.jwt_public_key.trim().is_empty() {
        anyhow::bail!("GATEPASS__AUTH__JWT_PUBLIC_KEY must be set to a PEM key or key file path");
    }
    let jwt = JwtVerifier::from_public_key(&settings.auth.jwt_public_key)?;

    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    run_migrations(&pool).await?;

    let app_state = AppState::new(pool, jwt, settings.scan.debounce());
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&settings.server.listen_addr).await?;
    info!("API service listening on {}", settings.server.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down API service");
        })
        .await?;

    Ok(())
}

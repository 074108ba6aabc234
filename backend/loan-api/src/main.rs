//! Loan API — entry point.
//!
//! Opens (and migrates) the SQLite database, then serves the loan
//! lifecycle REST API.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use loan_api::api::{self, ApiState};
use loan_api::config::Config;
use loan_api::db::{self, SqliteLoanStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load optional .env file (ignored if missing) before RUST_LOG is read.
    let _ = dotenvy::dotenv();

    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let pool = db::init_pool(&config.database_url, config.max_connections).await?;
    let state = Arc::new(ApiState {
        store: Arc::new(SqliteLoanStore::new(pool)),
    });

    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! Centinela authentication server binary.
//!
//! Serves the session, role and API key routes over PostgreSQL. With
//! `--issue-api-key <system>` it instead mints one API key, prints
//! `{"key": ..., "id": ...}` to stdout and exits; every route except
//! `/health` needs a key, so the first one is created this way.

use std::sync::Arc;

use centinela_api::config::ApiConfig;
use centinela_core::config::AuthConfig;
use centinela_core::identity::toolkit::ToolkitProvider;
use centinela_core::models::api_key::NewApiKey;
use centinela_core::services::{Backends, Services};
use centinela_core::store::postgres::PgStore;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "centinela_server", about = "Centinela authentication server")]
struct Args {
    /// Address to listen on. Overrides `BIND_ADDR`.
    #[arg(long)]
    bind: Option<String>,

    /// PostgreSQL connection URL. Overrides `DATABASE_URL`.
    #[arg(long)]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Issue an API key for the named system, print it and exit.
    #[arg(long, value_name = "SYSTEM_NAME")]
    issue_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays clean for `--issue-api-key` output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info,centinela_api=debug,centinela_core=debug")
                }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(url) = args.database_url {
        config.pg_connection_url = url;
    }
    let auth_config = AuthConfig::from_env()?;

    info!(?config, max_connections = args.max_connections, "starting centinela_server");

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    centinela_api::migrate(&pool).await?;

    let provider = ToolkitProvider::new(&config.identity_api_url, config.identity_api_key.clone())?;
    let backends = Backends::postgres(PgStore::new(pool), Arc::new(provider));
    let services = Services::new(auth_config, backends)?;

    if let Some(system_name) = args.issue_api_key {
        let created = services
            .api_keys
            .create(NewApiKey {
                system_name,
                ..NewApiKey::default()
            })
            .await?;
        println!(
            "{}",
            serde_json::json!({ "key": created.key, "id": created.record.id })
        );
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    let app = centinela_api::router(centinela_api::AppState::new(services, config));

    info!(addr = %local_addr, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}

//! # BizAcc API Server
//!
//! HTTP server for the BizAcc accounting core: identity and approval
//! workflow, per-organization record collections, GST invoices, and the
//! customer directory.
//!
//! ## Usage
//!
//! ```bash
//! JWT_SECRET=$(openssl rand -hex 32) cargo run -p bizacc-api
//! ```
//!
//! Set `LOG_FORMAT=json` for structured logs and `RUST_LOG` to adjust levels.

use bizacc_api::{
    app::{build_router, AppState},
    config::{Config, StoreConfig},
};
use bizacc_shared::{
    auth::password,
    customers::{CustomerBackend, CustomerService, RestConfig, RestCustomerBackend},
    db::{
        migrations::run_migrations,
        pool::{create_pool, DatabaseConfig},
    },
    models::actor::provision_seed_superadmins,
    store::{
        postgres::PgBackend,
        redis::{RedisBackend, RedisConfig},
        BackendKind, RecordStore,
    },
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "bizacc_api=debug,bizacc_shared=info,tower_http=debug".into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("BizAcc API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let store = build_store(&config.store).await?;
    tracing::info!(
        backend = store.backend_name(),
        namespace = store.namespace(),
        policy = store.policy().as_str(),
        "Record store ready"
    );

    let customers = match (&config.customers.rest_url, &config.customers.rest_key) {
        (Some(url), Some(key)) => {
            let mut rest = RestConfig::new(url.clone(), key.clone());
            rest.timeout = Duration::from_secs(config.customers.timeout_seconds);
            rest.max_attempts = config.customers.max_attempts;
            let backend: Arc<dyn CustomerBackend> = Arc::new(RestCustomerBackend::new(rest)?);
            tracing::info!(url = %url, "Using external customer service");
            CustomerService::new(store.clone(), Some(backend))
        }
        _ => CustomerService::local(store.clone()),
    };

    let state = AppState::with_customers(store, config.clone(), customers);

    let seed_hash = config
        .auth
        .seed_password
        .as_deref()
        .map(|pw| password::hash_password_with(pw, state.hash_cost))
        .transpose()?;
    provision_seed_superadmins(&state.store, &state.seeds, seed_hash.as_deref()).await?;

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!("Server listening on http://{}", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Connects the configured backend and wraps it in a [`RecordStore`]
async fn build_store(config: &StoreConfig) -> anyhow::Result<RecordStore> {
    let store = match config.backend {
        BackendKind::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            RecordStore::memory()
        }
        BackendKind::Postgres => {
            let url = config
                .database_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required"))?;
            let mut db = DatabaseConfig::new(url);
            db.max_connections = config.max_connections;
            db.min_connections = db.min_connections.min(db.max_connections);

            let pool = create_pool(db).await?;
            run_migrations(&pool).await?;
            RecordStore::new(Arc::new(PgBackend::new(pool)))
        }
        BackendKind::Redis => {
            let url = config
                .redis_url
                .clone()
                .ok_or_else(|| anyhow::anyhow!("REDIS_URL is required"))?;
            RecordStore::new(Arc::new(RedisBackend::connect(RedisConfig::new(url)).await?))
        }
    };

    Ok(store
        .with_namespace(&config.namespace)
        .with_policy(config.write_policy))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}

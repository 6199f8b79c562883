/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use bizacc_api::{app::{build_router, AppState}, config::Config};
/// use bizacc_shared::store::RecordStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(RecordStore::memory(), config);
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{security::SecurityHeadersLayer, session::session_layer},
};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use bizacc_shared::auth::password::HashCost;
use bizacc_shared::customers::CustomerService;
use bizacc_shared::models::actor::SeedRegistry;
use bizacc_shared::quota::QuotaEnforcer;
use bizacc_shared::store::RecordStore;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: RecordStore,

    pub config: Arc<Config>,

    /// Emails that are always superadmins
    pub seeds: Arc<SeedRegistry>,

    pub customers: CustomerService,

    pub quotas: QuotaEnforcer,

    /// Argon2 cost for new password hashes
    pub hash_cost: HashCost,
}

impl AppState {
    /// State with a local-only customer service
    pub fn new(store: RecordStore, config: Config) -> Self {
        let customers = CustomerService::local(store.clone());
        Self::with_customers(store, config, customers)
    }

    pub fn with_customers(store: RecordStore, config: Config, customers: CustomerService) -> Self {
        let seeds = SeedRegistry::new(config.auth.seed_superadmins.iter().map(String::as_str));
        Self {
            quotas: QuotaEnforcer::with_seeds(store.clone(), seeds.clone()),
            store,
            config: Arc::new(config),
            seeds: Arc::new(seeds),
            customers,
            hash_cost: HashCost::default(),
        }
    }

    pub fn with_hash_cost(mut self, hash_cost: HashCost) -> Self {
        self.hash_cost = hash_cost;
        self
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Health check (public)
/// └── /api/
///     ├── /auth/                       # signup, login, refresh, password reset, me
///     ├── /users/                      # listing, approval workflow, plan changes
///     ├── /records/:entity[/:id]       # generic owned collections
///     ├── /invoices, /quotations       # GST documents
///     ├── /customers[/:id]             # customer directory
///     ├── /plans[/:tier]               # plan catalog
///     └── /admin/                      # reconcile, audit log
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Session resolution (bearer token to actor)
/// 2. Logging (tower-http TraceLayer)
/// 3. Response compression (gzip, brotli)
/// 4. CORS (tower-http CorsLayer)
/// 5. Security headers
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/signup", post(routes::auth::signup))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/forgot-password", post(routes::auth::forgot_password))
        .route("/verify-reset-token", post(routes::auth::verify_reset_token))
        .route("/reset-password", post(routes::auth::reset_password))
        .route("/change-password", post(routes::auth::change_password))
        .route("/me", get(routes::auth::me));

    let user_routes = Router::new()
        .route("/", get(routes::users::list_users))
        .route("/:id/approve", post(routes::users::approve_user))
        .route("/:id/reject", post(routes::users::reject_user))
        .route("/:id/suspend", post(routes::users::suspend_user))
        .route("/:id/reinstate", post(routes::users::reinstate_user))
        .route("/:id/plan", put(routes::users::change_user_plan));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .route(
            "/records/:entity",
            get(routes::records::list_records).post(routes::records::create_record),
        )
        .route(
            "/records/:entity/:id",
            put(routes::records::update_record).delete(routes::records::delete_record),
        )
        .route(
            "/invoices",
            get(routes::invoices::list_invoices).post(routes::invoices::create_invoice),
        )
        .route(
            "/quotations",
            get(routes::invoices::list_quotations).post(routes::invoices::create_quotation),
        )
        .route(
            "/customers",
            get(routes::customers::list_customers).post(routes::customers::create_customer),
        )
        .route("/customers/:id", put(routes::customers::update_customer))
        .route("/plans", get(routes::plans::list_plans))
        .route("/plans/:tier", put(routes::plans::update_plan))
        .route("/admin/reconcile", post(routes::admin::reconcile))
        .route("/admin/logs", get(routes::admin::list_logs))
        .layer(axum::middleware::from_fn_with_state(state.clone(), session_layer));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

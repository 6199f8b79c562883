/// Configuration management for the API server
///
/// Loads configuration from environment variables (and a `.env` file when
/// present) into a typed struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `API_PRODUCTION`: Enables HSTS (default: false)
/// - `CORS_ORIGINS`: Comma-separated origins, `*` for any (default: *)
/// - `STORE_BACKEND`: `memory`, `postgres`, or `redis` (default: memory)
/// - `STORE_NAMESPACE`: Key prefix (default: bizacc)
/// - `STORE_WRITE_POLICY`: `optimistic` or `last_write_wins` (default: optimistic)
/// - `DATABASE_URL`: PostgreSQL connection string (required for `postgres`)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `REDIS_URL`: Redis connection string (required for `redis`)
/// - `JWT_SECRET`: Secret key for JWT signing (required, at least 32 chars)
/// - `JWT_ACCESS_TTL_SECONDS` / `JWT_REFRESH_TTL_SECONDS`: token lifetimes
/// - `SEED_SUPERADMINS`: Comma-separated superadmin emails (default: admin@bizacc.in)
/// - `SEED_SUPERADMIN_PASSWORD`: Initial password for newly created seeds
/// - `RESET_TOKEN_TTL_MINUTES`: Password reset lifetime (default: 60)
/// - `SUPPLIER_STATE_CODE`: Default GST state code of the business (default: 27)
/// - `CUSTOMERS_REST_URL` / `CUSTOMERS_REST_KEY`: External customer service
/// - `CUSTOMERS_TIMEOUT_SECONDS` / `CUSTOMERS_MAX_ATTEMPTS`: its client settings
///
/// # Example
///
/// ```no_run
/// use bizacc_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use bizacc_shared::models::actor::DEFAULT_SEED_SUPERADMIN;
use bizacc_shared::store::{BackendKind, WritePolicy, DEFAULT_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub jwt: JwtConfig,
    pub auth: AuthConfig,
    pub customers: CustomersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Enables HSTS; use only behind HTTPS
    pub production: bool,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: BackendKind,
    pub namespace: String,
    pub write_policy: WritePolicy,

    /// PostgreSQL connection URL
    pub database_url: Option<String>,
    pub max_connections: u32,

    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be at least 32 bytes. Generate with: `openssl rand -hex 32`
    pub secret: String,

    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Emails that are always superadmins
    pub seed_superadmins: Vec<String>,

    /// Password given to seed accounts created at startup
    #[serde(skip_serializing)]
    pub seed_password: Option<String>,

    pub reset_token_ttl_minutes: i64,

    /// Default supplier state code for invoices
    pub supplier_state: String,
}

/// External customer service; disabled when `rest_url` is unset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomersConfig {
    pub rest_url: Option<String>,

    #[serde(skip_serializing)]
    pub rest_key: Option<String>,

    pub timeout_seconds: u64,
    pub max_attempts: u32,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var_or(name, default)
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{} is invalid: {}", name, e))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse; see [`Config::validate`].
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let backend = var_or("STORE_BACKEND", "memory")
            .parse::<BackendKind>()
            .map_err(|e| anyhow::anyhow!(e))?;
        let write_policy = var_or("STORE_WRITE_POLICY", "optimistic")
            .parse::<WritePolicy>()
            .map_err(|e| anyhow::anyhow!(e))?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        let config = Self {
            api: ApiConfig {
                host: var_or("API_HOST", "0.0.0.0"),
                port: parse_var("API_PORT", "8080")?,
                production: parse_var("API_PRODUCTION", "false")?,
                cors_origins: split_list(&var_or("CORS_ORIGINS", "*")),
            },
            store: StoreConfig {
                backend,
                namespace: var_or("STORE_NAMESPACE", DEFAULT_NAMESPACE),
                write_policy,
                database_url: optional_var("DATABASE_URL"),
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", "10")?,
                redis_url: optional_var("REDIS_URL"),
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_ttl_seconds: parse_var("JWT_ACCESS_TTL_SECONDS", "3600")?,
                refresh_ttl_seconds: parse_var("JWT_REFRESH_TTL_SECONDS", "2592000")?,
            },
            auth: AuthConfig {
                seed_superadmins: split_list(&var_or("SEED_SUPERADMINS", DEFAULT_SEED_SUPERADMIN)),
                seed_password: optional_var("SEED_SUPERADMIN_PASSWORD"),
                reset_token_ttl_minutes: parse_var("RESET_TOKEN_TTL_MINUTES", "60")?,
                supplier_state: var_or("SUPPLIER_STATE_CODE", "27"),
            },
            customers: CustomersConfig {
                rest_url: optional_var("CUSTOMERS_REST_URL"),
                rest_key: optional_var("CUSTOMERS_REST_KEY"),
                timeout_seconds: parse_var("CUSTOMERS_TIMEOUT_SECONDS", "10")?,
                max_attempts: parse_var("CUSTOMERS_MAX_ATTEMPTS", "3")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// In-memory configuration for tests
    pub fn for_tests() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                production: false,
                cors_origins: vec!["*".to_string()],
            },
            store: StoreConfig {
                backend: BackendKind::Memory,
                namespace: DEFAULT_NAMESPACE.to_string(),
                write_policy: WritePolicy::Optimistic,
                database_url: None,
                max_connections: 1,
                redis_url: None,
            },
            jwt: JwtConfig {
                secret: "test-secret-key-at-least-32-bytes-long".to_string(),
                access_ttl_seconds: 3600,
                refresh_ttl_seconds: 2_592_000,
            },
            auth: AuthConfig {
                seed_superadmins: vec![DEFAULT_SEED_SUPERADMIN.to_string()],
                seed_password: None,
                reset_token_ttl_minutes: 60,
                supplier_state: "27".to_string(),
            },
            customers: CustomersConfig {
                rest_url: None,
                rest_key: None,
                timeout_seconds: 1,
                max_attempts: 1,
            },
        }
    }

    /// Checks cross-field requirements
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt.secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }
        if self.jwt.access_ttl_seconds <= 0 || self.jwt.refresh_ttl_seconds <= 0 {
            anyhow::bail!("JWT token lifetimes must be positive");
        }
        match self.store.backend {
            BackendKind::Postgres if self.store.database_url.is_none() => {
                anyhow::bail!("DATABASE_URL is required for the postgres store backend")
            }
            BackendKind::Redis if self.store.redis_url.is_none() => {
                anyhow::bail!("REDIS_URL is required for the redis store backend")
            }
            _ => {}
        }
        if self.customers.rest_url.is_some() && self.customers.rest_key.is_none() {
            anyhow::bail!("CUSTOMERS_REST_KEY is required when CUSTOMERS_REST_URL is set");
        }
        Ok(())
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

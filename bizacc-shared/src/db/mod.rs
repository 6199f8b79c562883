/// PostgreSQL plumbing for the record store
///
/// # Modules
///
/// - `pool`: connection pool with health checks
/// - `migrations`: embedded schema migrations
///
/// # Example
///
/// ```no_run
/// use bizacc_shared::db::pool::{create_pool, DatabaseConfig};
/// use bizacc_shared::db::migrations::run_migrations;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig::new(std::env::var("DATABASE_URL")?)).await?;
///     run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;

//! Connection pool and schema migrations.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;

pub type Pool = PgPool;

fn options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
}

/// Connect to the collection store.
pub async fn create_pool(config: &Config) -> Result<Pool, sqlx::Error> {
    tracing::debug!(max_connections = config.max_connections, "Connecting to database");
    options(config).connect(&config.database_url).await
}

/// Build a pool that only connects on first use.
#[cfg(test)]
pub fn create_lazy_pool(config: &Config) -> Result<Pool, sqlx::Error> {
    options(config).connect_lazy(&config.database_url)
}

/// Create or update the `collections` and `sessions` tables.
pub async fn run_migrations(pool: &Pool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

//! PostgreSQL pool for the document store
//!
//! [`open_store`] is the one-call path: connect, apply the `documents`
//! migrations, check the connection and wrap the pool in a
//! [`PgDocumentStore`].

use crate::config::DatabaseConfig;
use crate::store::PgDocumentStore;
use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

const APPLICATION_NAME: &str = "peak-performance";

/// Pool sizing and connection lifetimes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(10 * 60),
            max_lifetime: Duration::from_secs(30 * 60),
        }
    }
}

impl From<&DatabaseConfig> for PoolSettings {
    fn from(config: &DatabaseConfig) -> Self {
        let max_connections = config.max_connections.max(1);
        Self {
            max_connections,
            // min may not exceed max
            min_connections: PoolSettings::default().min_connections.min(max_connections),
            ..Default::default()
        }
    }
}

/// Open a pool to the configured database
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let settings = PoolSettings::from(config);
    let options = PgConnectOptions::from_str(&config.url)
        .context("invalid database url")?
        .application_name(APPLICATION_NAME);
    let host = options.get_host().to_string();

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .max_lifetime(settings.max_lifetime)
        .test_before_acquire(true)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to database at {}", host))?;

    info!(
        %host,
        max_connections = settings.max_connections,
        min_connections = settings.min_connections,
        "Database pool created"
    );
    Ok(pool)
}

/// Create the `documents` table and its indexes if they are missing
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("database migrations failed")?;
    info!("Database migrations applied");
    Ok(())
}

pub async fn ping(pool: &PgPool) -> Result<()> {
    if let Err(err) = sqlx::query("SELECT 1").execute(pool).await {
        warn!(error = %err, "Database health check failed");
        return Err(err.into());
    }
    Ok(())
}

/// Connect, migrate and check the database, then hand back a ready store
pub async fn open_store(config: &DatabaseConfig) -> Result<PgDocumentStore> {
    let pool = connect(config).await?;
    migrate(&pool).await?;
    ping(&pool).await?;
    Ok(PgDocumentStore::new(pool))
}

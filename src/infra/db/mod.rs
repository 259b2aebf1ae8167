//! Postgres-backed repository implementations.

mod agents;
mod cookies;
mod devices;
mod errors;
mod routes;
mod sessions;
mod stats;
mod util;
mod visits;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::RepoError;
use crate::config::DatabaseSettings;

use super::error::InfraError;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    /// Connect with the configured settings and apply pending migrations.
    pub async fn from_settings(settings: &DatabaseSettings) -> Result<Self, InfraError> {
        let pool = Self::connect(&settings.url, settings.max_connections)
            .await
            .map_err(|err| InfraError::database(err.to_string()))?;
        Self::run_migrations(&pool)
            .await
            .map_err(|err| InfraError::database(err.to_string()))?;
        Ok(Self::new(pool))
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}

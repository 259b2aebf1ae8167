use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{AgentsRepo, NewAgent, RepoError},
    domain::entities::AgentRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: Uuid,
    name: String,
    browser: String,
    browser_version: String,
    created_at: OffsetDateTime,
}

impl From<AgentRow> for AgentRecord {
    fn from(row: AgentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            browser: row.browser,
            browser_version: row.browser_version,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl AgentsRepo for PostgresRepositories {
    async fn find_or_create(&self, params: NewAgent) -> Result<AgentRecord, RepoError> {
        let existing = sqlx::query_as::<_, AgentRow>(
            "SELECT id, name, browser, browser_version, created_at \
             FROM agents WHERE name = $1 AND browser = $2 AND browser_version = $3",
        )
        .bind(&params.name)
        .bind(&params.browser)
        .bind(&params.browser_version)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = existing {
            return Ok(row.into());
        }

        let inserted = sqlx::query_as::<_, AgentRow>(
            "INSERT INTO agents (id, name, browser, browser_version, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (name, browser, browser_version) DO NOTHING \
             RETURNING id, name, browser, browser_version, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&params.name)
        .bind(&params.browser)
        .bind(&params.browser_version)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = inserted {
            return Ok(row.into());
        }

        sqlx::query_as::<_, AgentRow>(
            "SELECT id, name, browser, browser_version, created_at \
             FROM agents WHERE name = $1 AND browser = $2 AND browser_version = $3",
        )
        .bind(&params.name)
        .bind(&params.browser)
        .bind(&params.browser_version)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
        .map(Into::into)
    }
}

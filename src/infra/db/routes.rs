use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{NewRoute, RepoError, RoutesRepo},
    domain::entities::RouteRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    name: String,
    path: String,
    created_at: OffsetDateTime,
}

impl From<RouteRow> for RouteRecord {
    fn from(row: RouteRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            path: row.path,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl RoutesRepo for PostgresRepositories {
    async fn find_or_create(&self, params: NewRoute) -> Result<RouteRecord, RepoError> {
        let inserted = sqlx::query_as::<_, RouteRow>(
            "INSERT INTO routes (id, name, path, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (name, path) DO NOTHING \
             RETURNING id, name, path, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&params.name)
        .bind(&params.path)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = inserted {
            return Ok(row.into());
        }

        sqlx::query_as::<_, RouteRow>(
            "SELECT id, name, path, created_at FROM routes WHERE name = $1 AND path = $2",
        )
        .bind(&params.name)
        .bind(&params.path)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
        .map(Into::into)
    }
}

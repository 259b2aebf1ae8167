use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{NewVisit, RepoError, VisitsRepo},
    domain::entities::VisitRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
pub(super) struct VisitRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub path: String,
    pub method: String,
    pub route_id: Option<Uuid>,
    pub error_id: Option<Uuid>,
    pub referer: Option<String>,
    pub created_at: OffsetDateTime,
}

impl From<VisitRow> for VisitRecord {
    fn from(row: VisitRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            path: row.path,
            method: row.method,
            route_id: row.route_id,
            error_id: row.error_id,
            referer: row.referer,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl VisitsRepo for PostgresRepositories {
    async fn create(&self, params: NewVisit) -> Result<VisitRecord, RepoError> {
        sqlx::query_as::<_, VisitRow>(
            "INSERT INTO visits (id, session_id, path, method, route_id, error_id, referer, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id, session_id, path, method, route_id, error_id, referer, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(params.session_id)
        .bind(&params.path)
        .bind(&params.method)
        .bind(params.route_id)
        .bind(params.error_id)
        .bind(&params.referer)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
        .map(Into::into)
    }

    async fn attach_route(&self, visit_id: Uuid, route_id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE visits SET route_id = $2 WHERE id = $1")
            .bind(visit_id)
            .bind(route_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn attach_error(&self, visit_id: Uuid, error_id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE visits SET error_id = $2 WHERE id = $1")
            .bind(visit_id)
            .bind(error_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn by_session(
        &self,
        session_id: Uuid,
        limit: u32,
    ) -> Result<Vec<VisitRecord>, RepoError> {
        let limit = limit.clamp(1, 500);
        let rows = sqlx::query_as::<_, VisitRow>(
            "SELECT id, session_id, path, method, route_id, error_id, referer, created_at \
             FROM visits WHERE session_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(session_id)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(VisitRecord::from).collect())
    }
}

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{ErrorsRepo, NewError, RepoError},
    domain::entities::ErrorRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ErrorRow {
    id: Uuid,
    code: String,
    message: String,
    created_at: OffsetDateTime,
}

impl From<ErrorRow> for ErrorRecord {
    fn from(row: ErrorRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ErrorsRepo for PostgresRepositories {
    async fn find_or_create(&self, params: NewError) -> Result<ErrorRecord, RepoError> {
        let inserted = sqlx::query_as::<_, ErrorRow>(
            "INSERT INTO errors (id, code, message, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (code, message) DO NOTHING \
             RETURNING id, code, message, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(&params.code)
        .bind(&params.message)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = inserted {
            return Ok(row.into());
        }

        sqlx::query_as::<_, ErrorRow>(
            "SELECT id, code, message, created_at FROM errors WHERE code = $1 AND message = $2",
        )
        .bind(&params.code)
        .bind(&params.message)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
        .map(Into::into)
    }
}

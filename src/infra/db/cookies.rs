use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{CookiesRepo, NewCookie, RepoError},
    domain::entities::CookieRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CookieRow {
    id: Uuid,
    cookie: Uuid,
    created_at: OffsetDateTime,
}

impl From<CookieRow> for CookieRecord {
    fn from(row: CookieRow) -> Self {
        Self {
            id: row.id,
            cookie: row.cookie,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CookiesRepo for PostgresRepositories {
    async fn find_or_create(&self, params: NewCookie) -> Result<CookieRecord, RepoError> {
        let inserted = sqlx::query_as::<_, CookieRow>(
            "INSERT INTO cookies (id, cookie, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT (cookie) DO NOTHING \
             RETURNING id, cookie, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(params.cookie)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = inserted {
            return Ok(row.into());
        }

        sqlx::query_as::<_, CookieRow>(
            "SELECT id, cookie, created_at FROM cookies WHERE cookie = $1",
        )
        .bind(params.cookie)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
        .map(Into::into)
    }
}

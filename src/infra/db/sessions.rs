use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{NewSession, RepoError, SessionsRepo},
    domain::entities::SessionRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    visitor_uuid: Uuid,
    device_id: Option<Uuid>,
    agent_id: Option<Uuid>,
    cookie_id: Option<Uuid>,
    client_ip: Option<String>,
    country: Option<String>,
    is_robot: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            visitor_uuid: row.visitor_uuid,
            device_id: row.device_id,
            agent_id: row.agent_id,
            cookie_id: row.cookie_id,
            client_ip: row.client_ip,
            country: row.country,
            is_robot: row.is_robot,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl SessionsRepo for PostgresRepositories {
    async fn find_or_create(&self, params: NewSession) -> Result<SessionRecord, RepoError> {
        let now = OffsetDateTime::now_utc();

        // Finding the session doubles as the activity touch.
        let refreshed = sqlx::query_as::<_, SessionRow>(
            "UPDATE sessions SET updated_at = $2 WHERE visitor_uuid = $1 \
             RETURNING id, visitor_uuid, device_id, agent_id, cookie_id, client_ip, country, \
                       is_robot, created_at, updated_at",
        )
        .bind(params.visitor_uuid)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = refreshed {
            return Ok(row.into());
        }

        let inserted = sqlx::query_as::<_, SessionRow>(
            "INSERT INTO sessions \
                 (id, visitor_uuid, device_id, agent_id, cookie_id, client_ip, country, \
                  is_robot, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9) \
             ON CONFLICT (visitor_uuid) DO NOTHING \
             RETURNING id, visitor_uuid, device_id, agent_id, cookie_id, client_ip, country, \
                       is_robot, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(params.visitor_uuid)
        .bind(params.device_id)
        .bind(params.agent_id)
        .bind(params.cookie_id)
        .bind(&params.client_ip)
        .bind(&params.country)
        .bind(params.is_robot)
        .bind(now)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = inserted {
            return Ok(row.into());
        }

        // Lost the insert race; the visitor's session exists now.
        sqlx::query_as::<_, SessionRow>(
            "SELECT id, visitor_uuid, device_id, agent_id, cookie_id, client_ip, country, \
                    is_robot, created_at, updated_at \
             FROM sessions WHERE visitor_uuid = $1",
        )
        .bind(params.visitor_uuid)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
        .map(Into::into)
    }
}

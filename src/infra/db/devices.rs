use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{DevicesRepo, NewDevice, RepoError},
    domain::entities::DeviceRecord,
    domain::types::DeviceKind,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct DeviceRow {
    id: Uuid,
    kind: DeviceKind,
    model: String,
    platform: String,
    platform_version: String,
    is_mobile: bool,
    created_at: OffsetDateTime,
}

impl From<DeviceRow> for DeviceRecord {
    fn from(row: DeviceRow) -> Self {
        Self {
            id: row.id,
            kind: row.kind,
            model: row.model,
            platform: row.platform,
            platform_version: row.platform_version,
            is_mobile: row.is_mobile,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl DevicesRepo for PostgresRepositories {
    async fn find_or_create(&self, params: NewDevice) -> Result<DeviceRecord, RepoError> {
        let existing = sqlx::query_as::<_, DeviceRow>(
            "SELECT id, kind, model, platform, platform_version, is_mobile, created_at \
             FROM devices \
             WHERE kind = $1 AND model = $2 AND platform = $3 AND platform_version = $4 \
               AND is_mobile = $5",
        )
        .bind(params.kind)
        .bind(&params.model)
        .bind(&params.platform)
        .bind(&params.platform_version)
        .bind(params.is_mobile)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = existing {
            return Ok(row.into());
        }

        let inserted = sqlx::query_as::<_, DeviceRow>(
            "INSERT INTO devices (id, kind, model, platform, platform_version, is_mobile, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (kind, model, platform, platform_version, is_mobile) DO NOTHING \
             RETURNING id, kind, model, platform, platform_version, is_mobile, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(params.kind)
        .bind(&params.model)
        .bind(&params.platform)
        .bind(&params.platform_version)
        .bind(params.is_mobile)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = inserted {
            return Ok(row.into());
        }

        // Lost the insert race; re-read the winner's row.
        sqlx::query_as::<_, DeviceRow>(
            "SELECT id, kind, model, platform, platform_version, is_mobile, created_at \
             FROM devices \
             WHERE kind = $1 AND model = $2 AND platform = $3 AND platform_version = $4 \
               AND is_mobile = $5",
        )
        .bind(params.kind)
        .bind(&params.model)
        .bind(&params.platform)
        .bind(&params.platform_version)
        .bind(params.is_mobile)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
        .map(Into::into)
    }
}

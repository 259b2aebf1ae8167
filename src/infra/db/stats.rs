use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;

use crate::{
    application::repos::{CountryViews, ErrorSummary, PageViewBucket, RepoError, VisitStatsRepo},
    domain::entities::VisitRecord,
};

use super::visits::VisitRow;
use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PageViewRow {
    minute: OffsetDateTime,
    views: i64,
}

#[derive(sqlx::FromRow)]
struct CountryViewRow {
    country: Option<String>,
    views: i64,
}

#[derive(sqlx::FromRow)]
struct ErrorSummaryRow {
    code: String,
    message: String,
    occurrences: i64,
}

#[async_trait]
impl VisitStatsRepo for PostgresRepositories {
    async fn page_views(&self, minutes: u32) -> Result<Vec<PageViewBucket>, RepoError> {
        let rows = sqlx::query_as::<_, PageViewRow>(
            "SELECT date_trunc('minute', created_at) AS minute, COUNT(*) AS views \
             FROM visits \
             WHERE created_at >= now() - ($1 * interval '1 minute') \
             GROUP BY 1 ORDER BY 1",
        )
        .bind(f64::from(minutes))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(PageViewBucket {
                    minute: row.minute,
                    views: Self::convert_count(row.views)?,
                })
            })
            .collect()
    }

    async fn page_views_by_country(&self, minutes: u32) -> Result<Vec<CountryViews>, RepoError> {
        let rows = sqlx::query_as::<_, CountryViewRow>(
            "SELECT s.country AS country, COUNT(*) AS views \
             FROM visits v INNER JOIN sessions s ON s.id = v.session_id \
             WHERE v.created_at >= now() - ($1 * interval '1 minute') \
             GROUP BY s.country ORDER BY views DESC",
        )
        .bind(f64::from(minutes))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(CountryViews {
                    country: row.country,
                    views: Self::convert_count(row.views)?,
                })
            })
            .collect()
    }

    async fn error_summary(&self, minutes: u32) -> Result<Vec<ErrorSummary>, RepoError> {
        let rows = sqlx::query_as::<_, ErrorSummaryRow>(
            "SELECT e.code AS code, e.message AS message, COUNT(*) AS occurrences \
             FROM visits v INNER JOIN errors e ON e.id = v.error_id \
             WHERE v.created_at >= now() - ($1 * interval '1 minute') \
             GROUP BY e.code, e.message ORDER BY occurrences DESC",
        )
        .bind(f64::from(minutes))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(ErrorSummary {
                    code: row.code,
                    message: row.message,
                    occurrences: Self::convert_count(row.occurrences)?,
                })
            })
            .collect()
    }

    async fn by_route_name(
        &self,
        name: &str,
        minutes: Option<u32>,
    ) -> Result<Vec<VisitRecord>, RepoError> {
        let mut qb = QueryBuilder::new(
            "SELECT v.id, v.session_id, v.path, v.method, v.route_id, v.error_id, v.referer, \
                    v.created_at \
             FROM visits v INNER JOIN routes r ON r.id = v.route_id \
             WHERE r.name = ",
        );
        qb.push_bind(name);

        if let Some(minutes) = minutes {
            qb.push(" AND v.created_at >= now() - (");
            qb.push_bind(f64::from(minutes));
            qb.push(" * interval '1 minute')");
        }

        qb.push(" ORDER BY v.created_at DESC, v.id DESC");

        let rows = qb
            .build_query_as::<VisitRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(VisitRecord::from).collect())
    }
}

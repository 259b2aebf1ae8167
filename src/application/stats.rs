//! Read-side aggregate queries.
//!
//! Thin service over [`VisitStatsRepo`]; results come straight from the
//! authoritative store and bypass the deduplication cache entirely.

use std::sync::Arc;

use crate::domain::entities::VisitRecord;

use super::repos::{CountryViews, ErrorSummary, PageViewBucket, RepoError, VisitStatsRepo};

pub struct StatsService {
    stats: Arc<dyn VisitStatsRepo>,
}

impl StatsService {
    pub fn new(stats: Arc<dyn VisitStatsRepo>) -> Self {
        Self { stats }
    }

    /// Page views per minute over the trailing window.
    pub async fn page_views(&self, minutes: u32) -> Result<Vec<PageViewBucket>, RepoError> {
        self.validate_window(minutes)?;
        self.stats.page_views(minutes).await
    }

    /// Page views over the trailing window, grouped by visitor country.
    pub async fn page_views_by_country(
        &self,
        minutes: u32,
    ) -> Result<Vec<CountryViews>, RepoError> {
        self.validate_window(minutes)?;
        self.stats.page_views_by_country(minutes).await
    }

    /// Errors captured within the trailing window, grouped by code and
    /// message.
    pub async fn error_summary(&self, minutes: u32) -> Result<Vec<ErrorSummary>, RepoError> {
        self.validate_window(minutes)?;
        self.stats.error_summary(minutes).await
    }

    /// Visits attributed to the named route, newest first, optionally
    /// limited to a trailing window.
    pub async fn by_route_name(
        &self,
        name: &str,
        minutes: Option<u32>,
    ) -> Result<Vec<VisitRecord>, RepoError> {
        if let Some(minutes) = minutes {
            self.validate_window(minutes)?;
        }
        self.stats.by_route_name(name, minutes).await
    }

    fn validate_window(&self, minutes: u32) -> Result<(), RepoError> {
        if minutes == 0 {
            return Err(RepoError::InvalidInput {
                message: "window must cover at least one minute".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct EmptyStats;

    #[async_trait]
    impl VisitStatsRepo for EmptyStats {
        async fn page_views(&self, _minutes: u32) -> Result<Vec<PageViewBucket>, RepoError> {
            Ok(Vec::new())
        }

        async fn page_views_by_country(
            &self,
            _minutes: u32,
        ) -> Result<Vec<CountryViews>, RepoError> {
            Ok(Vec::new())
        }

        async fn error_summary(&self, _minutes: u32) -> Result<Vec<ErrorSummary>, RepoError> {
            Ok(Vec::new())
        }

        async fn by_route_name(
            &self,
            _name: &str,
            _minutes: Option<u32>,
        ) -> Result<Vec<VisitRecord>, RepoError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn zero_minute_window_is_rejected() {
        let service = StatsService::new(Arc::new(EmptyStats));
        assert!(matches!(
            service.page_views(0).await,
            Err(RepoError::InvalidInput { .. })
        ));
        assert!(matches!(
            service.error_summary(0).await,
            Err(RepoError::InvalidInput { .. })
        ));
        assert!(matches!(
            service.by_route_name("home", Some(0)).await,
            Err(RepoError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn unwindowed_route_listing_passes_through() {
        let service = StatsService::new(Arc::new(EmptyStats));
        let visits = service
            .by_route_name("home", None)
            .await
            .expect("listing succeeds");
        assert!(visits.is_empty());
    }
}

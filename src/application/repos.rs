//! Repository traits describing persistence adapters.
//!
//! These are the interface boundary to the authoritative record store. The
//! deduplication cache never talks to them directly; the capture service
//! sits between the two, treating a cache hit as "skip the store" and a
//! miss as "consult the store, then populate the cache".

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{
    AgentRecord, CookieRecord, DeviceRecord, ErrorRecord, RouteRecord, SessionRecord, VisitRecord,
};
use crate::domain::types::DeviceKind;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub visitor_uuid: Uuid,
    pub device_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub cookie_id: Option<Uuid>,
    pub client_ip: Option<String>,
    pub country: Option<String>,
    pub is_robot: bool,
}

#[derive(Debug, Clone)]
pub struct NewDevice {
    pub kind: DeviceKind,
    pub model: String,
    pub platform: String,
    pub platform_version: String,
    pub is_mobile: bool,
}

#[derive(Debug, Clone)]
pub struct NewAgent {
    pub name: String,
    pub browser: String,
    pub browser_version: String,
}

#[derive(Debug, Clone)]
pub struct NewCookie {
    pub cookie: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct NewRoute {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct NewVisit {
    pub session_id: Uuid,
    pub path: String,
    pub method: String,
    pub route_id: Option<Uuid>,
    pub error_id: Option<Uuid>,
    pub referer: Option<String>,
}

/// Page views bucketed per minute.
#[derive(Debug, Clone, PartialEq)]
pub struct PageViewBucket {
    pub minute: OffsetDateTime,
    pub views: u64,
}

/// Page views grouped by the session's visitor country.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryViews {
    pub country: Option<String>,
    pub views: u64,
}

/// Occurrences of one error within the queried window.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorSummary {
    pub code: String,
    pub message: String,
    pub occurrences: u64,
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    /// Find the session for this visitor, refreshing `updated_at`, or create
    /// it.
    async fn find_or_create(&self, params: NewSession) -> Result<SessionRecord, RepoError>;
}

#[async_trait]
pub trait DevicesRepo: Send + Sync {
    async fn find_or_create(&self, params: NewDevice) -> Result<DeviceRecord, RepoError>;
}

#[async_trait]
pub trait AgentsRepo: Send + Sync {
    async fn find_or_create(&self, params: NewAgent) -> Result<AgentRecord, RepoError>;
}

#[async_trait]
pub trait CookiesRepo: Send + Sync {
    async fn find_or_create(&self, params: NewCookie) -> Result<CookieRecord, RepoError>;
}

#[async_trait]
pub trait ErrorsRepo: Send + Sync {
    async fn find_or_create(&self, params: NewError) -> Result<ErrorRecord, RepoError>;
}

#[async_trait]
pub trait RoutesRepo: Send + Sync {
    async fn find_or_create(&self, params: NewRoute) -> Result<RouteRecord, RepoError>;
}

#[async_trait]
pub trait VisitsRepo: Send + Sync {
    async fn create(&self, params: NewVisit) -> Result<VisitRecord, RepoError>;

    /// Attach a resolved route to an already-recorded visit.
    async fn attach_route(&self, visit_id: Uuid, route_id: Uuid) -> Result<(), RepoError>;

    /// Attach a captured error to an already-recorded visit.
    async fn attach_error(&self, visit_id: Uuid, error_id: Uuid) -> Result<(), RepoError>;

    async fn by_session(
        &self,
        session_id: Uuid,
        limit: u32,
    ) -> Result<Vec<VisitRecord>, RepoError>;
}

/// Read-only aggregate queries over recorded visits.
///
/// These operate directly against the persistent store and are unaffected
/// by the deduplication cache.
#[async_trait]
pub trait VisitStatsRepo: Send + Sync {
    async fn page_views(&self, minutes: u32) -> Result<Vec<PageViewBucket>, RepoError>;

    async fn page_views_by_country(&self, minutes: u32) -> Result<Vec<CountryViews>, RepoError>;

    async fn error_summary(&self, minutes: u32) -> Result<Vec<ErrorSummary>, RepoError>;

    async fn by_route_name(
        &self,
        name: &str,
        minutes: Option<u32>,
    ) -> Result<Vec<VisitRecord>, RepoError>;
}

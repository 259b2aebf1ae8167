//! Capture service: the write path between the host request layer and
//! storage.
//!
//! Each `resolve_*` call runs the deduplication flow for one entity kind:
//! look the identity up in the cache, and on a miss ask the repository to
//! find-or-create the authoritative record before writing it through at the
//! fingerprint the lookup already produced. Concurrent misses for the same
//! identity may each create-or-find against the store; the short TTL makes
//! that redundancy cheap, and the store's uniqueness constraints keep it
//! harmless.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::cache::{AttributeMap, AttributeSource, DedupCache};
use crate::domain::entities::{
    AgentRecord, CookieRecord, DeviceRecord, ErrorRecord, RouteRecord, SessionRecord, VisitRecord,
};
use crate::domain::error::DomainError;

use super::repos::{
    AgentsRepo, CookiesRepo, DevicesRepo, ErrorsRepo, NewAgent, NewCookie, NewDevice, NewError,
    NewRoute, NewSession, NewVisit, RepoError, RoutesRepo, SessionsRepo, VisitsRepo,
};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Repository handles consumed by the capture service.
#[derive(Clone)]
pub struct CaptureRepos {
    pub sessions: Arc<dyn SessionsRepo>,
    pub devices: Arc<dyn DevicesRepo>,
    pub agents: Arc<dyn AgentsRepo>,
    pub cookies: Arc<dyn CookiesRepo>,
    pub errors: Arc<dyn ErrorsRepo>,
    pub routes: Arc<dyn RoutesRepo>,
    pub visits: Arc<dyn VisitsRepo>,
}

pub struct CaptureService {
    cache: Arc<DedupCache>,
    sessions: Arc<dyn SessionsRepo>,
    devices: Arc<dyn DevicesRepo>,
    agents: Arc<dyn AgentsRepo>,
    cookies: Arc<dyn CookiesRepo>,
    errors: Arc<dyn ErrorsRepo>,
    routes: Arc<dyn RoutesRepo>,
    visits: Arc<dyn VisitsRepo>,
}

impl CaptureService {
    pub fn new(cache: Arc<DedupCache>, repos: CaptureRepos) -> Self {
        Self {
            cache,
            sessions: repos.sessions,
            devices: repos.devices,
            agents: repos.agents,
            cookies: repos.cookies,
            errors: repos.errors,
            routes: repos.routes,
            visits: repos.visits,
        }
    }

    pub async fn resolve_session(
        &self,
        params: NewSession,
    ) -> Result<SessionRecord, CaptureError> {
        let (cached, key) = self
            .cache
            .lookup::<SessionRecord>(
                AttributeSource::Mapping(session_attributes(&params)),
                SessionRecord::IDENTITY,
                SessionRecord::CACHE_TYPE,
            )
            .await;
        if let Some(session) = cached {
            return Ok(session);
        }

        let session = self.sessions.find_or_create(params).await?;
        debug!(session_id = %session.id, visitor = %session.visitor_uuid, "Resolved session");
        self.cache.store_at_key(&session, &key).await;
        Ok(session)
    }

    pub async fn resolve_device(&self, params: NewDevice) -> Result<DeviceRecord, CaptureError> {
        let (cached, key) = self
            .cache
            .lookup::<DeviceRecord>(
                AttributeSource::Mapping(device_attributes(&params)),
                DeviceRecord::IDENTITY,
                DeviceRecord::CACHE_TYPE,
            )
            .await;
        if let Some(device) = cached {
            return Ok(device);
        }

        let device = self.devices.find_or_create(params).await?;
        self.cache.store_at_key(&device, &key).await;
        Ok(device)
    }

    pub async fn resolve_agent(&self, params: NewAgent) -> Result<AgentRecord, CaptureError> {
        let (cached, key) = self
            .cache
            .lookup::<AgentRecord>(
                AttributeSource::Mapping(agent_attributes(&params)),
                AgentRecord::IDENTITY,
                AgentRecord::CACHE_TYPE,
            )
            .await;
        if let Some(agent) = cached {
            return Ok(agent);
        }

        let agent = self.agents.find_or_create(params).await?;
        self.cache.store_at_key(&agent, &key).await;
        Ok(agent)
    }

    pub async fn resolve_cookie(&self, params: NewCookie) -> Result<CookieRecord, CaptureError> {
        let (cached, key) = self
            .cache
            .lookup::<CookieRecord>(
                AttributeSource::Mapping(cookie_attributes(&params)),
                CookieRecord::IDENTITY,
                CookieRecord::CACHE_TYPE,
            )
            .await;
        if let Some(cookie) = cached {
            return Ok(cookie);
        }

        let cookie = self.cookies.find_or_create(params).await?;
        self.cache.store_at_key(&cookie, &key).await;
        Ok(cookie)
    }

    pub async fn resolve_error(&self, params: NewError) -> Result<ErrorRecord, CaptureError> {
        let (cached, key) = self
            .cache
            .lookup::<ErrorRecord>(
                AttributeSource::Mapping(error_attributes(&params)),
                ErrorRecord::IDENTITY,
                ErrorRecord::CACHE_TYPE,
            )
            .await;
        if let Some(error) = cached {
            return Ok(error);
        }

        let error = self.errors.find_or_create(params).await?;
        self.cache.store_at_key(&error, &key).await;
        Ok(error)
    }

    pub async fn resolve_route(&self, params: NewRoute) -> Result<RouteRecord, CaptureError> {
        let (cached, key) = self
            .cache
            .lookup::<RouteRecord>(
                AttributeSource::Mapping(route_attributes(&params)),
                RouteRecord::IDENTITY,
                RouteRecord::CACHE_TYPE,
            )
            .await;
        if let Some(route) = cached {
            return Ok(route);
        }

        let route = self.routes.find_or_create(params).await?;
        self.cache.store_at_key(&route, &key).await;
        Ok(route)
    }

    /// Record one page access. Visits are per-hit and never deduplicated.
    ///
    /// The returned record carries the visit id; callers that later resolve
    /// a route or capture an error pass that id to [`attach_route`] /
    /// [`attach_error`] explicitly.
    ///
    /// [`attach_route`]: Self::attach_route
    /// [`attach_error`]: Self::attach_error
    pub async fn record_visit(&self, params: NewVisit) -> Result<VisitRecord, CaptureError> {
        if params.path.is_empty() {
            return Err(DomainError::validation("visit path must not be empty").into());
        }
        if params.method.is_empty() {
            return Err(DomainError::validation("visit method must not be empty").into());
        }
        Ok(self.visits.create(params).await?)
    }

    pub async fn attach_route(&self, visit_id: Uuid, route_id: Uuid) -> Result<(), CaptureError> {
        Ok(self.visits.attach_route(visit_id, route_id).await?)
    }

    pub async fn attach_error(&self, visit_id: Uuid, error_id: Uuid) -> Result<(), CaptureError> {
        Ok(self.visits.attach_error(visit_id, error_id).await?)
    }

    pub async fn visits_for_session(
        &self,
        session_id: Uuid,
        limit: u32,
    ) -> Result<Vec<VisitRecord>, CaptureError> {
        Ok(self.visits.by_session(session_id, limit).await?)
    }
}

// Attribute mappings mirror the params structs so that a lookup for a
// not-yet-persisted record lands on the same fingerprint as the cached
// record's own identity. Attribute order matches each record's identity key
// order.

fn session_attributes(params: &NewSession) -> AttributeMap {
    let mut attrs = AttributeMap::new();
    attrs.insert("visitor_uuid", params.visitor_uuid);
    if let Some(client_ip) = &params.client_ip {
        attrs.insert("client_ip", client_ip.clone());
    }
    if let Some(country) = &params.country {
        attrs.insert("country", country.clone());
    }
    attrs.insert("is_robot", params.is_robot);
    attrs
}

fn device_attributes(params: &NewDevice) -> AttributeMap {
    let mut attrs = AttributeMap::new();
    attrs.insert("kind", params.kind.as_str());
    attrs.insert("model", params.model.clone());
    attrs.insert("platform", params.platform.clone());
    attrs.insert("platform_version", params.platform_version.clone());
    attrs.insert("is_mobile", params.is_mobile);
    attrs
}

fn agent_attributes(params: &NewAgent) -> AttributeMap {
    let mut attrs = AttributeMap::new();
    attrs.insert("name", params.name.clone());
    attrs.insert("browser", params.browser.clone());
    attrs.insert("browser_version", params.browser_version.clone());
    attrs
}

fn cookie_attributes(params: &NewCookie) -> AttributeMap {
    let mut attrs = AttributeMap::new();
    attrs.insert("cookie", params.cookie);
    attrs
}

fn error_attributes(params: &NewError) -> AttributeMap {
    let mut attrs = AttributeMap::new();
    attrs.insert("code", params.code.clone());
    attrs.insert("message", params.message.clone());
    attrs
}

fn route_attributes(params: &NewRoute) -> AttributeMap {
    let mut attrs = AttributeMap::new();
    attrs.insert("name", params.name.clone());
    attrs.insert("path", params.path.clone());
    attrs
}

//! Capture service flow tests against in-memory repository stubs.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use orma::application::capture::{CaptureError, CaptureRepos, CaptureService};
use orma::application::repos::{
    AgentsRepo, CookiesRepo, DevicesRepo, ErrorsRepo, NewAgent, NewCookie, NewDevice, NewError,
    NewRoute, NewSession, NewVisit, RepoError, RoutesRepo, SessionsRepo, VisitsRepo,
};
use orma::cache::{CacheConfig, CacheStore, DedupCache, Fingerprint, MemoryStore, StoreError};
use orma::domain::entities::{
    AgentRecord, CookieRecord, DeviceRecord, ErrorRecord, RouteRecord, SessionRecord, VisitRecord,
};
use orma::domain::error::DomainError;

/// Counts authoritative-store round trips per entity kind.
#[derive(Default)]
struct StubRepos {
    sessions: AtomicUsize,
    devices: AtomicUsize,
    agents: AtomicUsize,
    cookies: AtomicUsize,
    errors: AtomicUsize,
    routes: AtomicUsize,
    visits: AtomicUsize,
}

#[async_trait]
impl SessionsRepo for StubRepos {
    async fn find_or_create(&self, params: NewSession) -> Result<SessionRecord, RepoError> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        let now = OffsetDateTime::now_utc();
        Ok(SessionRecord {
            id: Uuid::new_v4(),
            visitor_uuid: params.visitor_uuid,
            device_id: params.device_id,
            agent_id: params.agent_id,
            cookie_id: params.cookie_id,
            client_ip: params.client_ip,
            country: params.country,
            is_robot: params.is_robot,
            created_at: now,
            updated_at: now,
        })
    }
}

#[async_trait]
impl DevicesRepo for StubRepos {
    async fn find_or_create(&self, params: NewDevice) -> Result<DeviceRecord, RepoError> {
        self.devices.fetch_add(1, Ordering::SeqCst);
        Ok(DeviceRecord {
            id: Uuid::new_v4(),
            kind: params.kind,
            model: params.model,
            platform: params.platform,
            platform_version: params.platform_version,
            is_mobile: params.is_mobile,
            created_at: OffsetDateTime::now_utc(),
        })
    }
}

#[async_trait]
impl AgentsRepo for StubRepos {
    async fn find_or_create(&self, params: NewAgent) -> Result<AgentRecord, RepoError> {
        self.agents.fetch_add(1, Ordering::SeqCst);
        Ok(AgentRecord {
            id: Uuid::new_v4(),
            name: params.name,
            browser: params.browser,
            browser_version: params.browser_version,
            created_at: OffsetDateTime::now_utc(),
        })
    }
}

#[async_trait]
impl CookiesRepo for StubRepos {
    async fn find_or_create(&self, params: NewCookie) -> Result<CookieRecord, RepoError> {
        self.cookies.fetch_add(1, Ordering::SeqCst);
        Ok(CookieRecord {
            id: Uuid::new_v4(),
            cookie: params.cookie,
            created_at: OffsetDateTime::now_utc(),
        })
    }
}

#[async_trait]
impl ErrorsRepo for StubRepos {
    async fn find_or_create(&self, params: NewError) -> Result<ErrorRecord, RepoError> {
        self.errors.fetch_add(1, Ordering::SeqCst);
        Ok(ErrorRecord {
            id: Uuid::new_v4(),
            code: params.code,
            message: params.message,
            created_at: OffsetDateTime::now_utc(),
        })
    }
}

#[async_trait]
impl RoutesRepo for StubRepos {
    async fn find_or_create(&self, params: NewRoute) -> Result<RouteRecord, RepoError> {
        self.routes.fetch_add(1, Ordering::SeqCst);
        Ok(RouteRecord {
            id: Uuid::new_v4(),
            name: params.name,
            path: params.path,
            created_at: OffsetDateTime::now_utc(),
        })
    }
}

#[async_trait]
impl VisitsRepo for StubRepos {
    async fn create(&self, params: NewVisit) -> Result<VisitRecord, RepoError> {
        self.visits.fetch_add(1, Ordering::SeqCst);
        Ok(VisitRecord {
            id: Uuid::new_v4(),
            session_id: params.session_id,
            path: params.path,
            method: params.method,
            route_id: params.route_id,
            error_id: params.error_id,
            referer: params.referer,
            created_at: OffsetDateTime::now_utc(),
        })
    }

    async fn attach_route(&self, _visit_id: Uuid, _route_id: Uuid) -> Result<(), RepoError> {
        Ok(())
    }

    async fn attach_error(&self, _visit_id: Uuid, _error_id: Uuid) -> Result<(), RepoError> {
        Ok(())
    }

    async fn by_session(
        &self,
        _session_id: Uuid,
        _limit: u32,
    ) -> Result<Vec<VisitRecord>, RepoError> {
        Ok(Vec::new())
    }
}

fn service_with_store(
    repos: Arc<StubRepos>,
    store: Arc<dyn CacheStore>,
) -> CaptureService {
    let cache = Arc::new(DedupCache::new(store, &CacheConfig::default()));
    CaptureService::new(
        cache,
        CaptureRepos {
            sessions: repos.clone(),
            devices: repos.clone(),
            agents: repos.clone(),
            cookies: repos.clone(),
            errors: repos.clone(),
            routes: repos.clone(),
            visits: repos,
        },
    )
}

fn service(repos: Arc<StubRepos>) -> CaptureService {
    service_with_store(repos, Arc::new(MemoryStore::new(1024)))
}

fn sample_device() -> NewDevice {
    NewDevice {
        kind: orma::domain::types::DeviceKind::Phone,
        model: "Pixel 9".to_string(),
        platform: "Android".to_string(),
        platform_version: "15".to_string(),
        is_mobile: true,
    }
}

#[tokio::test]
async fn repeated_device_resolution_hits_the_cache() {
    let repos = Arc::new(StubRepos::default());
    let service = service(repos.clone());

    let first = service
        .resolve_device(sample_device())
        .await
        .expect("first resolution");
    let second = service
        .resolve_device(sample_device())
        .await
        .expect("second resolution");

    assert_eq!(first, second);
    assert_eq!(repos.devices.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn distinct_identities_each_reach_the_store() {
    let repos = Arc::new(StubRepos::default());
    let service = service(repos.clone());

    service
        .resolve_device(sample_device())
        .await
        .expect("phone resolution");

    let mut tablet = sample_device();
    tablet.kind = orma::domain::types::DeviceKind::Tablet;
    tablet.is_mobile = false;
    service
        .resolve_device(tablet)
        .await
        .expect("tablet resolution");

    assert_eq!(repos.devices.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn session_resolution_is_deduplicated_per_visitor() {
    let repos = Arc::new(StubRepos::default());
    let service = service(repos.clone());
    let visitor = Uuid::new_v4();

    let params = NewSession {
        visitor_uuid: visitor,
        device_id: None,
        agent_id: None,
        cookie_id: None,
        client_ip: Some("203.0.113.7".to_string()),
        country: Some("IT".to_string()),
        is_robot: false,
    };

    let first = service
        .resolve_session(params.clone())
        .await
        .expect("first resolution");
    let second = service
        .resolve_session(params)
        .await
        .expect("second resolution");

    assert_eq!(first.id, second.id);
    assert_eq!(repos.sessions.load(Ordering::SeqCst), 1);
}

struct FailingStore;

#[async_trait]
impl CacheStore for FailingStore {
    async fn get(&self, _key: &Fingerprint) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn put(
        &self,
        _key: &Fingerprint,
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> Result<(), StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }
}

#[tokio::test]
async fn capture_survives_a_dead_cache_backend() {
    let repos = Arc::new(StubRepos::default());
    let service = service_with_store(repos.clone(), Arc::new(FailingStore));

    // Every resolution reaches the store, but none of them fails.
    for _ in 0..3 {
        service
            .resolve_device(sample_device())
            .await
            .expect("resolution with dead cache");
    }
    assert_eq!(repos.devices.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn record_visit_validates_input() {
    let repos = Arc::new(StubRepos::default());
    let service = service(repos.clone());

    let result = service
        .record_visit(NewVisit {
            session_id: Uuid::new_v4(),
            path: String::new(),
            method: "GET".to_string(),
            route_id: None,
            error_id: None,
            referer: None,
        })
        .await;

    assert!(matches!(
        result,
        Err(CaptureError::Domain(DomainError::Validation { .. }))
    ));
    assert_eq!(repos.visits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn record_visit_returns_the_id_for_later_attachment() {
    let repos = Arc::new(StubRepos::default());
    let service = service(repos.clone());
    let session_id = Uuid::new_v4();

    let visit = service
        .record_visit(NewVisit {
            session_id,
            path: "/home".to_string(),
            method: "GET".to_string(),
            route_id: None,
            error_id: None,
            referer: None,
        })
        .await
        .expect("visit recorded");
    assert_eq!(visit.session_id, session_id);

    let route = service
        .resolve_route(NewRoute {
            name: "home".to_string(),
            path: "/home".to_string(),
        })
        .await
        .expect("route resolved");

    service
        .attach_route(visit.id, route.id)
        .await
        .expect("route attached");
}

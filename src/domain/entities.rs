//! Domain records mirrored from persistent storage.
//!
//! Records round-trip through the deduplication cache, so they carry both
//! `Serialize` and `Deserialize`. Each cacheable record implements
//! [`CacheIdentity`], naming the attribute subset that makes two
//! partially-known records "the same" for caching purposes.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::cache::{AttributeMap, CacheIdentity};
use crate::domain::types::DeviceKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    /// Long-lived visitor identifier minted by the host application.
    pub visitor_uuid: Uuid,
    pub device_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub cookie_id: Option<Uuid>,
    pub client_ip: Option<String>,
    pub country: Option<String>,
    pub is_robot: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl SessionRecord {
    pub const CACHE_TYPE: &'static str = "session";
    pub const IDENTITY: &'static [&'static str] = &["visitor_uuid"];
}

impl CacheIdentity for SessionRecord {
    fn cache_type(&self) -> &'static str {
        Self::CACHE_TYPE
    }

    fn identity_keys(&self) -> &'static [&'static str] {
        Self::IDENTITY
    }

    fn cache_attributes(&self) -> AttributeMap {
        let mut attrs = AttributeMap::new();
        attrs.insert("id", self.id);
        attrs.insert("visitor_uuid", self.visitor_uuid);
        if let Some(client_ip) = &self.client_ip {
            attrs.insert("client_ip", client_ip.clone());
        }
        if let Some(country) = &self.country {
            attrs.insert("country", country.clone());
        }
        attrs.insert("is_robot", self.is_robot);
        attrs
    }
}

/// A single page access within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub path: String,
    pub method: String,
    pub route_id: Option<Uuid>,
    pub error_id: Option<Uuid>,
    pub referer: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: Uuid,
    pub kind: DeviceKind,
    pub model: String,
    pub platform: String,
    pub platform_version: String,
    pub is_mobile: bool,
    pub created_at: OffsetDateTime,
}

impl DeviceRecord {
    pub const CACHE_TYPE: &'static str = "device";
    pub const IDENTITY: &'static [&'static str] =
        &["kind", "model", "platform", "platform_version", "is_mobile"];
}

impl CacheIdentity for DeviceRecord {
    fn cache_type(&self) -> &'static str {
        Self::CACHE_TYPE
    }

    fn identity_keys(&self) -> &'static [&'static str] {
        Self::IDENTITY
    }

    fn cache_attributes(&self) -> AttributeMap {
        let mut attrs = AttributeMap::new();
        attrs.insert("id", self.id);
        attrs.insert("kind", self.kind.as_str());
        attrs.insert("model", self.model.clone());
        attrs.insert("platform", self.platform.clone());
        attrs.insert("platform_version", self.platform_version.clone());
        attrs.insert("is_mobile", self.is_mobile);
        attrs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: Uuid,
    /// Full user-agent string as received.
    pub name: String,
    pub browser: String,
    pub browser_version: String,
    pub created_at: OffsetDateTime,
}

impl AgentRecord {
    pub const CACHE_TYPE: &'static str = "agent";
    pub const IDENTITY: &'static [&'static str] = &["name", "browser", "browser_version"];
}

impl CacheIdentity for AgentRecord {
    fn cache_type(&self) -> &'static str {
        Self::CACHE_TYPE
    }

    fn identity_keys(&self) -> &'static [&'static str] {
        Self::IDENTITY
    }

    fn cache_attributes(&self) -> AttributeMap {
        let mut attrs = AttributeMap::new();
        attrs.insert("id", self.id);
        attrs.insert("name", self.name.clone());
        attrs.insert("browser", self.browser.clone());
        attrs.insert("browser_version", self.browser_version.clone());
        attrs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub id: Uuid,
    /// Value of the tracking cookie set by the host.
    pub cookie: Uuid,
    pub created_at: OffsetDateTime,
}

impl CookieRecord {
    pub const CACHE_TYPE: &'static str = "cookie";
    pub const IDENTITY: &'static [&'static str] = &["cookie"];
}

impl CacheIdentity for CookieRecord {
    fn cache_type(&self) -> &'static str {
        Self::CACHE_TYPE
    }

    fn identity_keys(&self) -> &'static [&'static str] {
        Self::IDENTITY
    }

    fn cache_attributes(&self) -> AttributeMap {
        let mut attrs = AttributeMap::new();
        attrs.insert("id", self.id);
        attrs.insert("cookie", self.cookie);
        attrs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: Uuid,
    /// Status code or error class, e.g. `404`.
    pub code: String,
    pub message: String,
    pub created_at: OffsetDateTime,
}

impl ErrorRecord {
    pub const CACHE_TYPE: &'static str = "error";
    pub const IDENTITY: &'static [&'static str] = &["code", "message"];
}

impl CacheIdentity for ErrorRecord {
    fn cache_type(&self) -> &'static str {
        Self::CACHE_TYPE
    }

    fn identity_keys(&self) -> &'static [&'static str] {
        Self::IDENTITY
    }

    fn cache_attributes(&self) -> AttributeMap {
        let mut attrs = AttributeMap::new();
        attrs.insert("id", self.id);
        attrs.insert("code", self.code.clone());
        attrs.insert("message", self.message.clone());
        attrs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub id: Uuid,
    /// Route name as registered in the host's router.
    pub name: String,
    pub path: String,
    pub created_at: OffsetDateTime,
}

impl RouteRecord {
    pub const CACHE_TYPE: &'static str = "route";
    pub const IDENTITY: &'static [&'static str] = &["name", "path"];
}

impl CacheIdentity for RouteRecord {
    fn cache_type(&self) -> &'static str {
        Self::CACHE_TYPE
    }

    fn identity_keys(&self) -> &'static [&'static str] {
        Self::IDENTITY
    }

    fn cache_attributes(&self) -> AttributeMap {
        let mut attrs = AttributeMap::new();
        attrs.insert("id", self.id);
        attrs.insert("name", self.name.clone());
        attrs.insert("path", self.path.clone());
        attrs
    }
}

//! Value types shared across domain records.

use serde::{Deserialize, Serialize};

/// Physical device category, as classified by the host's user-agent layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "device_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Computer,
    Tablet,
    Phone,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Computer => "computer",
            Self::Tablet => "tablet",
            Self::Phone => "phone",
        }
    }
}

//! Login session model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// Per-login context handed to every handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub role: Role,
    /// Author name for users, the configured admin name for admins.
    pub name: String,
    /// Last equipment id decoded from a scanned code, cleared after a submit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanned_equipment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Login request: pick a name from the author list, or supply the admin password.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum LoginRequest {
    User { author: String },
    Admin { password: String },
}

/// Decoded text of a scanned code.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanRequest {
    pub raw: String,
}

/// Query parameters for resolving an equipment id without touching the session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EquipmentQuery {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub qr: Option<String>,
}

/// Resolved equipment id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentIdResponse {
    pub equipment_id: Option<String>,
}

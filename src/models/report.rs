//! Repair report model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of part slots on a report.
pub const MAX_PARTS: usize = 10;

/// A single repair report filed by a technician.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub id: String,
    pub author: String,
    pub equipment_id: String,
    pub issue: String,
    pub parts: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Request body for submitting a new report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    /// Only honoured for admin sessions; users always file as themselves.
    #[serde(default)]
    pub author: Option<String>,
    /// Blank means "use the scanned equipment id from the session".
    #[serde(default)]
    pub equipment_id: String,
    #[serde(default)]
    pub issue: String,
    /// Raw part slots, may contain blanks and duplicates.
    #[serde(default)]
    pub parts: Vec<String>,
}

/// A validated report ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub author: String,
    pub equipment_id: String,
    pub issue: String,
    pub parts: Vec<String>,
}

/// Request body for updating an existing report.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReportRequest {
    #[serde(default)]
    pub equipment_id: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub parts: Option<Vec<String>>,
}

/// Sort direction on `createdAt`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Query parameters for listing reports.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportListQuery {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub order: SortOrder,
}

/// Result of a delete call. Deleting a missing report is not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub id: String,
    pub deleted: bool,
}

/// Trim part slots, drop blanks and remove duplicates while keeping first-seen order.
pub fn normalize_parts(slots: &[String]) -> Vec<String> {
    let mut parts: Vec<String> = Vec::with_capacity(slots.len());
    for slot in slots {
        let part = slot.trim();
        if part.is_empty() || parts.iter().any(|p| p == part) {
            continue;
        }
        parts.push(part.to_string());
    }
    parts
}

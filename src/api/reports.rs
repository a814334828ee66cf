//! Repair report API endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};

use super::{ensure_listed, required, success, ApiResult};
use crate::cache::ReportCacheKey;
use crate::errors::AppError;
use crate::models::{
    normalize_parts, CreateReportRequest, DeleteOutcome, NewReport, OptionCategory, RepairReport,
    ReportListQuery, Session, SortOrder, UpdateReportRequest, MAX_PARTS,
};
use crate::AppState;

/// GET /api/reports - List reports, newest first by default.
///
/// Served from the report cache when a fresh entry exists.
pub async fn list_reports(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<ReportListQuery>,
) -> ApiResult<Vec<RepairReport>> {
    let author = visible_author(&session, query.author.as_deref())?;
    let cached = cached_reports(&state, &session, author).await?;
    let mut reports: Vec<RepairReport> = cached.to_vec();

    if query.order == SortOrder::Asc {
        reports.reverse();
    }
    if let Some(limit) = query.limit {
        reports.truncate(limit);
    }

    success(reports)
}

/// POST /api/reports - Submit a new report.
pub async fn create_report(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<CreateReportRequest>,
) -> ApiResult<RepairReport> {
    let author = if session.is_admin() {
        required(request.author.as_deref().unwrap_or(""), "Author")?
    } else {
        session.name.clone()
    };
    ensure_listed(&state, OptionCategory::Authors, &author).await?;

    // A blank id falls back to the last scanned code.
    let equipment_id = match request.equipment_id.trim() {
        "" => session
            .scanned_equipment_id
            .clone()
            .ok_or_else(|| AppError::Validation("Equipment ID is required".to_string()))?,
        id => id.to_string(),
    };

    let issue = checked_issue(&state, &request.issue).await?;
    let parts = checked_parts(&state, &request.parts).await?;

    let report = state
        .repo
        .create_report(&NewReport {
            author,
            equipment_id,
            issue,
            parts,
        })
        .await?;

    if session.scanned_equipment_id.is_some() {
        state
            .sessions
            .set_scanned_equipment(&session.token, None)
            .await;
    }

    tracing::info!(report_id = %report.id, author = %report.author, "Report submitted");
    success(report)
}

/// PUT /api/reports/:id - Update equipment id, issue and/or parts.
pub async fn update_report(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(request): Json<UpdateReportRequest>,
) -> ApiResult<RepairReport> {
    let existing = state
        .repo
        .get_report(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;
    ensure_owner(&session, &existing)?;

    let mut changes = UpdateReportRequest::default();
    if let Some(equipment_id) = &request.equipment_id {
        changes.equipment_id = Some(required(equipment_id, "Equipment ID")?);
    }
    if let Some(issue) = &request.issue {
        changes.issue = Some(checked_issue(&state, issue).await?);
    }
    if let Some(parts) = &request.parts {
        changes.parts = Some(checked_parts(&state, parts).await?);
    }

    let report = state.repo.update_report(&id, &changes).await?;
    tracing::info!(report_id = %id, "Report updated");
    success(report)
}

/// DELETE /api/reports/:id - Delete a report. Missing ids are not an error.
pub async fn delete_report(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> ApiResult<DeleteOutcome> {
    if let Some(existing) = state.repo.get_report(&id).await? {
        ensure_owner(&session, &existing)?;
    }

    let deleted = state.repo.delete_report(&id).await?;
    if deleted {
        tracing::info!(report_id = %id, "Report deleted");
    }
    success(DeleteOutcome { id, deleted })
}

/// Author filter a session may use: users are pinned to themselves.
pub(super) fn visible_author(
    session: &Session,
    requested: Option<&str>,
) -> Result<Option<String>, AppError> {
    let requested = requested.map(str::trim).filter(|a| !a.is_empty());
    if session.is_admin() {
        return Ok(requested.map(str::to_string));
    }
    match requested {
        Some(author) if author != session.name => Err(AppError::Forbidden(
            "Users can only view their own reports".to_string(),
        )),
        _ => Ok(Some(session.name.clone())),
    }
}

/// Newest-first listing for `author`, through the report cache.
pub(super) async fn cached_reports(
    state: &AppState,
    session: &Session,
    author: Option<String>,
) -> Result<Arc<Vec<RepairReport>>, AppError> {
    let key = ReportCacheKey {
        role: session.role,
        author,
    };
    if let Some(reports) = state.report_cache.get(&key).await {
        return Ok(reports);
    }

    let reports = Arc::new(
        state
            .repo
            .list_reports(key.author.as_deref())
            .await?,
    );
    state.report_cache.insert(key, reports.clone()).await;
    Ok(reports)
}

fn ensure_owner(session: &Session, report: &RepairReport) -> Result<(), AppError> {
    if session.is_admin() || report.author == session.name {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Users can only change their own reports".to_string(),
        ))
    }
}

async fn checked_issue(state: &AppState, issue: &str) -> Result<String, AppError> {
    let issue = required(issue, "Issue")?;
    ensure_listed(state, OptionCategory::Issues, &issue).await?;
    Ok(issue)
}

async fn checked_parts(state: &AppState, slots: &[String]) -> Result<Vec<String>, AppError> {
    let parts = normalize_parts(slots);
    if parts.len() > MAX_PARTS {
        return Err(AppError::Validation(format!(
            "At most {} parts can be recorded",
            MAX_PARTS
        )));
    }

    let known = state.repo.get_option_list(OptionCategory::Parts).await?;
    if let Some(unknown) = parts.iter().find(|p| !known.contains(p)) {
        return Err(AppError::Validation(format!(
            "'{}' is not a configured part",
            unknown
        )));
    }
    Ok(parts)
}

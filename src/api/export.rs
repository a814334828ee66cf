//! File export endpoints.
//!
//! Successful exports return the raw file bytes. When the query matches
//! nothing the response is the usual JSON envelope with a `noData` outcome.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use serde::Deserialize;

use super::reports::{cached_reports, visible_author};
use super::stats::{build_pivot, GroupParams, PivotParams};
use super::{domain, ApiResponse};
use crate::errors::AppError;
use crate::models::{CountField, CountQuery, Session, StatsOutcome};
use crate::stats::export::{export_table, export_workbook, ExportFormat, Sheet};
use crate::stats::{group_sum, pivot};
use crate::AppState;

/// Output format and download name; the name is used as given.
#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub format: ExportFormat,
    pub filename: String,
}

/// Download name for the multi-sheet workbook.
#[derive(Debug, Deserialize)]
pub struct WorkbookParams {
    pub filename: String,
}

/// Author filter for report exports.
#[derive(Debug, Default, Deserialize)]
pub struct ReportExportFilter {
    #[serde(default)]
    pub author: Option<String>,
}

/// GET /api/export/counts - Flat tally rows.
pub async fn export_counts(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
    Query(filter): Query<CountQuery>,
) -> Result<Response, AppError> {
    let rows = state.repo.query_counts(&filter).await?;
    if rows.is_empty() {
        return Ok(no_data());
    }

    let bytes = export_table(&Sheet::from_counts("counts", &rows), params.format)?;
    file_response(bytes, params.format, &params.filename)
}

/// GET /api/export/group - Per-key sums for one dimension.
pub async fn export_group(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
    Query(group): Query<GroupParams>,
    Query(filter): Query<CountQuery>,
) -> Result<Response, AppError> {
    let rows = state.repo.query_counts(&filter).await?;
    let StatsOutcome::Ready(summary) = group_sum(&rows, group.by) else {
        return Ok(no_data());
    };

    let name = format!("by_{}", group.by.as_str());
    let bytes = export_table(&Sheet::from_groups(&name, &summary), params.format)?;
    file_response(bytes, params.format, &params.filename)
}

/// GET /api/export/pivot - One pivot table.
pub async fn export_pivot(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
    Query(axes): Query<PivotParams>,
    Query(filter): Query<CountQuery>,
) -> Result<Response, AppError> {
    let StatsOutcome::Ready(table) = build_pivot(&state, &axes, &filter).await? else {
        return Ok(no_data());
    };

    let name = format!("{}_{}", axes.rows.as_str(), axes.cols.as_str());
    let bytes = export_table(&Sheet::from_pivot(&name, &table), params.format)?;
    file_response(bytes, params.format, &params.filename)
}

/// GET /api/export/reports - Flat report rows, oldest first.
pub async fn export_reports(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(params): Query<ExportParams>,
    Query(filter): Query<ReportExportFilter>,
) -> Result<Response, AppError> {
    let author = visible_author(&session, filter.author.as_deref())?;
    let reports = cached_reports(&state, &session, author).await?;
    if reports.is_empty() {
        return Ok(no_data());
    }

    let mut oldest_first = reports.to_vec();
    oldest_first.reverse();
    let bytes = export_table(&Sheet::from_reports("reports", &oldest_first), params.format)?;
    file_response(bytes, params.format, &params.filename)
}

/// GET /api/export/workbook - Raw rows plus camp x device and device x issue sheets.
pub async fn export_workbook_file(
    State(state): State<AppState>,
    Query(params): Query<WorkbookParams>,
    Query(filter): Query<CountQuery>,
) -> Result<Response, AppError> {
    let rows = state.repo.query_counts(&filter).await?;
    if rows.is_empty() {
        return Ok(no_data());
    }

    let camps = domain(&state, CountField::Camp).await?;
    let devices = domain(&state, CountField::Device).await?;
    let issues = domain(&state, CountField::Issue).await?;

    let mut sheets = vec![Sheet::from_counts("raw", &rows)];
    if let StatsOutcome::Ready(table) =
        pivot(&rows, CountField::Camp, CountField::Device, &camps, &devices)
    {
        sheets.push(Sheet::from_pivot("camp_device", &table));
    }
    if let StatsOutcome::Ready(table) =
        pivot(&rows, CountField::Device, CountField::Issue, &devices, &issues)
    {
        sheets.push(Sheet::from_pivot("device_issue", &table));
    }

    let bytes = export_workbook(&sheets)?;
    file_response(bytes, ExportFormat::Xlsx, &params.filename)
}

fn no_data() -> Response {
    ApiResponse::new(StatsOutcome::<()>::NoData).into_response()
}

fn file_response(bytes: Vec<u8>, format: ExportFormat, filename: &str) -> Result<Response, AppError> {
    let filename = filename.trim();
    if filename.is_empty()
        || filename
            .chars()
            .any(|c| c.is_control() || matches!(c, '"' | '/' | '\\'))
    {
        return Err(AppError::Validation(format!("Invalid filename '{}'", filename)));
    }

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| AppError::Validation(format!("Invalid filename: {}", e)))?;

    tracing::info!(
        filename = %filename,
        format = format.extension(),
        bytes = bytes.len(),
        "Export generated"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(format.mime_type())),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

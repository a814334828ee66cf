//! Statistics API endpoints.

use axum::extract::{Query, State};
use axum::Extension;
use serde::Deserialize;

use super::reports::{cached_reports, visible_author};
use super::{domain, success, ApiResult};
use crate::errors::AppError;
use crate::models::{
    CountField, CountQuery, GroupSummary, PivotTable, ReportField, Session, StatsOutcome,
};
use crate::stats;
use crate::AppState;

/// Grouping parameter for `/api/stats/group`.
#[derive(Debug, Deserialize)]
pub struct GroupParams {
    pub by: CountField,
}

/// Axis parameters for pivot tables.
#[derive(Debug, Deserialize)]
pub struct PivotParams {
    pub rows: CountField,
    pub cols: CountField,
}

/// Parameters for `/api/stats/reports`.
#[derive(Debug, Deserialize)]
pub struct ReportStatsParams {
    pub by: ReportField,
    #[serde(default)]
    pub author: Option<String>,
}

/// GET /api/stats/group - Tally sums grouped by one dimension.
pub async fn group_stats(
    State(state): State<AppState>,
    Query(params): Query<GroupParams>,
    Query(filter): Query<CountQuery>,
) -> ApiResult<StatsOutcome<GroupSummary>> {
    let rows = state.repo.query_counts(&filter).await?;
    success(stats::group_sum(&rows, params.by))
}

/// GET /api/stats/pivot - Two-dimensional tally table with totals.
pub async fn pivot_stats(
    State(state): State<AppState>,
    Query(params): Query<PivotParams>,
    Query(filter): Query<CountQuery>,
) -> ApiResult<StatsOutcome<PivotTable>> {
    success(build_pivot(&state, &params, &filter).await?)
}

/// GET /api/stats/reports - Report counts per author, issue, date or part.
pub async fn report_stats(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(params): Query<ReportStatsParams>,
) -> ApiResult<StatsOutcome<GroupSummary>> {
    let author = visible_author(&session, params.author.as_deref())?;
    let reports = cached_reports(&state, &session, author).await?;
    success(stats::group_reports(&reports, params.by))
}

pub(super) async fn build_pivot(
    state: &AppState,
    params: &PivotParams,
    filter: &CountQuery,
) -> Result<StatsOutcome<PivotTable>, AppError> {
    if params.rows == params.cols {
        return Err(AppError::Validation(
            "Pivot rows and columns must differ".to_string(),
        ));
    }

    let rows = state.repo.query_counts(filter).await?;
    let row_domain = domain(state, params.rows).await?;
    let col_domain = domain(state, params.cols).await?;

    Ok(stats::pivot(
        &rows,
        params.rows,
        params.cols,
        &row_domain,
        &col_domain,
    ))
}

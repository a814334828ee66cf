//! Fault tally API endpoints.

use std::collections::HashSet;

use axum::{
    extract::{Query, State},
    Extension, Json,
};

use super::{ensure_listed, listed, required, success, ApiResult};
use crate::errors::AppError;
use crate::models::{
    parse_count_date, CountEntry, CountQuery, CountScope, IssueCount, OptionCategory, OptionList,
    SaveCountsRequest, Session, DATE_FORMAT,
};
use crate::AppState;

/// GET /api/counts - Tallies matching the given filters.
pub async fn list_counts(
    State(state): State<AppState>,
    Query(query): Query<CountQuery>,
) -> ApiResult<Vec<IssueCount>> {
    success(state.repo.query_counts(&query).await?)
}

/// POST /api/counts - Save a camp's tallies for one day, replacing what was there.
///
/// Admin saves replace every author's rows for the date and camp; user saves
/// only replace the user's own rows. Zero counts are dropped. Camp, device and
/// issue must come from their option lists.
pub async fn save_counts(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<SaveCountsRequest>,
) -> ApiResult<Vec<IssueCount>> {
    let date = parse_count_date(request.date.trim())
        .ok_or_else(|| AppError::Validation(format!("Invalid date '{}'", request.date)))?
        .format(DATE_FORMAT)
        .to_string();
    let camp = required(&request.camp, "Camp")?;
    ensure_listed(&state, OptionCategory::Camps, &camp).await?;

    let entries = checked_entries(&request.entries)?;
    let devices = state.repo.get_option_list(OptionCategory::Devices).await?;
    let issues = state.repo.get_option_list(OptionCategory::CountIssues).await?;
    ensure_entries_listed(&entries, &devices, &issues)?;

    let scope = CountScope {
        date,
        camp,
        author: (!session.is_admin()).then(|| session.name.clone()),
    };

    let saved = state
        .repo
        .replace_count_scope(&scope, &session.name, &entries)
        .await?;
    success(saved)
}

fn checked_entries(entries: &[CountEntry]) -> Result<Vec<CountEntry>, AppError> {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut checked = Vec::with_capacity(entries.len());

    for entry in entries {
        let device = required(&entry.device, "Device")?;
        let issue = required(&entry.issue, "Issue")?;
        if entry.count < 0 {
            return Err(AppError::Validation(format!(
                "Count for {} / {} must not be negative",
                device, issue
            )));
        }
        if !seen.insert((device.clone(), issue.clone())) {
            return Err(AppError::Validation(format!(
                "Duplicate entry for {} / {}",
                device, issue
            )));
        }
        checked.push(CountEntry {
            device,
            issue,
            count: entry.count,
        });
    }

    Ok(checked)
}

fn ensure_entries_listed(
    entries: &[CountEntry],
    devices: &OptionList,
    issues: &OptionList,
) -> Result<(), AppError> {
    for entry in entries {
        listed(devices, &entry.device)?;
        listed(issues, &entry.issue)?;
    }
    Ok(())
}

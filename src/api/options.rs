//! Option list API endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use super::{required, success, ApiResult};
use crate::auth::require_admin;
use crate::models::{AddOptionRequest, OptionCategory, OptionList, Session};
use crate::AppState;

/// GET /api/options - All option lists.
pub async fn list_options(State(state): State<AppState>) -> ApiResult<Vec<OptionList>> {
    success(state.repo.list_option_lists().await?)
}

/// GET /api/options/:category - One option list.
pub async fn get_options(
    State(state): State<AppState>,
    Path(category): Path<OptionCategory>,
) -> ApiResult<OptionList> {
    success(state.repo.get_option_list(category).await?)
}

/// POST /api/options/:category - Add a value (admin only).
pub async fn add_option(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(category): Path<OptionCategory>,
    Json(request): Json<AddOptionRequest>,
) -> ApiResult<OptionList> {
    require_admin(&session)?;
    let value = required(&request.value, "Value")?;

    let list = state.repo.add_option(category, &value).await?;
    tracing::info!(category = category.as_str(), value = %value, "Option added");
    success(list)
}

/// DELETE /api/options/:category/:value - Remove a value (admin only).
pub async fn remove_option(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path((category, value)): Path<(OptionCategory, String)>,
) -> ApiResult<OptionList> {
    require_admin(&session)?;

    let list = state.repo.remove_option(category, &value).await?;
    tracing::info!(category = category.as_str(), value = %value, "Option removed");
    success(list)
}

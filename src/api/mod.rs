//! REST API module.
//!
//! Contains all API routes and handlers. Every JSON response uses the same
//! `{ success, data }` envelope; failures go through [`AppError`].

mod counts;
mod equipment;
mod export;
mod options;
mod reports;
mod session;
mod stats;

pub use counts::*;
pub use equipment::*;
pub use export::*;
pub use options::*;
pub use reports::*;
pub use session::*;
pub use stats::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{CountField, OptionCategory, OptionList};
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Trimmed value, or a validation error naming the field.
fn required(value: &str, field: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Canonical ordering for a tally dimension, read from its option list.
async fn domain(state: &AppState, field: CountField) -> Result<Vec<String>, AppError> {
    match field.domain() {
        Some(category) => Ok(state.repo.get_option_list(category).await?.items),
        None => Ok(Vec::new()),
    }
}

/// Fail unless `value` is in the `category` list.
async fn ensure_listed(
    state: &AppState,
    category: OptionCategory,
    value: &str,
) -> Result<(), AppError> {
    let list = state.repo.get_option_list(category).await?;
    listed(&list, value)
}

/// Fail unless `value` is in an already loaded list.
fn listed(list: &OptionList, value: &str) -> Result<(), AppError> {
    if list.contains(value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "'{}' is not a configured {} value",
            value,
            list.category.as_str()
        )))
    }
}

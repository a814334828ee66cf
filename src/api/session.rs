//! Session API endpoints.

use axum::{extract::State, Extension, Json};

use super::{success, ApiResult};
use crate::auth::{verify_admin_password, ADMIN_NAME};
use crate::equipment::extract_equipment_id;
use crate::errors::AppError;
use crate::models::{
    EquipmentIdResponse, LoginRequest, OptionCategory, Role, ScanRequest, Session,
};
use crate::AppState;

/// POST /api/session/login - Log in as a listed author or as admin.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Session> {
    let session = match request {
        LoginRequest::User { author } => {
            let author = author.trim();
            let authors = state.repo.get_option_list(OptionCategory::Authors).await?;
            if !authors.contains(author) {
                tracing::warn!(author = %author, "Login rejected for unknown author");
                return Err(AppError::Unauthorized(format!(
                    "'{}' is not a registered author",
                    author
                )));
            }
            state.sessions.create(Role::User, author).await
        }
        LoginRequest::Admin { password } => {
            if let Err(e) = verify_admin_password(state.config.admin_password.as_deref(), &password)
            {
                tracing::warn!("Admin login rejected");
                return Err(e);
            }
            state.sessions.create(Role::Admin, ADMIN_NAME).await
        }
    };

    success(session)
}

/// GET /api/session - Current session.
pub async fn current_session(Extension(session): Extension<Session>) -> ApiResult<Session> {
    success(session)
}

/// POST /api/session/logout - End the current session.
pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<()> {
    state.sessions.remove(&session.token).await;
    tracing::info!(name = %session.name, "Session ended");
    success(())
}

/// POST /api/session/scan - Store the equipment id decoded from a scanned code.
pub async fn scan_equipment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<ScanRequest>,
) -> ApiResult<EquipmentIdResponse> {
    let equipment_id = extract_equipment_id(&request.raw).ok_or_else(|| {
        AppError::Validation("Scanned code does not contain an equipment id".to_string())
    })?;

    state
        .sessions
        .set_scanned_equipment(&session.token, Some(equipment_id.clone()))
        .await
        .ok_or_else(|| AppError::Unauthorized("Session ended".to_string()))?;

    success(EquipmentIdResponse {
        equipment_id: Some(equipment_id),
    })
}

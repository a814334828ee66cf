//! Session-based login gate.
//!
//! Regular users log in by picking their name; admins supply the shared
//! password, compared in constant time to mitigate timing attacks. Each login
//! yields a [`Session`] stored in memory and looked up by token on every
//! request.

use std::time::Duration;

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use moka::future::Cache;
use subtle::ConstantTimeEq;

use crate::errors::AppError;
use crate::models::{Role, Session};

/// Header carrying the session token.
pub const SESSION_HEADER: &str = "x-session-token";

/// Display name of admin sessions; also recorded as author on admin tally saves.
pub const ADMIN_NAME: &str = "admin";

const MAX_SESSIONS: u64 = 10_000;

/// In-memory session registry shared by all handlers.
///
/// A session unused for the idle timeout is dropped; every lookup resets the clock.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Cache<String, Session>,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        let sessions = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_idle(idle_timeout)
            .build();
        Self { sessions }
    }

    /// Start a session and return it.
    pub async fn create(&self, role: Role, name: &str) -> Session {
        let session = Session {
            token: uuid::Uuid::new_v4().to_string(),
            role,
            name: name.to_string(),
            scanned_equipment_id: None,
            created_at: Utc::now(),
        };
        self.sessions
            .insert(session.token.clone(), session.clone())
            .await;
        tracing::info!(role = ?role, name = %name, "Session started");
        session
    }

    pub async fn get(&self, token: &str) -> Option<Session> {
        self.sessions.get(token).await
    }

    /// End a session. Returns whether it existed.
    pub async fn remove(&self, token: &str) -> bool {
        self.sessions.remove(token).await.is_some()
    }

    /// Replace the scan buffer of a live session.
    pub async fn set_scanned_equipment(
        &self,
        token: &str,
        equipment_id: Option<String>,
    ) -> Option<Session> {
        let mut session = self.sessions.get(token).await?;
        session.scanned_equipment_id = equipment_id;
        self.sessions
            .insert(token.to_string(), session.clone())
            .await;
        Some(session)
    }
}

/// Session layer: resolves the token and attaches the [`Session`] to the request.
pub async fn session_auth_layer(
    sessions: SessionStore,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = token_from_headers(request.headers()) else {
        return AppError::Unauthorized("Missing session token".to_string()).into_response();
    };

    match sessions.get(&token).await {
        Some(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => AppError::Unauthorized("Unknown or expired session".to_string()).into_response(),
    }
}

/// Read the token from `x-session-token`, falling back to a bearer token.
fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Check a password against the configured admin password.
pub fn verify_admin_password(expected: Option<&str>, provided: &str) -> Result<(), AppError> {
    let Some(expected) = expected else {
        return Err(AppError::Unauthorized(
            "Admin login is not configured".to_string(),
        ));
    };

    if constant_time_compare(provided, expected) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("Invalid admin password".to_string()))
    }
}

/// Reject non-admin sessions.
pub fn require_admin(session: &Session) -> Result<(), AppError> {
    if session.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin role required".to_string()))
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

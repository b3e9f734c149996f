//! Authentication endpoints: login and auth-enablement status.

use crate::auth::{
    jwt::JwtHandler,
    models::{LoginRequest, LoginResponse, UserResponse},
    user_store::UserStore,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared auth state. `jwt_handler` is `None` when `JWT_SECRET` is unset, which
/// disables authentication entirely (`/auth/status` reports `enabled: false`
/// and the auth middleware becomes a no-op).
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub jwt_handler: Option<Arc<JwtHandler>>,
}

impl AuthState {
    pub fn new(user_store: Arc<UserStore>, jwt_handler: Option<Arc<JwtHandler>>) -> Self {
        Self {
            user_store,
            jwt_handler,
        }
    }

    pub fn enabled(&self) -> bool {
        self.jwt_handler.is_some()
    }
}

#[derive(Debug, Serialize)]
pub struct AuthStatusResponse {
    pub enabled: bool,
}

/// GET /auth/status
pub async fn auth_status(State(state): State<AuthState>) -> Json<AuthStatusResponse> {
    Json(AuthStatusResponse {
        enabled: state.enabled(),
    })
}

/// POST /auth/login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    let Some(jwt_handler) = &state.jwt_handler else {
        return Err(AuthApiError::AuthDisabled);
    };

    info!(username = %payload.username, "login attempt");

    let valid = state
        .user_store
        .verify_password(&payload.username, &payload.password)
        .map_err(|_| AuthApiError::InternalError)?;

    if !valid {
        warn!(username = %payload.username, "failed login attempt");
        return Err(AuthApiError::InvalidCredentials);
    }

    let user = state
        .user_store
        .get_user_by_username(&payload.username)
        .map_err(|_| AuthApiError::InternalError)?
        .ok_or(AuthApiError::InvalidCredentials)?;

    let (token, expires_in) = jwt_handler
        .generate_token(&user)
        .map_err(|_| AuthApiError::InternalError)?;

    info!(username = %user.username, role = user.role.as_str(), "login successful");

    Ok(Json(LoginResponse {
        access_token: token,
        expires_in,
        role: user.role.clone(),
        user: UserResponse::from_user(&user),
    }))
}

#[derive(Debug)]
pub enum AuthApiError {
    AuthDisabled,
    InvalidCredentials,
    InternalError,
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::AuthDisabled => (StatusCode::NOT_FOUND, "authentication is disabled"),
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "invalid username or password")
            }
            AuthApiError::InternalError => (StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::{User, UserRole};
    use uuid::Uuid;

    #[test]
    fn test_user_response_from_user() {
        let user = User {
            id: Uuid::new_v4(),
            username: "testuser".to_string(),
            password_hash: "hash123".to_string(),
            role: UserRole::Trader,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };

        let response = UserResponse::from_user(&user);
        assert_eq!(response.username, "testuser");
        assert_eq!(response.role, UserRole::Trader);
    }

    #[test]
    fn test_auth_api_error_responses() {
        let disabled = AuthApiError::AuthDisabled.into_response();
        assert_eq!(disabled.status(), StatusCode::NOT_FOUND);

        let invalid_creds = AuthApiError::InvalidCredentials.into_response();
        assert_eq!(invalid_creds.status(), StatusCode::UNAUTHORIZED);
    }
}

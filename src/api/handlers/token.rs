//! Refresh and logout endpoints.
//!
//! Every credential failure on these routes collapses into one 401 so a
//! caller cannot probe whether a refresh token is expired, revoked, or
//! forged.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::error;

use super::types::{LogoutRequest, RefreshRequest, RefreshResponse};
use super::ApiState;
use crate::auth::AuthError;

#[utoipa::path(
    post,
    path = "/v1/auth/token/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 400, description = "Missing payload", body = String),
        (status = 401, description = "Refresh token expired, revoked, or invalid", body = String)
    ),
    tag = "auth"
)]
pub async fn refresh(
    state: Extension<Arc<ApiState>>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    let request: RefreshRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    match state
        .tokens()
        .refresh_access_token(&request.refresh_token, request.kind)
        .await
    {
        Ok(access_token) => {
            let response = RefreshResponse {
                access_token,
                token_type: "bearer".to_string(),
                expires_in: state.tokens().access_ttl_seconds(request.kind),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(AuthError::Internal(err)) => {
            error!("Failed to refresh access token: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Refresh failed".to_string(),
            )
                .into_response()
        }
        Err(_) => (
            StatusCode::UNAUTHORIZED,
            "Invalid refresh token".to_string(),
        )
            .into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 204, description = "Session revoked"),
        (status = 400, description = "Missing payload", body = String),
        (status = 401, description = "Refresh token expired or invalid", body = String)
    ),
    tag = "auth"
)]
pub async fn logout(
    state: Extension<Arc<ApiState>>,
    payload: Option<Json<LogoutRequest>>,
) -> impl IntoResponse {
    let request: LogoutRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    match state
        .tokens()
        .revoke_refresh_token(&request.refresh_token, request.kind)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(AuthError::Internal(err)) => {
            error!("Failed to revoke refresh token: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Logout failed".to_string(),
            )
                .into_response()
        }
        Err(_) => (
            StatusCode::UNAUTHORIZED,
            "Invalid refresh token".to_string(),
        )
            .into_response(),
    }
}

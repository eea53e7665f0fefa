//! OTP issuance and verification endpoints.

use axum::{
    extract::Extension,
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{debug, error};

use super::types::{RequestOtpRequest, TokenPairResponse, VerifyOtpRequest};
use super::utils::normalize_destination;
use super::ApiState;
use crate::auth::otp::OtpPurpose;
use crate::auth::AuthError;

/// The opaque answer for the request path: a caller must not be able to
/// tell whether the destination belongs to anyone.
fn accepted() -> Response {
    (
        StatusCode::ACCEPTED,
        "If the destination is registered, a code has been sent".to_string(),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/v1/auth/otp/request",
    request_body = RequestOtpRequest,
    responses(
        (status = 202, description = "Accepted; a code was sent if the destination is registered", body = String),
        (status = 400, description = "Missing payload", body = String),
        (status = 429, description = "Resend throttled or attempts exhausted", body = String)
    ),
    tag = "auth"
)]
pub async fn request_otp(
    state: Extension<Arc<ApiState>>,
    payload: Option<Json<RequestOtpRequest>>,
) -> impl IntoResponse {
    let request: RequestOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    // Syntactically invalid destinations get the same opaque answer as
    // unknown ones.
    let Some(destination) = normalize_destination(request.channel, &request.destination) else {
        debug!(channel = request.channel.as_str(), "invalid otp destination");
        return accepted();
    };

    let principal = match state
        .principals()
        .find_by_channel(request.kind, request.channel, &destination)
        .await
    {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            debug!(
                channel = request.channel.as_str(),
                "otp requested for unknown destination"
            );
            return accepted();
        }
        Err(err) => {
            error!("Failed to resolve principal for otp request: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "OTP request failed".to_string(),
            )
                .into_response();
        }
    };

    // First contact over a channel verifies it; later codes are logins.
    let purpose = if principal.channel_verified(request.channel) {
        OtpPurpose::Login
    } else {
        OtpPurpose::Verification
    };

    match state
        .otp()
        .request_code(principal.id, &destination, request.channel, purpose)
        .await
    {
        Ok(()) => accepted(),
        Err(AuthError::Throttled {
            retry_after_seconds,
        }) => {
            let err = AuthError::Throttled {
                retry_after_seconds,
            };
            let mut response = (err.status(), err.to_string()).into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
            response
        }
        Err(AuthError::Internal(err)) => {
            error!("Failed to issue otp challenge: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "OTP request failed".to_string(),
            )
                .into_response()
        }
        Err(err) => (err.status(), err.to_string()).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/otp/verify",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Code accepted; tokens minted", body = TokenPairResponse),
        (status = 400, description = "Wrong or expired code", body = String),
        (status = 404, description = "No live challenge for this destination", body = String),
        (status = 429, description = "Attempt budget exhausted", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    state: Extension<Arc<ApiState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> impl IntoResponse {
    let request: VerifyOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    // An unparseable destination can have no challenge; answer exactly as
    // if none existed.
    let not_found = || (StatusCode::NOT_FOUND, "not found".to_string()).into_response();
    let Some(destination) = normalize_destination(request.channel, &request.destination) else {
        return not_found();
    };

    let principal = match state
        .principals()
        .find_by_channel(request.kind, request.channel, &destination)
        .await
    {
        Ok(Some(principal)) => principal,
        Ok(None) => return not_found(),
        Err(err) => {
            error!("Failed to resolve principal for otp verify: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed".to_string(),
            )
                .into_response();
        }
    };

    match state
        .otp()
        .verify_code(principal.id, request.channel, &request.code)
        .await
    {
        Ok(()) => {}
        Err(AuthError::Internal(err)) => {
            error!("Failed to verify otp challenge: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed".to_string(),
            )
                .into_response();
        }
        Err(err) => return (err.status(), err.to_string()).into_response(),
    }

    if !principal.channel_verified(request.channel) {
        if let Err(err) = state
            .principals()
            .mark_channel_verified(principal.id, request.channel)
            .await
        {
            error!("Failed to mark channel verified: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed".to_string(),
            )
                .into_response();
        }
    }

    match state
        .tokens()
        .issue_pair(request.kind, principal.id, principal.role.as_deref())
        .await
    {
        Ok(pair) => {
            let response = TokenPairResponse {
                access_token: pair.access,
                refresh_token: pair.refresh,
                session_id: pair.session_id,
                token_type: "bearer".to_string(),
                expires_in: state.tokens().access_ttl_seconds(request.kind),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            error!("Failed to mint token pair: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed".to_string(),
            )
                .into_response()
        }
    }
}

//! Identity introspection routes behind the gateway middleware.
//!
//! The middleware has already authenticated (or declined to) before these
//! run; they only read the extensions it attached.

use axum::{extract::Extension, response::Json};

use super::types::{MeResponse, StatusResponse};
use crate::auth::gateway::MaybePrincipal;
use crate::auth::principal::PrincipalRecord;

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "The authenticated user", body = MeResponse),
        (status = 401, description = "Missing, expired, or invalid access token", body = String),
        (status = 404, description = "Principal deleted after token issuance", body = String)
    ),
    tag = "auth"
)]
pub async fn me(principal: Extension<PrincipalRecord>) -> Json<MeResponse> {
    Json(MeResponse::from(&principal.0))
}

#[utoipa::path(
    get,
    path = "/v1/admin/me",
    responses(
        (status = 200, description = "The authenticated administrator", body = MeResponse),
        (status = 403, description = "Missing, expired, or invalid admin access token", body = String),
        (status = 404, description = "Principal deleted after token issuance", body = String)
    ),
    tag = "auth"
)]
pub async fn admin_me(principal: Extension<PrincipalRecord>) -> Json<MeResponse> {
    Json(MeResponse::from(&principal.0))
}

#[utoipa::path(
    get,
    path = "/v1/status",
    responses(
        (status = 200, description = "Whether the caller is authenticated", body = StatusResponse)
    ),
    tag = "auth"
)]
pub async fn status(
    Extension(MaybePrincipal(principal)): Extension<MaybePrincipal>,
) -> Json<StatusResponse> {
    Json(StatusResponse {
        authenticated: principal.is_some(),
        principal_id: principal.map(|record| record.id),
    })
}

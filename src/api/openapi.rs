use utoipa::OpenApi;

use super::handlers::{health, me, otp, token, types};

/// Every documented route is registered here; `/swagger-ui` serves the
/// result. Routes mounted outside this list are intentionally undocumented.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        otp::request_otp,
        otp::verify_otp,
        token::refresh,
        token::logout,
        me::me,
        me::admin_me,
        me::status,
    ),
    components(schemas(
        health::Health,
        types::RequestOtpRequest,
        types::VerifyOtpRequest,
        types::TokenPairResponse,
        types::RefreshRequest,
        types::RefreshResponse,
        types::LogoutRequest,
        types::MeResponse,
        types::StatusResponse,
    )),
    tags(
        (name = "auth", description = "OTP challenges, token lifecycle, and identity introspection"),
        (name = "health", description = "Service health")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_covers_the_public_surface() {
        let doc = openapi();
        for path in [
            "/health",
            "/v1/auth/otp/request",
            "/v1/auth/otp/verify",
            "/v1/auth/token/refresh",
            "/v1/auth/logout",
            "/v1/me",
            "/v1/admin/me",
            "/v1/status",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing path: {path}");
        }
    }
}

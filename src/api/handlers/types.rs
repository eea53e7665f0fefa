//! Request/response types for the auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{ChannelKind, PrincipalKind};

fn default_kind() -> PrincipalKind {
    PrincipalKind::User
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RequestOtpRequest {
    /// `mobile` or `email`.
    #[schema(value_type = String, example = "mobile")]
    pub channel: ChannelKind,
    /// E.164 mobile number or email address.
    #[schema(example = "+46701234567")]
    pub destination: String,
    /// `user` (default) or `admin`.
    #[serde(default = "default_kind")]
    #[schema(value_type = String, example = "user")]
    pub kind: PrincipalKind,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpRequest {
    #[schema(value_type = String, example = "mobile")]
    pub channel: ChannelKind,
    #[schema(example = "+46701234567")]
    pub destination: String,
    pub code: String,
    #[serde(default = "default_kind")]
    #[schema(value_type = String, example = "user")]
    pub kind: PrincipalKind,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub session_id: Uuid,
    pub token_type: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshRequest {
    pub refresh_token: String,
    #[serde(default = "default_kind")]
    #[schema(value_type = String, example = "user")]
    pub kind: PrincipalKind,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutRequest {
    pub refresh_token: String,
    #[serde(default = "default_kind")]
    #[schema(value_type = String, example = "user")]
    pub kind: PrincipalKind,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MeResponse {
    pub id: Uuid,
    pub kind: String,
    pub role: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub mobile_verified: bool,
    pub email_verified: bool,
}

impl From<&crate::auth::principal::PrincipalRecord> for MeResponse {
    fn from(principal: &crate::auth::principal::PrincipalRecord) -> Self {
        Self {
            id: principal.id,
            kind: principal.kind.as_str().to_string(),
            role: principal.role.clone(),
            mobile: principal.mobile.clone(),
            email: principal.email.clone(),
            mobile_verified: principal.mobile_verified,
            email_verified: principal.email_verified,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct StatusResponse {
    pub authenticated: bool,
    pub principal_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_to_user_kind() {
        let request: RequestOtpRequest = serde_json::from_str(
            r#"{"channel": "email", "destination": "investor@example.com"}"#,
        )
        .expect("payload should parse");
        assert_eq!(request.kind, PrincipalKind::User);
        assert_eq!(request.channel, ChannelKind::Email);
    }

    #[test]
    fn verify_accepts_admin_kind() {
        let request: VerifyOtpRequest = serde_json::from_str(
            r#"{"channel": "mobile", "destination": "+46701234567", "code": "123456", "kind": "admin"}"#,
        )
        .expect("payload should parse");
        assert_eq!(request.kind, PrincipalKind::Admin);
    }
}

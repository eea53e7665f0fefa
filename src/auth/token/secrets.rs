//! Per-(principal kind, token kind) signing configuration.
//!
//! Four independent secret/expiry pairs, so compromising one does not
//! compromise the others, and a token can only ever verify against the
//! configuration it was minted under.

use secrecy::{ExposeSecret, SecretString};

use crate::auth::principal::PrincipalKind;

use super::TokenKind;

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
pub const DEFAULT_USER_REFRESH_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
pub const DEFAULT_ADMIN_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct TokenConfig {
    secret: SecretString,
    ttl_seconds: i64,
}

impl TokenConfig {
    #[must_use]
    pub fn new(secret: SecretString, ttl_seconds: i64) -> Self {
        Self {
            secret,
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    pub(super) fn secret_bytes(&self) -> &[u8] {
        self.secret.expose_secret().as_bytes()
    }
}

/// The four signing configurations, selected by (principal, token) pair.
#[derive(Clone, Debug)]
pub struct SecretStore {
    user_access: TokenConfig,
    user_refresh: TokenConfig,
    admin_access: TokenConfig,
    admin_refresh: TokenConfig,
}

impl SecretStore {
    #[must_use]
    pub fn new(
        user_access: TokenConfig,
        user_refresh: TokenConfig,
        admin_access: TokenConfig,
        admin_refresh: TokenConfig,
    ) -> Self {
        Self {
            user_access,
            user_refresh,
            admin_access,
            admin_refresh,
        }
    }

    #[must_use]
    pub fn get(&self, principal: PrincipalKind, kind: TokenKind) -> &TokenConfig {
        match (principal, kind) {
            (PrincipalKind::User, TokenKind::Access) => &self.user_access,
            (PrincipalKind::User, TokenKind::Refresh) => &self.user_refresh,
            (PrincipalKind::Admin, TokenKind::Access) => &self.admin_access,
            (PrincipalKind::Admin, TokenKind::Refresh) => &self.admin_refresh,
        }
    }

    /// Distinct per-pair secrets with short, test-friendly lifetimes.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(
            TokenConfig::new("user-access-secret".to_string().into(), 900),
            TokenConfig::new("user-refresh-secret".to_string().into(), 3600),
            TokenConfig::new("admin-access-secret".to_string().into(), 900),
            TokenConfig::new("admin-refresh-secret".to_string().into(), 3600),
        )
    }
}

use secrecy::SecretString;

use crate::auth::otp::OtpConfig;
use crate::auth::token::{SecretStore, TokenConfig};

/// Everything the server needs beyond `port` and `dsn`: the four signing
/// secrets with their lifetimes, the OTP tuning knobs, and the frontend
/// origin allowed through CORS.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub frontend_url: String,
    pub user_access_secret: SecretString,
    pub user_refresh_secret: SecretString,
    pub admin_access_secret: SecretString,
    pub admin_refresh_secret: SecretString,
    pub access_ttl_seconds: i64,
    pub user_refresh_ttl_seconds: i64,
    pub admin_refresh_ttl_seconds: i64,
    pub otp: OtpConfig,
}

impl GlobalArgs {
    /// Signing configurations in the fixed (user, admin) x (access,
    /// refresh) order.
    #[must_use]
    pub fn secret_store(&self) -> SecretStore {
        SecretStore::new(
            TokenConfig::new(self.user_access_secret.clone(), self.access_ttl_seconds),
            TokenConfig::new(
                self.user_refresh_secret.clone(),
                self.user_refresh_ttl_seconds,
            ),
            TokenConfig::new(self.admin_access_secret.clone(), self.access_ttl_seconds),
            TokenConfig::new(
                self.admin_refresh_secret.clone(),
                self.admin_refresh_ttl_seconds,
            ),
        )
    }

    #[must_use]
    pub fn otp_config(&self) -> OtpConfig {
        self.otp.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::TokenKind;
    use crate::auth::PrincipalKind;

    #[test]
    fn secret_store_maps_ttls_per_pair() {
        let globals = GlobalArgs {
            frontend_url: "http://localhost:3000".to_string(),
            user_access_secret: "ua".to_string().into(),
            user_refresh_secret: "ur".to_string().into(),
            admin_access_secret: "aa".to_string().into(),
            admin_refresh_secret: "ar".to_string().into(),
            access_ttl_seconds: 900,
            user_refresh_ttl_seconds: 2_592_000,
            admin_refresh_ttl_seconds: 604_800,
            otp: OtpConfig::default(),
        };

        let store = globals.secret_store();
        assert_eq!(
            store
                .get(PrincipalKind::User, TokenKind::Access)
                .ttl_seconds(),
            900
        );
        assert_eq!(
            store
                .get(PrincipalKind::User, TokenKind::Refresh)
                .ttl_seconds(),
            2_592_000
        );
        assert_eq!(
            store
                .get(PrincipalKind::Admin, TokenKind::Refresh)
                .ttl_seconds(),
            604_800
        );
    }
}

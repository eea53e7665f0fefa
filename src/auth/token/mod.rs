//! Token engine: HS256 access/refresh minting and verification.
//!
//! Verification is always parameterized by the expected
//! (principal kind, token kind) pair; the pair is never inferred from the
//! token itself. Signature-domain separation therefore holds by
//! construction: a user refresh token cannot verify as an admin access
//! token because the secrets differ.

pub mod jwt;
pub mod secrets;

pub use secrets::{SecretStore, TokenConfig};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::principal::PrincipalKind;
use crate::auth::session::{hash_refresh_token, Session, SessionLedger};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Verified claims with the subject parsed back into a principal id.
#[derive(Clone, Debug)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub role: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub session_id: String,
}

/// An access/refresh pair sharing one session id.
#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub session_id: Uuid,
}

pub struct TokenEngine {
    secrets: SecretStore,
    /// Optional ledger for server-side refresh revocation. Minting and
    /// verification stay pure; only pair issuance and the refresh flow
    /// touch it.
    ledger: Option<Arc<dyn SessionLedger>>,
}

impl TokenEngine {
    #[must_use]
    pub fn new(secrets: SecretStore) -> Self {
        Self {
            secrets,
            ledger: None,
        }
    }

    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<dyn SessionLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Access-token lifetime for the given principal kind, for callers
    /// that report `expires_in` alongside a minted token.
    #[must_use]
    pub fn access_ttl_seconds(&self, principal: PrincipalKind) -> i64 {
        self.secrets.get(principal, TokenKind::Access).ttl_seconds()
    }

    /// Mint a token for (principal kind, token kind).
    ///
    /// # Errors
    ///
    /// Only on claim encoding/signing failure.
    pub fn issue(
        &self,
        principal: PrincipalKind,
        kind: TokenKind,
        sub: Uuid,
        role: Option<&str>,
    ) -> Result<String, AuthError> {
        self.issue_at(
            principal,
            kind,
            sub,
            role,
            Uuid::new_v4().to_string(),
            OffsetDateTime::now_utc().unix_timestamp(),
        )
    }

    /// Deterministic variant taking explicit jti and issue time; the
    /// public paths all funnel through here.
    pub(crate) fn issue_at(
        &self,
        principal: PrincipalKind,
        kind: TokenKind,
        sub: Uuid,
        role: Option<&str>,
        jti: String,
        now_unix_seconds: i64,
    ) -> Result<String, AuthError> {
        let config = self.secrets.get(principal, kind);
        let claims = jwt::JwtClaims {
            sub: sub.to_string(),
            role: role.map(str::to_string),
            iat: now_unix_seconds,
            exp: now_unix_seconds + config.ttl_seconds(),
            jti,
        };
        jwt::sign_hs256(config.secret_bytes(), &claims)
            .map_err(|err| AuthError::Internal(anyhow::anyhow!("failed to sign token: {err}")))
    }

    /// Verify a token against the expected (principal kind, token kind)
    /// configuration.
    ///
    /// # Errors
    ///
    /// `Expired` past the embedded expiry; `InvalidSignature` for
    /// anything else — wrong secret, tampering, malformed input. The two
    /// are distinguished so legitimate clients know when to refresh.
    pub fn verify(
        &self,
        token: &str,
        principal: PrincipalKind,
        kind: TokenKind,
    ) -> Result<TokenClaims, AuthError> {
        self.verify_at(
            token,
            principal,
            kind,
            OffsetDateTime::now_utc().unix_timestamp(),
        )
    }

    pub(crate) fn verify_at(
        &self,
        token: &str,
        principal: PrincipalKind,
        kind: TokenKind,
        now_unix_seconds: i64,
    ) -> Result<TokenClaims, AuthError> {
        let config = self.secrets.get(principal, kind);
        let claims = jwt::verify_hs256(token, config.secret_bytes(), now_unix_seconds).map_err(
            |err| match err {
                jwt::Error::Expired => AuthError::Expired,
                _ => AuthError::InvalidSignature,
            },
        )?;
        let sub = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidSignature)?;
        Ok(TokenClaims {
            sub,
            role: claims.role,
            iat: claims.iat,
            exp: claims.exp,
            session_id: claims.jti,
        })
    }

    /// Mint an access/refresh pair for a freshly authenticated principal
    /// and, when a ledger is attached, record the session for later
    /// revocation.
    ///
    /// # Errors
    ///
    /// Signing failure or a ledger write failure.
    pub async fn issue_pair(
        &self,
        principal: PrincipalKind,
        sub: Uuid,
        role: Option<&str>,
    ) -> Result<TokenPair, AuthError> {
        let session_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let now_unix = now.unix_timestamp();

        let access = self.issue_at(
            principal,
            TokenKind::Access,
            sub,
            role,
            session_id.to_string(),
            now_unix,
        )?;
        let refresh = self.issue_at(
            principal,
            TokenKind::Refresh,
            sub,
            role,
            session_id.to_string(),
            now_unix,
        )?;

        if let Some(ledger) = &self.ledger {
            let refresh_ttl = self.secrets.get(principal, TokenKind::Refresh).ttl_seconds();
            ledger
                .record(Session {
                    session_id,
                    principal_id: sub,
                    principal_kind: principal,
                    refresh_hash: hash_refresh_token(&refresh),
                    created_at: now,
                    expires_at: now + time::Duration::seconds(refresh_ttl),
                })
                .await?;
        }

        Ok(TokenPair {
            access,
            refresh,
            session_id,
        })
    }

    /// Exchange a valid refresh token for a new access token.
    ///
    /// The refresh token is deliberately not rotated: it stays valid until
    /// its embedded expiry, or until its ledger session is revoked when a
    /// ledger is attached. Without a ledger there is no server-side
    /// revocation at all.
    ///
    /// # Errors
    ///
    /// `Expired`/`InvalidSignature` from refresh verification;
    /// `Unauthenticated` when the ledger no longer holds a live session
    /// for it.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
        principal: PrincipalKind,
    ) -> Result<String, AuthError> {
        let claims = self.verify(refresh_token, principal, TokenKind::Refresh)?;

        if let Some(ledger) = &self.ledger {
            let session_id =
                Uuid::parse_str(&claims.session_id).map_err(|_| AuthError::InvalidSignature)?;
            let live = ledger
                .find_live(session_id, &hash_refresh_token(refresh_token))
                .await?;
            if live.is_none() {
                return Err(AuthError::Unauthenticated);
            }
        }

        self.issue_at(
            principal,
            TokenKind::Access,
            claims.sub,
            claims.role.as_deref(),
            claims.session_id,
            OffsetDateTime::now_utc().unix_timestamp(),
        )
    }

    /// Revoke the ledger session behind a refresh token. A no-op without
    /// a ledger, where tokens cannot be invalidated before expiry.
    ///
    /// # Errors
    ///
    /// `Expired`/`InvalidSignature` from refresh verification, or a
    /// ledger failure.
    pub async fn revoke_refresh_token(
        &self,
        refresh_token: &str,
        principal: PrincipalKind,
    ) -> Result<(), AuthError> {
        let claims = self.verify(refresh_token, principal, TokenKind::Refresh)?;
        let Some(ledger) = &self.ledger else {
            warn!("refresh revocation requested but no session ledger is configured");
            return Ok(());
        };
        let session_id =
            Uuid::parse_str(&claims.session_id).map_err(|_| AuthError::InvalidSignature)?;
        ledger.revoke(session_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::MemorySessionLedger;
    use anyhow::Result;

    const NOW: i64 = 1_700_000_000;

    fn engine() -> TokenEngine {
        TokenEngine::new(SecretStore::for_tests())
    }

    #[test]
    fn issue_then_verify_round_trips_claims() -> Result<()> {
        let engine = engine();
        let sub = Uuid::new_v4();

        let token = engine.issue(
            PrincipalKind::User,
            TokenKind::Access,
            sub,
            Some("investor"),
        )?;
        let claims = engine.verify(&token, PrincipalKind::User, TokenKind::Access)?;

        assert_eq!(claims.sub, sub);
        assert_eq!(claims.role.as_deref(), Some("investor"));
        assert_eq!(claims.exp - claims.iat, 900);
        Ok(())
    }

    #[test]
    fn pairs_do_not_cross_verify() -> Result<()> {
        let engine = engine();
        let sub = Uuid::new_v4();

        // Identical payload shape, different signing domain.
        let user_access = engine.issue(PrincipalKind::User, TokenKind::Access, sub, None)?;

        let err = engine
            .verify(&user_access, PrincipalKind::Admin, TokenKind::Access)
            .expect_err("user access must not verify as admin access");
        assert!(matches!(err, AuthError::InvalidSignature));

        let err = engine
            .verify(&user_access, PrincipalKind::User, TokenKind::Refresh)
            .expect_err("access must not verify as refresh");
        assert!(matches!(err, AuthError::InvalidSignature));
        Ok(())
    }

    #[test]
    fn expiry_boundary_is_exact() -> Result<()> {
        let engine = engine();
        let token = engine.issue_at(
            PrincipalKind::User,
            TokenKind::Access,
            Uuid::new_v4(),
            None,
            "jti".to_string(),
            NOW,
        )?;

        // 15 minute ttl: valid at minute 14, expired at minute 16.
        assert!(engine
            .verify_at(&token, PrincipalKind::User, TokenKind::Access, NOW + 14 * 60)
            .is_ok());
        let err = engine
            .verify_at(&token, PrincipalKind::User, TokenKind::Access, NOW + 16 * 60)
            .expect_err("token must expire");
        assert!(matches!(err, AuthError::Expired));
        Ok(())
    }

    #[test]
    fn garbage_tokens_are_invalid_signature() {
        let engine = engine();
        let err = engine
            .verify("not-a-token", PrincipalKind::User, TokenKind::Access)
            .expect_err("garbage must fail");
        assert!(matches!(err, AuthError::InvalidSignature));
    }

    #[test]
    fn non_uuid_subject_is_rejected() -> Result<()> {
        // A structurally valid token with a non-uuid subject must not
        // pass claim extraction.
        let engine = engine();
        let config = SecretStore::for_tests();
        let claims = jwt::JwtClaims {
            sub: "not-a-uuid".to_string(),
            role: None,
            iat: NOW,
            exp: NOW + 900,
            jti: "jti".to_string(),
        };
        let token = jwt::sign_hs256(
            config
                .get(PrincipalKind::User, TokenKind::Access)
                .secret_bytes(),
            &claims,
        )?;
        let err = engine
            .verify_at(&token, PrincipalKind::User, TokenKind::Access, NOW)
            .expect_err("non-uuid sub must fail");
        assert!(matches!(err, AuthError::InvalidSignature));
        Ok(())
    }

    #[tokio::test]
    async fn issue_pair_shares_one_session_id() -> Result<()> {
        let engine = engine();
        let sub = Uuid::new_v4();
        let pair = engine.issue_pair(PrincipalKind::User, sub, None).await?;

        let access = engine.verify(&pair.access, PrincipalKind::User, TokenKind::Access)?;
        let refresh = engine.verify(&pair.refresh, PrincipalKind::User, TokenKind::Refresh)?;
        assert_eq!(access.session_id, refresh.session_id);
        assert_eq!(access.session_id, pair.session_id.to_string());
        Ok(())
    }

    #[tokio::test]
    async fn refresh_mints_new_access_without_rotating_refresh() -> Result<()> {
        let engine = engine();
        let sub = Uuid::new_v4();
        let pair = engine
            .issue_pair(PrincipalKind::User, sub, Some("investor"))
            .await?;

        let access = engine
            .refresh_access_token(&pair.refresh, PrincipalKind::User)
            .await?;
        let claims = engine.verify(&access, PrincipalKind::User, TokenKind::Access)?;
        assert_eq!(claims.sub, sub);
        assert_eq!(claims.role.as_deref(), Some("investor"));
        assert_eq!(claims.session_id, pair.session_id.to_string());

        // The old refresh token keeps working; rotation is explicitly not
        // part of this flow.
        engine
            .refresh_access_token(&pair.refresh, PrincipalKind::User)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rejects_wrong_kind_inputs() -> Result<()> {
        let engine = engine();
        let pair = engine
            .issue_pair(PrincipalKind::User, Uuid::new_v4(), None)
            .await?;

        // Presenting the access token on the refresh path must fail.
        let err = engine
            .refresh_access_token(&pair.access, PrincipalKind::User)
            .await
            .expect_err("access token is not a refresh token");
        assert!(matches!(err, AuthError::InvalidSignature));

        let err = engine
            .refresh_access_token(&pair.refresh, PrincipalKind::Admin)
            .await
            .expect_err("user refresh is not an admin refresh");
        assert!(matches!(err, AuthError::InvalidSignature));
        Ok(())
    }

    #[tokio::test]
    async fn ledger_revocation_blocks_refresh() -> Result<()> {
        let ledger = Arc::new(MemorySessionLedger::new());
        let engine = TokenEngine::new(SecretStore::for_tests()).with_ledger(ledger);
        let pair = engine
            .issue_pair(PrincipalKind::User, Uuid::new_v4(), None)
            .await?;

        // Live session: refresh succeeds.
        engine
            .refresh_access_token(&pair.refresh, PrincipalKind::User)
            .await?;

        engine
            .revoke_refresh_token(&pair.refresh, PrincipalKind::User)
            .await?;

        // Revoked: the signature is still valid but the ledger says no.
        let err = engine
            .refresh_access_token(&pair.refresh, PrincipalKind::User)
            .await
            .expect_err("revoked session must not refresh");
        assert!(matches!(err, AuthError::Unauthenticated));
        Ok(())
    }

    #[tokio::test]
    async fn without_ledger_refresh_survives_revocation() -> Result<()> {
        // The stateless trade-off: no ledger, no server-side revocation.
        let engine = engine();
        let pair = engine
            .issue_pair(PrincipalKind::User, Uuid::new_v4(), None)
            .await?;

        engine
            .revoke_refresh_token(&pair.refresh, PrincipalKind::User)
            .await?;
        engine
            .refresh_access_token(&pair.refresh, PrincipalKind::User)
            .await?;
        Ok(())
    }
}

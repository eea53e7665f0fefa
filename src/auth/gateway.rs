//! Request gateway: bearer extraction, token verification, principal
//! loading.
//!
//! Strict mode rejects before business logic runs; lenient mode leaves
//! "no principal" on the request and lets it proceed. Both treat expired
//! and malformed credentials identically, so an unauthenticated caller
//! learns nothing about why a token was rejected.

use axum::{
    extract::{Extension, Request},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::principal::{PrincipalKind, PrincipalRecord, PrincipalStore};
use crate::auth::token::{TokenEngine, TokenKind};

/// Lenient-mode request extension: present on every request that passed
/// the middleware, holding the principal when one authenticated.
#[derive(Clone, Debug, Default)]
pub struct MaybePrincipal(pub Option<PrincipalRecord>);

pub struct AuthGateway {
    engine: Arc<TokenEngine>,
    principals: Arc<dyn PrincipalStore>,
}

/// Pull the token out of `Authorization: Bearer <token>`.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

impl AuthGateway {
    #[must_use]
    pub fn new(engine: Arc<TokenEngine>, principals: Arc<dyn PrincipalStore>) -> Self {
        Self { engine, principals }
    }

    /// Strict mode: a missing, expired, or malformed credential rejects
    /// the request with the kind-appropriate status.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` (user) or `Forbidden` (admin) for any credential
    /// problem; `NotFound` when the token verifies but its principal was
    /// deleted after issuance — tokens are not invalidated on principal
    /// deletion, so this is caught here instead.
    pub async fn require(
        &self,
        headers: &HeaderMap,
        kind: PrincipalKind,
    ) -> Result<PrincipalRecord, AuthError> {
        let Some(token) = bearer_token(headers) else {
            return Err(rejection(kind));
        };
        let sub = match self.engine.verify(&token, kind, TokenKind::Access) {
            Ok(claims) => claims.sub,
            Err(AuthError::Internal(err)) => return Err(AuthError::Internal(err)),
            // Expired and malformed collapse into one rejection.
            Err(_) => return Err(rejection(kind)),
        };
        self.load_principal(kind, sub).await
    }

    /// Lenient mode: identical extraction and verification, but any
    /// credential problem yields `None` instead of a rejection.
    ///
    /// # Errors
    ///
    /// Only store failures propagate.
    pub async fn optional(
        &self,
        headers: &HeaderMap,
        kind: PrincipalKind,
    ) -> Result<Option<PrincipalRecord>, AuthError> {
        let Some(token) = bearer_token(headers) else {
            return Ok(None);
        };
        let sub = match self.engine.verify(&token, kind, TokenKind::Access) {
            Ok(claims) => claims.sub,
            Err(AuthError::Internal(err)) => return Err(AuthError::Internal(err)),
            Err(_) => return Ok(None),
        };
        match self.load_principal(kind, sub).await {
            Ok(principal) => Ok(Some(principal)),
            Err(AuthError::Internal(err)) => Err(AuthError::Internal(err)),
            Err(_) => Ok(None),
        }
    }

    async fn load_principal(
        &self,
        kind: PrincipalKind,
        id: Uuid,
    ) -> Result<PrincipalRecord, AuthError> {
        match self.principals.find_by_id(kind, id).await? {
            Some(principal) => Ok(principal),
            None => Err(AuthError::NotFound),
        }
    }
}

fn rejection(kind: PrincipalKind) -> AuthError {
    match kind {
        PrincipalKind::User => AuthError::Unauthenticated,
        PrincipalKind::Admin => AuthError::Forbidden,
    }
}

fn error_response(err: &AuthError) -> Response {
    if let AuthError::Internal(inner) = err {
        error!("gateway failure: {inner}");
    }
    (err.status(), err.to_string()).into_response()
}

/// Strict middleware for user routes; attaches the `PrincipalRecord` as
/// a request extension.
pub async fn require_user(
    gateway: Extension<Arc<AuthGateway>>,
    mut request: Request,
    next: Next,
) -> Response {
    match gateway.require(request.headers(), PrincipalKind::User).await {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => error_response(&err),
    }
}

/// Strict middleware for admin routes.
pub async fn require_admin(
    gateway: Extension<Arc<AuthGateway>>,
    mut request: Request,
    next: Next,
) -> Response {
    match gateway.require(request.headers(), PrincipalKind::Admin).await {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => error_response(&err),
    }
}

/// Lenient middleware: always lets the request through, with
/// [`MaybePrincipal`] describing who, if anyone, authenticated.
pub async fn maybe_user(
    gateway: Extension<Arc<AuthGateway>>,
    mut request: Request,
    next: Next,
) -> Response {
    match gateway.optional(request.headers(), PrincipalKind::User).await {
        Ok(principal) => {
            request.extensions_mut().insert(MaybePrincipal(principal));
            next.run(request).await
        }
        Err(err) => error_response(&err),
    }
}

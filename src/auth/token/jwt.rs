//! Minimal HS256 JWT signing and verification.
//!
//! Three base64url segments, HMAC-SHA-256 over `header.claims`, zero
//! clock leeway. Verification takes an explicit `now` so expiry behavior
//! is deterministic under test.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

impl JwtHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JwtClaims {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid key")]
    Key,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Create an HS256 signed token.
///
/// # Errors
///
/// Returns an error if the claims cannot be encoded or the key is
/// rejected by the MAC.
pub fn sign_hs256(secret: &[u8], claims: &JwtClaims) -> Result<String, Error> {
    let header_b64 = b64e_json(&JwtHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::Key)?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an HS256 token and return its decoded claims.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the MAC does not match the given secret,
/// - `exp` is at or before `now_unix_seconds`.
pub fn verify_hs256(
    token: &str,
    secret: &[u8],
    now_unix_seconds: i64,
) -> Result<JwtClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: JwtHeader = b64d_json(header_b64)?;
    if header.alg != "HS256" {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::Key)?;
    mac.update(signing_input.as_bytes());
    // Constant-time comparison inside the MAC verification.
    mac.verify_slice(&signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: JwtClaims = b64d_json(claims_b64)?;
    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"unit-test-secret";
    const NOW: i64 = 1_700_000_000;

    fn test_claims() -> JwtClaims {
        JwtClaims {
            sub: "8e5f0f54-1d9a-4b7e-9a65-0e6cb0c1d0aa".to_string(),
            role: Some("investor".to_string()),
            iat: NOW,
            exp: NOW + 900,
            jti: "session-1".to_string(),
        }
    }

    #[test]
    fn sign_and_verify_round_trips_claims() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &test_claims())?;
        let verified = verify_hs256(&token, SECRET, NOW)?;
        assert_eq!(verified, test_claims());
        Ok(())
    }

    #[test]
    fn signing_is_deterministic() -> Result<(), Error> {
        // HMAC over fixed claims yields a stable token; a changed secret
        // yields a different one.
        let first = sign_hs256(SECRET, &test_claims())?;
        let second = sign_hs256(SECRET, &test_claims())?;
        assert_eq!(first, second);
        let other = sign_hs256(b"other-secret", &test_claims())?;
        assert_ne!(first, other);
        Ok(())
    }

    #[test]
    fn rejects_wrong_secret() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &test_claims())?;
        let result = verify_hs256(&token, b"wrong-secret", NOW);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn rejects_tampered_payload() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &test_claims())?;
        let mut parts: Vec<&str> = token.split('.').collect();

        let mut swapped = test_claims();
        swapped.role = Some("superadmin".to_string());
        let forged = b64e_json(&swapped)?;
        parts[1] = &forged;
        let forged_token = parts.join(".");

        let result = verify_hs256(&forged_token, SECRET, NOW);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn rejects_past_expiry_with_zero_leeway() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &test_claims())?;
        // One second before exp: fine. At exp: rejected.
        assert!(verify_hs256(&token, SECRET, NOW + 899).is_ok());
        let result = verify_hs256(&token, SECRET, NOW + 900);
        assert!(matches!(result, Err(Error::Expired)));
        Ok(())
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(matches!(
            verify_hs256("no-dots-at-all", SECRET, NOW),
            Err(Error::TokenFormat)
        ));
        assert!(matches!(
            verify_hs256("a.b.c.d", SECRET, NOW),
            Err(Error::TokenFormat)
        ));
        assert!(matches!(
            verify_hs256("!!!.???.###", SECRET, NOW),
            Err(Error::Base64)
        ));
    }

    #[test]
    fn rejects_unsupported_algorithm() -> Result<(), Error> {
        // An attacker downgrading to "none" must be rejected on the
        // header, before any signature handling.
        let header = JwtHeader {
            alg: "none".to_string(),
            typ: "JWT".to_string(),
        };
        let token = format!("{}.{}.", b64e_json(&header)?, b64e_json(&test_claims())?);
        let result = verify_hs256(&token, SECRET, NOW);
        assert!(matches!(result, Err(Error::UnsupportedAlg(alg)) if alg == "none"));
        Ok(())
    }

    #[test]
    fn role_claim_is_optional() -> Result<(), Error> {
        let mut claims = test_claims();
        claims.role = None;
        let token = sign_hs256(SECRET, &claims)?;
        let verified = verify_hs256(&token, SECRET, NOW)?;
        assert_eq!(verified.role, None);
        Ok(())
    }
}

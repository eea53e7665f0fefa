//! Session ledger: server-side bookkeeping of issued refresh tokens.
//!
//! The token engine verifies signatures and expiry without this ledger;
//! recording sessions is only needed when refresh tokens must be
//! revocable before their embedded expiry. Rows store a hash of the
//! refresh token, never the raw value.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::principal::PrincipalKind;

#[derive(Clone, Debug)]
pub struct Session {
    pub session_id: Uuid,
    pub principal_id: Uuid,
    pub principal_kind: PrincipalKind,
    pub refresh_hash: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Hash a refresh token for ledger storage and lookup.
#[must_use]
pub fn hash_refresh_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[async_trait]
pub trait SessionLedger: Send + Sync {
    async fn record(&self, session: Session) -> Result<()>;

    /// The session by id, if it is unexpired and the presented refresh
    /// token hashes to the stored value.
    async fn find_live(&self, session_id: Uuid, refresh_hash: &[u8]) -> Result<Option<Session>>;

    /// Returns whether a session was actually removed; revocation is
    /// idempotent.
    async fn revoke(&self, session_id: Uuid) -> Result<bool>;

    async fn sweep_expired(&self) -> Result<u64>;
}

/// In-memory ledger for tests and local runs.
#[derive(Default)]
pub struct MemorySessionLedger {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemorySessionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionLedger for MemorySessionLedger {
    async fn record(&self, session: Session) -> Result<()> {
        self.sessions
            .lock()
            .await
            .insert(session.session_id, session);
        Ok(())
    }

    async fn find_live(&self, session_id: Uuid, refresh_hash: &[u8]) -> Result<Option<Session>> {
        let now = OffsetDateTime::now_utc();
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .get(&session_id)
            .filter(|s| s.expires_at > now && s.refresh_hash == refresh_hash)
            .cloned())
    }

    async fn revoke(&self, session_id: Uuid) -> Result<bool> {
        Ok(self.sessions.lock().await.remove(&session_id).is_some())
    }

    async fn sweep_expired(&self) -> Result<u64> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}

/// Postgres-backed ledger.
pub struct PgSessionLedger {
    pool: PgPool,
}

impl PgSessionLedger {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn kind_from_column(value: &str) -> PrincipalKind {
    match value {
        "admin" => PrincipalKind::Admin,
        _ => PrincipalKind::User,
    }
}

#[async_trait]
impl SessionLedger for PgSessionLedger {
    async fn record(&self, session: Session) -> Result<()> {
        let query = r"
            INSERT INTO refresh_sessions
                (session_id, principal_id, principal_kind, refresh_hash,
                 created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(session.session_id)
            .bind(session.principal_id)
            .bind(session.principal_kind.as_str())
            .bind(&session.refresh_hash)
            .bind(session.created_at)
            .bind(session.expires_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to record refresh session")?;
        Ok(())
    }

    async fn find_live(&self, session_id: Uuid, refresh_hash: &[u8]) -> Result<Option<Session>> {
        let query = r"
            SELECT session_id, principal_id, principal_kind, refresh_hash,
                   created_at, expires_at
            FROM refresh_sessions
            WHERE session_id = $1
              AND refresh_hash = $2
              AND expires_at > NOW()
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(session_id)
            .bind(refresh_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup refresh session")?;

        Ok(row.map(|row| {
            let kind: String = row.get("principal_kind");
            Session {
                session_id: row.get("session_id"),
                principal_id: row.get("principal_id"),
                principal_kind: kind_from_column(&kind),
                refresh_hash: row.get("refresh_hash"),
                created_at: row.get("created_at"),
                expires_at: row.get("expires_at"),
            }
        }))
    }

    async fn revoke(&self, session_id: Uuid) -> Result<bool> {
        let query = "DELETE FROM refresh_sessions WHERE session_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(session_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to revoke refresh session")?;
        Ok(result.rows_affected() > 0)
    }

    async fn sweep_expired(&self) -> Result<u64> {
        let query = "DELETE FROM refresh_sessions WHERE expires_at <= NOW()";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to sweep expired refresh sessions")?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use time::Duration;

    fn session(ttl_seconds: i64) -> Session {
        let now = OffsetDateTime::now_utc();
        Session {
            session_id: Uuid::new_v4(),
            principal_id: Uuid::new_v4(),
            principal_kind: PrincipalKind::User,
            refresh_hash: hash_refresh_token("refresh-token"),
            created_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
        }
    }

    #[test]
    fn refresh_hash_is_stable_and_token_specific() {
        assert_eq!(hash_refresh_token("a"), hash_refresh_token("a"));
        assert_ne!(hash_refresh_token("a"), hash_refresh_token("b"));
    }

    #[test]
    fn kind_column_round_trip() {
        assert_eq!(kind_from_column("user"), PrincipalKind::User);
        assert_eq!(kind_from_column("admin"), PrincipalKind::Admin);
    }

    #[tokio::test]
    async fn find_live_requires_matching_hash() -> Result<()> {
        let ledger = MemorySessionLedger::new();
        let session = session(60);
        let session_id = session.session_id;
        ledger.record(session).await?;

        let found = ledger
            .find_live(session_id, &hash_refresh_token("refresh-token"))
            .await?;
        assert!(found.is_some());

        let found = ledger
            .find_live(session_id, &hash_refresh_token("different-token"))
            .await?;
        assert!(found.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn expired_session_is_not_live() -> Result<()> {
        let ledger = MemorySessionLedger::new();
        let session = session(-1);
        let session_id = session.session_id;
        ledger.record(session).await?;

        let found = ledger
            .find_live(session_id, &hash_refresh_token("refresh-token"))
            .await?;
        assert!(found.is_none());

        assert_eq!(ledger.sweep_expired().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn revoke_is_idempotent() -> Result<()> {
        let ledger = MemorySessionLedger::new();
        let session = session(60);
        let session_id = session.session_id;
        ledger.record(session).await?;

        assert!(ledger.revoke(session_id).await?);
        assert!(!ledger.revoke(session_id).await?);
        assert!(ledger
            .find_live(session_id, &hash_refresh_token("refresh-token"))
            .await?
            .is_none());
        Ok(())
    }
}

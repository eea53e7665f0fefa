//! Principal kinds, channels, and the principal store seam.
//!
//! The platform's user and admin collections live elsewhere; this module
//! only defines what the auth subsystem needs to look one up and flip a
//! channel-verified flag. The in-memory store backs unit tests and local
//! runs without a database.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

/// User vs administrator. Each kind has isolated signing secrets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    Admin,
}

impl PrincipalKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// OTP delivery channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Mobile,
    Email,
}

impl ChannelKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Email => "email",
        }
    }
}

/// The slice of a principal the auth subsystem works with.
#[derive(Clone, Debug)]
pub struct PrincipalRecord {
    pub id: Uuid,
    pub kind: PrincipalKind,
    pub role: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub mobile_verified: bool,
    pub email_verified: bool,
}

impl PrincipalRecord {
    /// Channel identifier for the given kind, if the principal has one.
    #[must_use]
    pub fn channel_value(&self, channel: ChannelKind) -> Option<&str> {
        match channel {
            ChannelKind::Mobile => self.mobile.as_deref(),
            ChannelKind::Email => self.email.as_deref(),
        }
    }

    #[must_use]
    pub fn channel_verified(&self, channel: ChannelKind) -> bool {
        match channel {
            ChannelKind::Mobile => self.mobile_verified,
            ChannelKind::Email => self.email_verified,
        }
    }
}

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn find_by_id(&self, kind: PrincipalKind, id: Uuid) -> Result<Option<PrincipalRecord>>;

    /// Resolve a principal by one of its channel identifiers (normalized
    /// by the caller).
    async fn find_by_channel(
        &self,
        kind: PrincipalKind,
        channel: ChannelKind,
        value: &str,
    ) -> Result<Option<PrincipalRecord>>;

    async fn mark_channel_verified(&self, id: Uuid, channel: ChannelKind) -> Result<()>;
}

/// Postgres-backed principal lookup against the platform's `principals`
/// table.
pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &sqlx::postgres::PgRow, kind: PrincipalKind) -> PrincipalRecord {
    PrincipalRecord {
        id: row.get("id"),
        kind,
        role: row.get("role"),
        mobile: row.get("mobile"),
        email: row.get("email"),
        mobile_verified: row.get("mobile_verified"),
        email_verified: row.get("email_verified"),
    }
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    async fn find_by_id(&self, kind: PrincipalKind, id: Uuid) -> Result<Option<PrincipalRecord>> {
        let query = r"
            SELECT id, role, mobile, email, mobile_verified, email_verified
            FROM principals
            WHERE id = $1 AND kind = $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup principal by id")?;
        Ok(row.map(|row| record_from_row(&row, kind)))
    }

    async fn find_by_channel(
        &self,
        kind: PrincipalKind,
        channel: ChannelKind,
        value: &str,
    ) -> Result<Option<PrincipalRecord>> {
        let query = match channel {
            ChannelKind::Mobile => {
                r"
                SELECT id, role, mobile, email, mobile_verified, email_verified
                FROM principals
                WHERE mobile = $1 AND kind = $2
                LIMIT 1
            "
            }
            ChannelKind::Email => {
                r"
                SELECT id, role, mobile, email, mobile_verified, email_verified
                FROM principals
                WHERE email = $1 AND kind = $2
                LIMIT 1
            "
            }
        };
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(value)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup principal by channel")?;
        Ok(row.map(|row| record_from_row(&row, kind)))
    }

    async fn mark_channel_verified(&self, id: Uuid, channel: ChannelKind) -> Result<()> {
        let query = match channel {
            ChannelKind::Mobile => {
                "UPDATE principals SET mobile_verified = TRUE, updated_at = NOW() WHERE id = $1"
            }
            ChannelKind::Email => {
                "UPDATE principals SET email_verified = TRUE, updated_at = NOW() WHERE id = $1"
            }
        };
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to mark channel verified")?;
        Ok(())
    }
}

/// In-memory principal store for tests and local runs.
#[derive(Default)]
pub struct MemoryPrincipalStore {
    records: Mutex<HashMap<Uuid, PrincipalRecord>>,
}

impl MemoryPrincipalStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: PrincipalRecord) {
        self.records.lock().await.insert(record.id, record);
    }

    pub async fn remove(&self, id: Uuid) {
        self.records.lock().await.remove(&id);
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn find_by_id(&self, kind: PrincipalKind, id: Uuid) -> Result<Option<PrincipalRecord>> {
        let records = self.records.lock().await;
        Ok(records.get(&id).filter(|r| r.kind == kind).cloned())
    }

    async fn find_by_channel(
        &self,
        kind: PrincipalKind,
        channel: ChannelKind,
        value: &str,
    ) -> Result<Option<PrincipalRecord>> {
        let records = self.records.lock().await;
        Ok(records
            .values()
            .find(|r| r.kind == kind && r.channel_value(channel) == Some(value))
            .cloned())
    }

    async fn mark_channel_verified(&self, id: Uuid, channel: ChannelKind) -> Result<()> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(&id) {
            match channel {
                ChannelKind::Mobile => record.mobile_verified = true,
                ChannelKind::Email => record.email_verified = true,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_principal(kind: PrincipalKind) -> PrincipalRecord {
    PrincipalRecord {
        id: Uuid::new_v4(),
        kind,
        role: match kind {
            PrincipalKind::User => None,
            PrincipalKind::Admin => Some("superadmin".to_string()),
        },
        mobile: Some("+46701234567".to_string()),
        email: Some("investor@example.com".to_string()),
        mobile_verified: false,
        email_verified: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn kind_and_channel_names() {
        assert_eq!(PrincipalKind::User.as_str(), "user");
        assert_eq!(PrincipalKind::Admin.as_str(), "admin");
        assert_eq!(ChannelKind::Mobile.as_str(), "mobile");
        assert_eq!(ChannelKind::Email.as_str(), "email");
    }

    #[tokio::test]
    async fn memory_store_round_trip() -> Result<()> {
        let store = MemoryPrincipalStore::new();
        let principal = test_principal(PrincipalKind::User);
        let id = principal.id;
        store.insert(principal).await;

        let found = store
            .find_by_id(PrincipalKind::User, id)
            .await?
            .expect("principal should exist");
        assert_eq!(found.id, id);

        // Wrong kind must not resolve, the collections are disjoint.
        assert!(store.find_by_id(PrincipalKind::Admin, id).await?.is_none());

        let by_mobile = store
            .find_by_channel(PrincipalKind::User, ChannelKind::Mobile, "+46701234567")
            .await?;
        assert!(by_mobile.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn mark_channel_verified_flips_flag() -> Result<()> {
        let store = MemoryPrincipalStore::new();
        let principal = test_principal(PrincipalKind::User);
        let id = principal.id;
        store.insert(principal).await;

        store.mark_channel_verified(id, ChannelKind::Email).await?;
        let found = store
            .find_by_id(PrincipalKind::User, id)
            .await?
            .expect("principal should exist");
        assert!(found.email_verified);
        assert!(!found.mobile_verified);
        Ok(())
    }
}

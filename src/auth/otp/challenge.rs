//! Challenge records and the store seam.
//!
//! One live challenge per (principal, channel); the store upsert is a
//! single atomic check-then-write so two concurrent requests cannot both
//! slip past the resend throttle. The in-memory store serializes through a
//! mutex and backs tests and local runs.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::principal::ChannelKind;

/// A live, hashed, expiring OTP record awaiting verification.
#[derive(Clone, Debug)]
pub struct OtpChallenge {
    pub principal_id: Uuid,
    pub channel: ChannelKind,
    pub channel_value: String,
    pub code_hash: Vec<u8>,
    pub salt: Vec<u8>,
    /// Counts resends and failed verifications; issuance itself does not
    /// count.
    pub attempts: u32,
    pub expires_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields for a fresh (or replacement) challenge. `attempts` and
/// `updated_at` are store-managed.
#[derive(Clone, Debug)]
pub struct NewChallenge {
    pub principal_id: Uuid,
    pub channel: ChannelKind,
    pub channel_value: String,
    pub code_hash: Vec<u8>,
    pub salt: Vec<u8>,
    pub expires_at: OffsetDateTime,
}

/// Atomic outcome of a challenge upsert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Created fresh or replaced an existing live record.
    Accepted,
    /// A live record was updated more recently than the resend interval.
    Throttled { retry_after_seconds: i64 },
    /// The live record already burned through the attempt cap.
    AttemptsExceeded,
}

#[async_trait]
pub trait ChallengeStore: Send + Sync {
    /// Create or replace the challenge for (principal, channel) in one
    /// atomic step. An expired record is treated as absent. A replacement
    /// increments `attempts`; a fresh record starts at 0.
    async fn upsert(
        &self,
        challenge: NewChallenge,
        resend_interval_seconds: i64,
        max_attempts: u32,
    ) -> Result<UpsertOutcome>;

    async fn find(
        &self,
        principal_id: Uuid,
        channel: ChannelKind,
    ) -> Result<Option<OtpChallenge>>;

    /// Atomically increment the attempt counter, returning the new value,
    /// or `None` if the record is gone.
    async fn record_failure(
        &self,
        principal_id: Uuid,
        channel: ChannelKind,
    ) -> Result<Option<u32>>;

    /// Returns whether a record was actually deleted, so an expired
    /// challenge is evicted exactly once.
    async fn delete(&self, principal_id: Uuid, channel: ChannelKind) -> Result<bool>;

    /// Storage hygiene; eviction on the request path stays lazy.
    async fn sweep_expired(&self) -> Result<u64>;
}

/// In-memory challenge store. All mutation happens under one lock, which
/// gives the same atomicity the Postgres store gets from single-statement
/// conditional updates.
#[derive(Default)]
pub struct MemoryChallengeStore {
    records: Mutex<HashMap<(Uuid, ChannelKind), OtpChallenge>>,
}

impl MemoryChallengeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: overwrite a record wholesale, e.g. to back-date expiry.
    #[cfg(test)]
    pub(crate) async fn put_raw(&self, challenge: OtpChallenge) {
        self.records
            .lock()
            .await
            .insert((challenge.principal_id, challenge.channel), challenge);
    }
}

#[async_trait]
impl ChallengeStore for MemoryChallengeStore {
    async fn upsert(
        &self,
        challenge: NewChallenge,
        resend_interval_seconds: i64,
        max_attempts: u32,
    ) -> Result<UpsertOutcome> {
        let now = OffsetDateTime::now_utc();
        let key = (challenge.principal_id, challenge.channel);
        let mut records = self.records.lock().await;

        let attempts = match records.get(&key) {
            Some(existing) if existing.expires_at > now => {
                let since_update = (now - existing.updated_at).whole_seconds();
                if since_update < resend_interval_seconds {
                    return Ok(UpsertOutcome::Throttled {
                        retry_after_seconds: (resend_interval_seconds - since_update).max(1),
                    });
                }
                if existing.attempts >= max_attempts {
                    return Ok(UpsertOutcome::AttemptsExceeded);
                }
                existing.attempts + 1
            }
            // Absent or expired: fresh record, fresh counter.
            _ => 0,
        };

        records.insert(
            key,
            OtpChallenge {
                principal_id: challenge.principal_id,
                channel: challenge.channel,
                channel_value: challenge.channel_value,
                code_hash: challenge.code_hash,
                salt: challenge.salt,
                attempts,
                expires_at: challenge.expires_at,
                updated_at: now,
            },
        );
        Ok(UpsertOutcome::Accepted)
    }

    async fn find(
        &self,
        principal_id: Uuid,
        channel: ChannelKind,
    ) -> Result<Option<OtpChallenge>> {
        let records = self.records.lock().await;
        Ok(records.get(&(principal_id, channel)).cloned())
    }

    async fn record_failure(
        &self,
        principal_id: Uuid,
        channel: ChannelKind,
    ) -> Result<Option<u32>> {
        let mut records = self.records.lock().await;
        Ok(records.get_mut(&(principal_id, channel)).map(|challenge| {
            challenge.attempts += 1;
            challenge.updated_at = OffsetDateTime::now_utc();
            challenge.attempts
        }))
    }

    async fn delete(&self, principal_id: Uuid, channel: ChannelKind) -> Result<bool> {
        let mut records = self.records.lock().await;
        Ok(records.remove(&(principal_id, channel)).is_some())
    }

    async fn sweep_expired(&self) -> Result<u64> {
        let now = OffsetDateTime::now_utc();
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, challenge| challenge.expires_at > now);
        Ok((before - records.len()) as u64)
    }
}

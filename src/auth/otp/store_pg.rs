//! Postgres challenge store.
//!
//! The resend throttle and attempt cap are enforced inside a single
//! conditional upsert, so two concurrent requests for the same
//! (principal, channel) cannot both pass the check-then-write sequence.
//! Schema lives in `migrations/0001_auth.sql`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::principal::ChannelKind;

use super::challenge::{ChallengeStore, NewChallenge, OtpChallenge, UpsertOutcome};

pub struct PgChallengeStore {
    pool: PgPool,
}

impl PgChallengeStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn channel_from_column(value: &str) -> ChannelKind {
    match value {
        "mobile" => ChannelKind::Mobile,
        _ => ChannelKind::Email,
    }
}

#[async_trait]
impl ChallengeStore for PgChallengeStore {
    async fn upsert(
        &self,
        challenge: NewChallenge,
        resend_interval_seconds: i64,
        max_attempts: u32,
    ) -> Result<UpsertOutcome> {
        // Expired rows count as absent: the counter restarts at zero. The
        // WHERE clause makes throttle and cap checks part of the same
        // statement that writes the replacement.
        let query = r"
            INSERT INTO otp_challenges AS c
                (principal_id, channel, channel_value, code_hash, salt, attempts,
                 expires_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6, NOW())
            ON CONFLICT (principal_id, channel) DO UPDATE SET
                channel_value = EXCLUDED.channel_value,
                code_hash = EXCLUDED.code_hash,
                salt = EXCLUDED.salt,
                attempts = CASE
                    WHEN c.expires_at <= NOW() THEN 0
                    ELSE c.attempts + 1
                END,
                expires_at = EXCLUDED.expires_at,
                updated_at = NOW()
            WHERE c.expires_at <= NOW()
               OR (c.updated_at <= NOW() - ($7 * INTERVAL '1 second')
                   AND c.attempts < $8)
            RETURNING attempts
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(challenge.principal_id)
            .bind(challenge.channel.as_str())
            .bind(&challenge.channel_value)
            .bind(&challenge.code_hash)
            .bind(&challenge.salt)
            .bind(challenge.expires_at)
            .bind(resend_interval_seconds)
            .bind(i64::from(max_attempts))
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to upsert otp challenge")?;

        if row.is_some() {
            return Ok(UpsertOutcome::Accepted);
        }

        // The guarded write did nothing, so a live record stands in the
        // way; read it back to report which limit applies.
        let query = r"
            SELECT attempts, updated_at
            FROM otp_challenges
            WHERE principal_id = $1 AND channel = $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(challenge.principal_id)
            .bind(challenge.channel.as_str())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to read back otp challenge")?;

        let Some(row) = row else {
            // Deleted between the two statements; the caller can simply
            // retry after the full interval.
            return Ok(UpsertOutcome::Throttled {
                retry_after_seconds: resend_interval_seconds.max(1),
            });
        };

        let updated_at: OffsetDateTime = row.get("updated_at");
        let since_update = (OffsetDateTime::now_utc() - updated_at).whole_seconds();
        if since_update < resend_interval_seconds {
            return Ok(UpsertOutcome::Throttled {
                retry_after_seconds: (resend_interval_seconds - since_update).max(1),
            });
        }
        Ok(UpsertOutcome::AttemptsExceeded)
    }

    async fn find(
        &self,
        principal_id: Uuid,
        channel: ChannelKind,
    ) -> Result<Option<OtpChallenge>> {
        let query = r"
            SELECT principal_id, channel, channel_value, code_hash, salt,
                   attempts, expires_at, updated_at
            FROM otp_challenges
            WHERE principal_id = $1 AND channel = $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(principal_id)
            .bind(channel.as_str())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to find otp challenge")?;

        Ok(row.map(|row| {
            let channel: String = row.get("channel");
            let attempts: i32 = row.get("attempts");
            OtpChallenge {
                principal_id: row.get("principal_id"),
                channel: channel_from_column(&channel),
                channel_value: row.get("channel_value"),
                code_hash: row.get("code_hash"),
                salt: row.get("salt"),
                attempts: attempts.unsigned_abs(),
                expires_at: row.get("expires_at"),
                updated_at: row.get("updated_at"),
            }
        }))
    }

    async fn record_failure(
        &self,
        principal_id: Uuid,
        channel: ChannelKind,
    ) -> Result<Option<u32>> {
        // The increment must land before the failure is reported, so a
        // replayed request cannot buy extra guesses.
        let query = r"
            UPDATE otp_challenges
            SET attempts = attempts + 1, updated_at = NOW()
            WHERE principal_id = $1 AND channel = $2
            RETURNING attempts
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(principal_id)
            .bind(channel.as_str())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to record otp failure")?;

        Ok(row.map(|row| {
            let attempts: i32 = row.get("attempts");
            attempts.unsigned_abs()
        }))
    }

    async fn delete(&self, principal_id: Uuid, channel: ChannelKind) -> Result<bool> {
        let query = "DELETE FROM otp_challenges WHERE principal_id = $1 AND channel = $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(principal_id)
            .bind(channel.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete otp challenge")?;
        Ok(result.rows_affected() > 0)
    }

    async fn sweep_expired(&self) -> Result<u64> {
        let query = "DELETE FROM otp_challenges WHERE expires_at <= NOW()";
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
            .context("failed to sweep expired otp challenges")?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::channel_from_column;
    use crate::auth::principal::ChannelKind;

    #[test]
    fn channel_column_round_trip() {
        assert_eq!(channel_from_column("mobile"), ChannelKind::Mobile);
        assert_eq!(channel_from_column("email"), ChannelKind::Email);
        assert_eq!(
            channel_from_column(ChannelKind::Mobile.as_str()),
            ChannelKind::Mobile
        );
    }
}

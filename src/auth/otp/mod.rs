//! One-time-passcode engine.
//!
//! Channel-agnostic: mobile and email share the same issuance and
//! verification path, differing only in expiry window. Codes are single
//! use and channel-scoped, hashed at rest, and bounded by a resend
//! throttle plus an attempt cap. The attempt counter starts at zero on
//! issuance and is incremented by resends and failed verifications alike;
//! an expired record is treated as absent on the next request.

pub mod challenge;
mod code;
pub mod notifier;
pub mod store_pg;

pub use challenge::{ChallengeStore, MemoryChallengeStore, OtpChallenge};
pub use notifier::{ConsoleNotifier, Notifier, OtpPurpose};
pub use store_pg::PgChallengeStore;

use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::principal::ChannelKind;

use challenge::{NewChallenge, UpsertOutcome};

const DEFAULT_CODE_LENGTH: usize = 6;
const DEFAULT_MOBILE_TTL_SECONDS: i64 = 5 * 60;
const DEFAULT_EMAIL_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_RESEND_INTERVAL_SECONDS: i64 = 60;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Clone, Debug)]
pub struct OtpConfig {
    code_length: usize,
    mobile_ttl_seconds: i64,
    email_ttl_seconds: i64,
    resend_interval_seconds: i64,
    max_attempts: u32,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: DEFAULT_CODE_LENGTH,
            mobile_ttl_seconds: DEFAULT_MOBILE_TTL_SECONDS,
            email_ttl_seconds: DEFAULT_EMAIL_TTL_SECONDS,
            resend_interval_seconds: DEFAULT_RESEND_INTERVAL_SECONDS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl OtpConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_code_length(mut self, length: usize) -> Self {
        self.code_length = length;
        self
    }

    #[must_use]
    pub fn with_mobile_ttl_seconds(mut self, seconds: i64) -> Self {
        self.mobile_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_email_ttl_seconds(mut self, seconds: i64) -> Self {
        self.email_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_resend_interval_seconds(mut self, seconds: i64) -> Self {
        self.resend_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn ttl_seconds(&self, channel: ChannelKind) -> i64 {
        match channel {
            ChannelKind::Mobile => self.mobile_ttl_seconds,
            ChannelKind::Email => self.email_ttl_seconds,
        }
    }
}

pub struct OtpEngine {
    store: Arc<dyn ChallengeStore>,
    notifier: Arc<dyn Notifier>,
    config: OtpConfig,
}

impl OtpEngine {
    #[must_use]
    pub fn new(store: Arc<dyn ChallengeStore>, notifier: Arc<dyn Notifier>, config: OtpConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    /// Generate and deliver a fresh code for (principal, channel).
    ///
    /// The caller has already resolved `principal_id` to an existing
    /// principal; this engine does not look it up again.
    ///
    /// # Errors
    ///
    /// `Throttled` when the previous code was sent less than the resend
    /// interval ago, `AttemptsExceeded` when the live challenge already
    /// burned its cap. Both clear once the record expires.
    pub async fn request_code(
        &self,
        principal_id: Uuid,
        channel_value: &str,
        channel: ChannelKind,
        purpose: OtpPurpose,
    ) -> Result<(), AuthError> {
        let plaintext = code::generate_code(self.config.code_length);
        let salt = code::generate_salt()?;
        let code_hash = code::hash_code(&salt, &plaintext);
        let expires_at =
            OffsetDateTime::now_utc() + Duration::seconds(self.config.ttl_seconds(channel));

        let outcome = self
            .store
            .upsert(
                NewChallenge {
                    principal_id,
                    channel,
                    channel_value: channel_value.to_string(),
                    code_hash,
                    salt: salt.to_vec(),
                    expires_at,
                },
                self.config.resend_interval_seconds,
                self.config.max_attempts,
            )
            .await?;

        match outcome {
            UpsertOutcome::Accepted => {
                // Fire and forget: a delivery failure does not roll back
                // the stored challenge.
                if let Err(err) = self
                    .notifier
                    .send(channel, channel_value, &plaintext, purpose)
                    .await
                {
                    warn!(
                        channel = channel.as_str(),
                        "failed to deliver otp code: {err}"
                    );
                }
                debug!(
                    %principal_id,
                    channel = channel.as_str(),
                    "otp challenge issued"
                );
                Ok(())
            }
            UpsertOutcome::Throttled {
                retry_after_seconds,
            } => Err(AuthError::Throttled {
                retry_after_seconds,
            }),
            UpsertOutcome::AttemptsExceeded => Err(AuthError::AttemptsExceeded),
        }
    }

    /// Check a submitted code against the live challenge.
    ///
    /// On success the challenge is deleted (single use); what success
    /// means — marking a channel verified, minting tokens — is the
    /// caller's decision.
    ///
    /// # Errors
    ///
    /// `NotFound` without a live challenge, `Expired` past the expiry
    /// (the record is evicted on that path), `AttemptsExceeded` at or
    /// beyond the cap, `InvalidCode` with the remaining budget on a
    /// mismatch. A mismatch that exhausts the cap reports
    /// `AttemptsExceeded`.
    pub async fn verify_code(
        &self,
        principal_id: Uuid,
        channel: ChannelKind,
        submitted: &str,
    ) -> Result<(), AuthError> {
        let Some(challenge) = self.store.find(principal_id, channel).await? else {
            return Err(AuthError::NotFound);
        };

        if challenge.expires_at <= OffsetDateTime::now_utc() {
            // Evict so the stale record cannot be retried; `delete` is
            // idempotent in case a sweep got there first.
            self.store.delete(principal_id, channel).await?;
            return Err(AuthError::Expired);
        }

        let max = self.config.max_attempts;
        if challenge.attempts >= max {
            return Err(AuthError::AttemptsExceeded);
        }

        let submitted_hash = code::hash_code(&challenge.salt, submitted.trim());
        if submitted_hash != challenge.code_hash {
            // Persist the failed attempt before reporting it, so a crash
            // or replay cannot grant extra guesses.
            return match self.store.record_failure(principal_id, channel).await? {
                None => Err(AuthError::NotFound),
                Some(attempts) if attempts >= max => Err(AuthError::AttemptsExceeded),
                Some(attempts) => Err(AuthError::InvalidCode {
                    remaining: max - attempts,
                }),
            };
        }

        self.store.delete(principal_id, channel).await?;
        debug!(
            %principal_id,
            channel = channel.as_str(),
            "otp challenge verified"
        );
        Ok(())
    }
}

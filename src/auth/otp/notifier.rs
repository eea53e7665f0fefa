//! Delivery seam for plaintext codes.
//!
//! Delivery is fire-and-forget: the engine neither retries nor rolls back
//! the challenge record if the transport fails. Callers compensate with a
//! resend.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::principal::ChannelKind;

/// Why a code was requested; carried through to the message template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    /// Proving ownership of a channel after signup or a channel change.
    Verification,
    /// Passcode-backed login.
    Login,
}

impl OtpPurpose {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::Login => "login",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        channel: ChannelKind,
        destination: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<()>;
}

/// Development notifier that prints the code to the log instead of
/// sending it. Not for production use.
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(
        &self,
        channel: ChannelKind,
        destination: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<()> {
        info!(
            channel = channel.as_str(),
            destination = mask_destination(destination),
            purpose = purpose.as_str(),
            "OTP code (dev delivery): {code}"
        );
        Ok(())
    }
}

/// Keep only a recognizable suffix when logging a phone number or email.
pub(crate) fn mask_destination(destination: &str) -> String {
    let visible = 2;
    let len = destination.chars().count();
    if len <= visible {
        return "*".repeat(len);
    }
    let suffix: String = destination
        .chars()
        .skip(len - visible)
        .collect();
    format!("{}{suffix}", "*".repeat(len - visible))
}

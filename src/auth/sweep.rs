//! Low-priority background sweep of expired challenge and session rows.
//!
//! Request-path eviction stays lazy; this loop only keeps storage tidy.
//! Both stores delete conditionally on expiry, so the sweep and a
//! concurrent lazy eviction can never remove the same record twice.

use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, warn};

use crate::auth::otp::ChallengeStore;
use crate::auth::session::SessionLedger;

pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 5 * 60;

/// Spawn the sweep loop. The handle can be dropped; the task runs for
/// the lifetime of the process.
pub fn spawn(
    challenges: Arc<dyn ChallengeStore>,
    sessions: Option<Arc<dyn SessionLedger>>,
    every_seconds: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(every_seconds.max(1)));
        // The first tick fires immediately; skip it so startup is quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match challenges.sweep_expired().await {
                Ok(0) => {}
                Ok(swept) => debug!(swept, "swept expired otp challenges"),
                Err(err) => warn!("otp challenge sweep failed: {err}"),
            }
            if let Some(ledger) = &sessions {
                match ledger.sweep_expired().await {
                    Ok(0) => {}
                    Ok(swept) => debug!(swept, "swept expired refresh sessions"),
                    Err(err) => warn!("refresh session sweep failed: {err}"),
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::otp::MemoryChallengeStore;
    use crate::auth::session::MemorySessionLedger;

    #[tokio::test]
    async fn sweep_task_spawns_and_aborts_cleanly() {
        let challenges: Arc<dyn ChallengeStore> = Arc::new(MemoryChallengeStore::new());
        let sessions: Arc<dyn SessionLedger> = Arc::new(MemorySessionLedger::new());
        let handle = spawn(challenges, Some(sessions), 3600);
        assert!(!handle.is_finished());
        handle.abort();
    }
}

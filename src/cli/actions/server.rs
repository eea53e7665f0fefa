use crate::api;
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::{Context, Result};
use url::Url;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server { port, dsn } => {
            // Fail on a malformed DSN here instead of deep inside the pool.
            Url::parse(&dsn).context("Invalid database DSN")?;

            api::new(port, dsn, globals).await?;
        }
    }

    Ok(())
}

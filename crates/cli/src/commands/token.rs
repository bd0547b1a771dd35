//! Token command - fetch a session credential

use anyhow::Result;
use tracing::info;

use crate::cli::AppContext;

/// Print a fresh credential on stdout so it can be piped
pub async fn execute(app: &AppContext, identity: Option<&str>) -> Result<()> {
    let identity = identity.or(app.config.backend.identity.as_deref());
    info!(identity = ?identity, "requesting token");

    let token = app.backend.fetch_token(identity).await?;
    println!("{}", token);
    Ok(())
}

//! Forward command - move an active call to another number

use anyhow::{anyhow, Result};
use colored::Colorize;
use tracing::info;

use voicehub_core::backend::ForwardRequest;
use voicehub_core::call::Destination;

use crate::cli::AppContext;

pub async fn execute(
    app: &AppContext,
    sid: &str,
    core_number: &str,
    to: &str,
    auth_token: Option<String>,
) -> Result<()> {
    let target = Destination::parse(to)?;
    let bearer = auth_token
        .or_else(|| app.config.calls.forward.auth_token.clone())
        .ok_or_else(|| anyhow!("no bearer token: pass --auth-token or set calls.forward.auth_token"))?;

    let request = ForwardRequest {
        conference_sid: sid.to_string(),
        core_call_number: core_number.to_string(),
        new_number: target.to_string(),
    };
    info!(sid, target = %target, "forwarding call");

    let payload = app.backend.forward_call(&request, &bearer).await?;
    println!("{} {}", "Call forwarded to:".green().bold(), target);
    if !payload.is_null() {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }
    Ok(())
}

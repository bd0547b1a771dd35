//! Calls and messages commands - list filtered history

use anyhow::Result;
use colored::Colorize;

use voicehub_core::history::{filter_calls, filter_messages, HistoryFilter};

use crate::cli::AppContext;
use crate::output;

pub async fn calls(app: &AppContext, filter: &HistoryFilter, limit: u32, json: bool) -> Result<()> {
    let records = app.backend.call_logs(limit).await?;
    let matching = filter_calls(&records, filter);

    if json {
        println!("{}", serde_json::to_string_pretty(&matching)?);
        return Ok(());
    }
    if matching.is_empty() {
        println!("{}", "No calls match.".yellow());
        return Ok(());
    }
    println!("{}", output::calls_table(&matching, app.config.history.utc_offset()?));
    println!("{} of {} calls", matching.len(), records.len());
    Ok(())
}

pub async fn messages(app: &AppContext, filter: &HistoryFilter, json: bool) -> Result<()> {
    let records = app.backend.message_logs().await?;
    let matching = filter_messages(&records, filter);

    if json {
        println!("{}", serde_json::to_string_pretty(&matching)?);
        return Ok(());
    }
    if matching.is_empty() {
        println!("{}", "No messages match.".yellow());
        return Ok(());
    }
    println!("{}", output::messages_table(&matching, app.config.history.utc_offset()?));
    println!("{} of {} messages", matching.len(), records.len());
    Ok(())
}

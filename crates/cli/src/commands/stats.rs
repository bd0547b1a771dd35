//! Stats command - dashboard counters

use anyhow::Result;
use colored::Colorize;

use voicehub_core::history::HistoryStats;

use crate::cli::AppContext;
use crate::output::format_duration;

pub async fn execute(app: &AppContext, limit: u32, json: bool) -> Result<()> {
    let calls = app.backend.call_logs(limit).await?;
    let messages = app.backend.message_logs().await?;
    let stats = HistoryStats::from_records(&calls, &messages);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "VoiceHub statistics".bold());
    println!("  Total calls:     {}", stats.total_calls);
    println!("  Completed:       {}", stats.completed_calls.to_string().green());
    println!("  Failed:          {}", stats.failed_calls.to_string().red());
    println!("  Success rate:    {:.1}%", stats.success_rate());
    println!("  Talk time:       {}", format_duration(stats.talk_time_secs));
    println!("  Total messages:  {}", stats.total_messages);
    Ok(())
}

//! SMS command - send one message

use anyhow::Result;
use colored::Colorize;

use voicehub_core::history::HistoryStore;
use voicehub_core::messaging::MessageDispatcher;

use crate::cli::AppContext;

pub async fn execute(app: &AppContext, to: &str, body: &str) -> Result<()> {
    let history = HistoryStore::new(app.backend.clone(), app.config.history.utc_offset()?, app.events.clone());
    let dispatcher = MessageDispatcher::new(
        app.backend.clone(),
        history,
        app.config.sms_refresh_delay(),
        app.log.clone(),
        app.events.clone(),
    );

    let sid = dispatcher.send(to, body).await?;
    println!("{} {}", "Message sent!".green().bold(), sid);
    Ok(())
}

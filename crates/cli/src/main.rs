//! Main entry point for the `voicehub` command-line client
//!
//! Talks to the VoiceHub backend directly: credentials, SMS, call and
//! message history, statistics and call forwarding.

mod cli;
mod commands;
mod output;

use clap::Parser;
use colored::Colorize;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

//! Check-number command - validate a destination offline

use anyhow::{bail, Result};
use colored::Colorize;

use voicehub_core::call::{Destination, INVALID_DESTINATION_HINT};

pub fn execute(destination: &str) -> Result<()> {
    match Destination::parse(destination) {
        Ok(Destination::Pstn(number)) => {
            println!("{} {} (phone number)", "valid".green().bold(), number);
        }
        Ok(dest @ Destination::Client(_)) => {
            println!(
                "{} {} (client identity '{}')",
                "valid".green().bold(),
                dest,
                dest.identity().unwrap_or_default()
            );
        }
        Err(_) => bail!("{}: {}", destination.trim(), INVALID_DESTINATION_HINT),
    }
    Ok(())
}

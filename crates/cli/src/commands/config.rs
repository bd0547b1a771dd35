//! Config command - show the effective configuration

use anyhow::Result;

use voicehub_core::HubConfig;

pub fn execute(config: &HubConfig) -> Result<()> {
    if let Some(path) = HubConfig::default_path() {
        println!("# default location: {}", path.display());
    }
    print!("{}", config.to_toml_string()?);
    Ok(())
}

//! Print the effective configuration.

use anyhow::{Context, Result};
use mesh_controller::Config;

/// Print the configuration as TOML with the API key masked.
pub fn run(config: &Config) -> Result<()> {
    let rendered = config
        .to_toml_redacted()
        .context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}

//! `clipwire init-config`

use anyhow::{Context, Result};
use clipwire_core::config::ClipwireConfig;

pub fn run() -> Result<()> {
    let path = ClipwireConfig::write_default_if_missing().context("failed to write config")?;
    println!("Config file: {}", path.display());
    Ok(())
}

//! Command implementations

pub mod config;
pub mod pipe;
pub mod replay;

use anyhow::Result;
use bounce_cli::{Overrides, Settings};
use std::path::Path;

/// Load settings, apply flags, validate
pub fn effective_settings(config: Option<&Path>, overrides: &Overrides) -> Result<Settings> {
    let mut settings = Settings::load_or_default(config)?;
    settings.apply(overrides);
    settings.validate()?;
    Ok(settings)
}

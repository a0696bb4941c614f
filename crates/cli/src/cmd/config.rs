//! Configuration command
//!
//! Prints the effective settings and where they came from.

use anyhow::Result;
use bounce_cli::settings::config_file_path;
use bounce_cli::Settings;
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(config: Option<&Path>) -> Result<()> {
    let settings = Settings::load_or_default(config)?;

    println!("{}", "Bounce Configuration".bold());
    match config.map(Path::to_path_buf).or_else(config_file_path) {
        Some(path) if path.exists() => {
            println!("{}: {}\n", "Location".dimmed(), path.display().dimmed());
        }
        Some(path) => {
            println!(
                "{}: {} {}\n",
                "Location".dimmed(),
                path.display().dimmed(),
                "(not found, using defaults)".dimmed()
            );
        }
        None => println!("{}\n", "(no config directory, using defaults)".dimmed()),
    }

    print!("{}", settings.to_toml()?);

    println!("\n{}", "Valid Ranges:".bold());
    println!("  throttle_wait_ms: > 0");
    println!("  max_delay_ms: > 0, or unset for no deadline");

    if let Err(e) = settings.validate() {
        println!("\n{} {:#}", "Warning:".yellow(), e);
    }
    Ok(())
}

//! Replay command

use anyhow::Result;
use bounce_cli::{render, replay, Overrides, Timeline};
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(config: Option<&Path>, overrides: &Overrides, path: &Path, json: bool) -> Result<()> {
    let settings = super::effective_settings(config, overrides)?;
    let timeline = Timeline::load(path)?;
    let bounces = replay(&timeline, &settings)?;

    for bounce in &bounces {
        if json {
            println!("{}", render::json_line(bounce)?);
        } else {
            println!("{}", render::replayed_line(bounce));
        }
    }

    if !json {
        println!(
            "\n{} {} events -> {} bounces",
            "Replayed".bold(),
            timeline.event_count(),
            bounces.len()
        );
    }
    Ok(())
}

//! Output formatting for bounces

use crate::replay::ReplayedBounce;
use anyhow::{Context, Result};
use bounce_core::{Bounce, Trigger};
use owo_colors::OwoColorize;

/// Longest argument list shown before eliding
const MAX_SHOWN_ARGS: usize = 6;

/// One human-readable line for a replayed bounce
pub fn replayed_line(replayed: &ReplayedBounce) -> String {
    let bounce = &replayed.bounce;
    let mut line = format!(
        "{:>8}  {}",
        format!("{}ms", replayed.at_ms).dimmed(),
        describe(bounce)
    );
    if !bounce.meta().is_empty() {
        let kinds: Vec<&str> = bounce.meta().iter().map(String::as_str).collect();
        line.push_str(&format!("  kinds={}", kinds.join(",").dimmed()));
    }
    line
}

/// One human-readable line for a live bounce
pub fn bounce_line<M>(bounce: &Bounce<String, M>) -> String {
    describe(bounce)
}

/// JSON line for any serializable bounce record
pub fn json_line<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("Failed to serialize bounce")
}

fn describe<M>(bounce: &Bounce<String, M>) -> String {
    format!(
        "{}  {}  calls={}  args={}",
        bounce.chain_id().cyan(),
        trigger_label(bounce.trigger()),
        bounce.call_count(),
        format_arguments(bounce.arguments())
    )
}

fn trigger_label(trigger: Trigger) -> String {
    let name = format!("{:<8}", trigger);
    match trigger {
        Trigger::Throttle => name.green().to_string(),
        Trigger::Debounce => name.yellow().to_string(),
        Trigger::Control => name.magenta().to_string(),
        Trigger::Global => name.blue().to_string(),
    }
}

fn format_arguments(args: Option<&[String]>) -> String {
    match args {
        None => "-".to_string(),
        Some(args) if args.len() > MAX_SHOWN_ARGS => {
            format!(
                "[{} … +{}]",
                args[..MAX_SHOWN_ARGS].join(" "),
                args.len() - MAX_SHOWN_ARGS
            )
        }
        Some(args) => format!("[{}]", args.join(" ")),
    }
}

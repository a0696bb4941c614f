//! Deterministic replay of a timeline
//!
//! Runs every step through a bouncer on a [`ManualTimer`], so the output
//! depends only on the script and the settings.

use crate::script::{Action, Timeline};
use crate::settings::{Settings, SplitRule};
use anyhow::Result;
use bounce_core::{Bounce, Bouncer, ChainContext, ManualTimer, Split};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Distinct first arguments ("kinds") seen in a chain
pub type Kinds = BTreeSet<String>;

/// Upper bound on timer tasks run while draining after the last step
const DRAIN_LIMIT: usize = 100_000;

/// A bounce with its simulated commit time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayedBounce {
    pub at_ms: u64,
    #[serde(flatten)]
    pub bounce: Bounce<String, Kinds>,
}

/// Replay `timeline` and collect every bounce in commit order
///
/// Without a trailing `!end` the clock keeps running until no timer is
/// outstanding, so the last chain always settles.
pub fn replay(timeline: &Timeline, settings: &Settings) -> Result<Vec<ReplayedBounce>> {
    settings.validate()?;

    let timer = Arc::new(ManualTimer::new());
    let (tx, rx) = crossbeam_channel::unbounded();

    let clock = timer.clone();
    let rule = settings.split.clone();
    let bouncer: Bouncer<String, Kinds> = Bouncer::builder(
        settings.bounce.throttle_wait(),
        move |bounce: Bounce<String, Kinds>| {
            let at_ms = millis(clock.elapsed());
            // Receiver outlives the bouncer
            let _ = tx.send(ReplayedBounce { at_ms, bounce });
        },
    )
    .options(&settings.bounce)
    .control(move |ctx, split| classify(&rule, ctx, split))
    .timer(timer.clone())
    .build()?;

    for step in timeline.steps() {
        timer.advance_to(step.at);
        match &step.action {
            Action::Event(words) => bouncer.fire(words.clone()),
            Action::Cancel => {
                if !bouncer.cancel() {
                    debug!(line = step.line, "cancel ignored: already cancelled");
                }
            }
            Action::Resume => {
                if !bouncer.resume() {
                    debug!(line = step.line, "resume ignored: not cancelled");
                }
            }
            Action::Bounce { force } => {
                if !bouncer.bounce(*force) {
                    debug!(line = step.line, force, "bounce ignored");
                }
            }
            Action::End => break,
        }
    }

    if !timeline.has_end() {
        let ran = timer.run_until_idle(DRAIN_LIMIT);
        debug!(ran, "drained outstanding timers");
    }
    drop(bouncer);

    let bounces: Vec<ReplayedBounce> = rx.try_iter().collect();
    info!(
        "Replayed {} events into {} bounces",
        timeline.event_count(),
        bounces.len()
    );
    Ok(bounces)
}

/// Control hook: aggregate kinds, split on the configured word
fn classify(rule: &SplitRule, ctx: &mut ChainContext<String, Kinds>, split: &Split) {
    let Some(kind) = ctx.arguments().and_then(|args| args.first()).cloned() else {
        return;
    };

    if rule.on.as_deref() == Some(kind.as_str())
        && split.request(rule.include_current)
        && !rule.include_current
    {
        // Event moves to the next chain; it is counted there
        return;
    }
    ctx.meta_mut().insert(kind);
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

//! Timeline scripts
//!
//! One step per line:
//! ```text
//! # comment
//! 0     save a.txt      event with arguments ["save", "a.txt"]
//! 30    save b.txt
//! 500   !bounce         manual bounce (no force)
//! 600   !flush          manual bounce with force
//! 700   !cancel
//! 800   !resume
//! 2000  !end            run the clock to 2000ms and stop
//! ```
//! Times are milliseconds from the start and must not decrease.

use anyhow::{Context, Result};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// What happens at a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Event carrying the remaining words as arguments
    Event(Vec<String>),
    Cancel,
    Resume,
    /// Manual bounce; `force` commits even an empty chain
    Bounce { force: bool },
    /// Stop the replay at this time
    End,
}

/// A timed action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Offset from the start of the replay
    pub at: Duration,
    pub action: Action,
    /// 1-based source line
    pub line: usize,
}

/// Parsed timeline script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    steps: Vec<Step>,
}

impl Timeline {
    /// Read and parse a script file
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read timeline {}", path.display()))?;
        source
            .parse()
            .with_context(|| format!("Invalid timeline {}", path.display()))
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Whether the script ends with an explicit `!end`
    pub fn has_end(&self) -> bool {
        matches!(self.steps.last(), Some(Step { action: Action::End, .. }))
    }

    /// Number of event steps
    pub fn event_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step.action, Action::Event(_)))
            .count()
    }
}

impl FromStr for Timeline {
    type Err = anyhow::Error;

    fn from_str(source: &str) -> Result<Self> {
        let mut steps: Vec<Step> = Vec::new();

        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let content = match raw.find('#') {
                Some(pos) => &raw[..pos],
                None => raw,
            };
            let mut words = content.split_whitespace();
            let Some(time) = words.next() else {
                continue;
            };

            let ms: u64 = time
                .parse()
                .with_context(|| format!("line {}: invalid time '{}'", line, time))?;
            let at = Duration::from_millis(ms);

            if let Some(previous) = steps.last() {
                if previous.action == Action::End {
                    anyhow::bail!("line {}: step after !end", line);
                }
                if at < previous.at {
                    anyhow::bail!(
                        "line {}: time {}ms is before the previous step ({}ms)",
                        line,
                        ms,
                        previous.at.as_millis()
                    );
                }
            }

            let rest: Vec<String> = words.map(str::to_string).collect();
            let action = parse_action(line, rest)?;
            steps.push(Step { at, action, line });
        }

        Ok(Self { steps })
    }
}

fn parse_action(line: usize, words: Vec<String>) -> Result<Action> {
    let Some(directive) = words.first().and_then(|w| w.strip_prefix('!')) else {
        return Ok(Action::Event(words));
    };
    if words.len() > 1 {
        anyhow::bail!("line {}: directive !{} takes no arguments", line, directive);
    }

    let action = match directive {
        "cancel" => Action::Cancel,
        "resume" => Action::Resume,
        "bounce" => Action::Bounce { force: false },
        "flush" => Action::Bounce { force: true },
        "end" => Action::End,
        other => anyhow::bail!("line {}: unknown directive !{}", line, other),
    };
    Ok(action)
}

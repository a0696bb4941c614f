//! Library side of the `bounce` command
//!
//! - `script`: timeline scripts for deterministic replay
//! - `settings`: TOML settings and command-line overrides
//! - `replay`: run a timeline through a bouncer on a simulated clock
//! - `render`: human and JSON output

pub mod render;
pub mod replay;
pub mod script;
pub mod settings;

pub use replay::{replay, ReplayedBounce};
pub use script::{Action, Step, Timeline};
pub use settings::{Overrides, Settings, SplitRule};

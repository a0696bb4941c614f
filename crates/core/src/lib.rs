//! Event-chain coalescing for Bounce
//!
//! This crate provides:
//! - `Bouncer`: collapses bursts of events into one downstream "bounce"
//! - Sliding throttle window with drift correction
//! - Absolute max-delay deadline per event-chain
//! - Control hook with chain splitting
//! - Pluggable timer hosts (tokio-backed and a manual simulated clock)

pub mod bouncer;
pub mod config;
pub mod context;
pub mod error;
pub mod manual;
pub mod timer;
pub mod tokio_timer;

// Re-exports
pub use bouncer::{Bouncer, BouncerBuilder, ScopedBounce};
pub use config::BounceOptions;
pub use context::{Bounce, ChainContext, ChainId, Split, Trigger};
pub use error::{Error, Result};
pub use manual::ManualTimer;
pub use timer::{TimerHost, TimerId, TimerTask};
pub use tokio_timer::TokioTimer;

//! Channel coalescing for Bounce
//!
//! This crate provides:
//! - An async ingress adapter that feeds a `tokio::sync::mpsc` channel of
//!   events into a bouncer
//! - Committed chains delivered on an output channel
//! - Flush of the pending chain when the input closes

pub mod coalesce;

pub use coalesce::{spawn_coalescer, Coalescer};

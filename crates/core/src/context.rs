//! Event-chain context types
//!
//! A chain is the run of events between two bounces. While it is open its
//! state lives in a [`ChainContext`]; when it commits the context is frozen
//! into an owned [`Bounce`] and handed to the callback.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;

/// Generation id of an event-chain
///
/// Strictly increasing per bouncer. Timer tasks and scoped handles capture
/// the id they were created for and do nothing once it is superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(u64);

impl ChainId {
    pub(crate) const FIRST: ChainId = ChainId(1);

    pub(crate) fn next(self) -> ChainId {
        ChainId(self.0 + 1)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain-{}", self.0)
    }
}

/// Reason a chain was committed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Quiet window elapsed
    Throttle,
    /// Max-delay deadline reached
    Debounce,
    /// Split requested by the control hook
    Control,
    /// Manual bounce
    Global,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::Throttle => "throttle",
            Trigger::Debounce => "debounce",
            Trigger::Control => "control",
            Trigger::Global => "global",
        };
        f.pad(name)
    }
}

/// Live state of the open chain, as seen by the control hook
#[derive(Debug)]
pub struct ChainContext<A, M> {
    chain_id: ChainId,
    call_count: usize,
    arguments: Option<Vec<A>>,
    meta: M,
}

impl<A, M: Default> ChainContext<A, M> {
    pub(crate) fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            call_count: 0,
            arguments: None,
            meta: M::default(),
        }
    }
}

impl<A, M> ChainContext<A, M> {
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Number of events accepted into this chain so far
    pub fn call_count(&self) -> usize {
        self.call_count
    }

    /// Arguments of the latest event, if any
    pub fn arguments(&self) -> Option<&[A]> {
        self.arguments.as_deref()
    }

    /// Caller-defined metadata aggregated over the chain
    pub fn meta(&self) -> &M {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut M {
        &mut self.meta
    }

    /// Record an event, returning the arguments it replaced
    pub(crate) fn record(&mut self, args: Vec<A>) -> Option<Vec<A>> {
        self.call_count += 1;
        self.arguments.replace(args)
    }

    /// Undo the latest `record`, handing back the event's arguments
    pub(crate) fn unrecord(&mut self, previous: Option<Vec<A>>) -> Option<Vec<A>> {
        self.call_count = self.call_count.saturating_sub(1);
        std::mem::replace(&mut self.arguments, previous)
    }

    pub(crate) fn freeze(self, trigger: Trigger) -> Bounce<A, M> {
        Bounce {
            chain_id: self.chain_id,
            trigger,
            call_count: self.call_count,
            arguments: self.arguments,
            meta: self.meta,
        }
    }
}

/// A committed chain
///
/// Owned by the callback; the bouncer keeps no reference to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bounce<A, M = ()> {
    chain_id: ChainId,
    trigger: Trigger,
    call_count: usize,
    arguments: Option<Vec<A>>,
    meta: M,
}

impl<A, M> Bounce<A, M> {
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    pub fn call_count(&self) -> usize {
        self.call_count
    }

    /// Arguments of the last event in the chain
    pub fn arguments(&self) -> Option<&[A]> {
        self.arguments.as_deref()
    }

    pub fn meta(&self) -> &M {
        &self.meta
    }

    pub fn into_arguments(self) -> Option<Vec<A>> {
        self.arguments
    }

    pub fn into_meta(self) -> M {
        self.meta
    }
}

/// Split capability handed to one control-hook invocation
///
/// Only one request is honoured per invocation. The hook borrows it, so it
/// cannot be kept and used against a later chain.
#[derive(Debug)]
pub struct Split {
    first_event: bool,
    requested: Cell<Option<bool>>,
}

impl Split {
    pub(crate) fn new(call_count: usize) -> Self {
        Self {
            first_event: call_count <= 1,
            requested: Cell::new(None),
        }
    }

    /// Ask the bouncer to commit the chain now
    ///
    /// With `include_current` the triggering event stays in the committed
    /// chain; without it the event is rolled back and replayed as the first
    /// event of the next chain. Returns `false` if a split was already
    /// requested in this invocation, or if excluding the current event would
    /// leave nothing to commit.
    ///
    /// Only the call count and arguments are rolled back when the event is
    /// excluded. The metadata is left as the hook leaves it, and the hook
    /// runs again for the replayed event in the next chain, so a hook that
    /// aggregates should skip the event once `request(false)` succeeds:
    ///
    /// ```ignore
    /// if is_boundary(ctx) && split.request(false) {
    ///     return; // counted when replayed into the next chain
    /// }
    /// ctx.meta_mut().insert(kind);
    /// ```
    pub fn request(&self, include_current: bool) -> bool {
        if self.requested.get().is_some() {
            return false;
        }
        if !include_current && self.first_event {
            return false;
        }
        self.requested.set(Some(include_current));
        true
    }

    pub(crate) fn requested(&self) -> Option<bool> {
        self.requested.get()
    }
}

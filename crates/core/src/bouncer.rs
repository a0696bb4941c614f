//! Event-chain bouncer
//!
//! Collapses a burst of events into a single callback invocation (a
//! "bounce"). Two timers compete to end the current chain:
//! - throttle: a sliding quiet window, restarted by every event
//! - max delay: an absolute deadline from the chain's first event
//!
//! A control hook may inspect every event and split the chain early.
//!
//! State machine per bouncer:
//! ```text
//! Cancelled <-> Active            (cancel / resume)
//! Active: Empty -> Pending -> commit -> Empty (next generation)
//! ```
//!
//! Every entry point (event, cancel, resume, bounce, timer fire) holds a
//! re-entrant lock for its whole synchronous run, so calls from different
//! threads never interleave. The callback and the control hook run under
//! that lock but without any borrow of the state, so they may call back
//! into the bouncer on the same thread.
//!
//! Commits are queued and handed to the callback, in commit order, once the
//! entry point that produced them has finished its own state changes. A
//! split therefore replays its event into the next chain before the
//! callback sees the split-off chain.
//!
//! A panic in the callback or the hook is not caught. It propagates to the
//! caller of the entry point that triggered it (for a timer-fired commit,
//! the timer host). The chain has already been replaced when the callback
//! runs, so a panicking callback loses nothing but its own bounce; bounces
//! still queued behind it go out with the next entry point.

use crate::config::{validate_max_delay, validate_throttle_wait, BounceOptions};
use crate::context::{Bounce, ChainContext, ChainId, Split, Trigger};
use crate::timer::{millis, TimerHost, TimerId};
use crate::tokio_timer::TokioTimer;
use crate::Result;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

type Callback<A, M> = Arc<dyn Fn(Bounce<A, M>) + Send + Sync>;
type ControlHook<A, M> = Arc<dyn Fn(&mut ChainContext<A, M>, &Split) + Send + Sync>;

/// Handle to a bouncer
///
/// Cloning is cheap; all clones drive the same chain. Dropping the last
/// clone cancels any outstanding timers.
pub struct Bouncer<A, M = ()> {
    shared: Arc<Shared<A, M>>,
}

/// Configuration for a [`Bouncer`]
pub struct BouncerBuilder<A, M = ()> {
    throttle_wait: Duration,
    max_delay: Option<Duration>,
    callback: Callback<A, M>,
    control: Option<ControlHook<A, M>>,
    timer: Option<Arc<dyn TimerHost>>,
}

/// Bounce entry point bound to one chain generation
///
/// Inert once that generation has committed or been discarded.
pub struct ScopedBounce<A, M = ()> {
    shared: Weak<Shared<A, M>>,
    chain: ChainId,
}

struct Shared<A, M> {
    state: ReentrantMutex<RefCell<State<A, M>>>,
    callback: Callback<A, M>,
    control: Option<ControlHook<A, M>>,
    throttle_wait: Duration,
    max_delay: Option<Duration>,
    timer: Arc<dyn TimerHost>,
}

struct State<A, M> {
    /// Survives chain generations until `resume`
    cancelled: bool,
    chain: Chain<A, M>,
    /// Committed chains not yet handed to the callback
    outbox: VecDeque<Bounce<A, M>>,
    delivering: bool,
}

/// One chain generation
struct Chain<A, M> {
    id: ChainId,
    /// `None` while lent to the control hook
    context: Option<ChainContext<A, M>>,
    got_any_event: bool,
    throttle_deadline: Option<Instant>,
    throttle_timer: Option<TimerId>,
    max_delay_timer: Option<TimerId>,
}

impl<A, M: Default> Chain<A, M> {
    fn new(id: ChainId) -> Self {
        Self {
            id,
            context: Some(ChainContext::new(id)),
            got_any_event: false,
            throttle_deadline: None,
            throttle_timer: None,
            max_delay_timer: None,
        }
    }
}

impl<A, M> Chain<A, M> {
    fn take_timers(&mut self) -> impl Iterator<Item = TimerId> {
        [self.throttle_timer.take(), self.max_delay_timer.take()]
            .into_iter()
            .flatten()
    }
}

impl<A, M> Bouncer<A, M>
where
    A: Send + 'static,
    M: Default + Send + 'static,
{
    /// Start configuring a bouncer
    ///
    /// `callback` receives every committed chain, exactly once per chain.
    pub fn builder<F>(throttle_wait: Duration, callback: F) -> BouncerBuilder<A, M>
    where
        F: Fn(Bounce<A, M>) + Send + Sync + 'static,
    {
        BouncerBuilder {
            throttle_wait,
            max_delay: None,
            callback: Arc::new(callback),
            control: None,
            timer: None,
        }
    }

    /// Feed one event into the current chain
    ///
    /// Ignored while cancelled.
    pub fn fire(&self, args: Vec<A>) {
        let guard = self.shared.state.lock();
        self.shared.ingest(&guard, args);
        self.shared.deliver(&guard);
    }

    /// Feed a single-argument event
    pub fn fire_one(&self, arg: A) {
        self.fire(vec![arg]);
    }

    /// Discard the pending chain and ignore events until `resume`
    ///
    /// Returns `false` if already cancelled.
    pub fn cancel(&self) -> bool {
        let guard = self.shared.state.lock();
        let mut state = guard.borrow_mut();
        if state.cancelled {
            return false;
        }
        state.cancelled = true;
        let discarded = state.chain.id;
        self.shared.reset(&mut state);
        debug!(chain = %discarded, "bouncer cancelled, pending chain discarded");
        true
    }

    /// Accept events again after `cancel`
    ///
    /// Returns `false` if not cancelled.
    pub fn resume(&self) -> bool {
        let guard = self.shared.state.lock();
        let mut state = guard.borrow_mut();
        if !state.cancelled {
            return false;
        }
        state.cancelled = false;
        debug!(chain = %state.chain.id, "bouncer resumed");
        true
    }

    /// Commit the current chain now
    ///
    /// Without `force` an empty chain is left alone. Returns whether the
    /// chain was committed.
    pub fn bounce(&self, force: bool) -> bool {
        let guard = self.shared.state.lock();
        let id = guard.borrow().chain.id;
        let committed = self.shared.bounce_chain(&guard, id, force);
        self.shared.deliver(&guard);
        committed
    }

    /// Bounce handle bound to the current chain generation
    pub fn scoped(&self) -> ScopedBounce<A, M> {
        let guard = self.shared.state.lock();
        let chain = guard.borrow().chain.id;
        ScopedBounce {
            shared: Arc::downgrade(&self.shared),
            chain,
        }
    }

    /// Generation id of the open chain
    pub fn chain_id(&self) -> ChainId {
        let guard = self.shared.state.lock();
        let id = guard.borrow().chain.id;
        id
    }

    /// Whether the open chain has received any event
    pub fn is_pending(&self) -> bool {
        let guard = self.shared.state.lock();
        let pending = guard.borrow().chain.got_any_event;
        pending
    }

    pub fn is_cancelled(&self) -> bool {
        let guard = self.shared.state.lock();
        let cancelled = guard.borrow().cancelled;
        cancelled
    }
}

impl<A, M> Clone for Bouncer<A, M> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<A, M> fmt::Debug for Bouncer<A, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bouncer")
            .field("throttle_wait", &self.shared.throttle_wait)
            .field("max_delay", &self.shared.max_delay)
            .field("control", &self.shared.control.is_some())
            .finish_non_exhaustive()
    }
}

impl<A, M> BouncerBuilder<A, M>
where
    A: Send + 'static,
    M: Default + Send + 'static,
{
    /// Absolute deadline per chain, measured from its first event
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Take both windows from `options`
    pub fn options(mut self, options: &BounceOptions) -> Self {
        self.throttle_wait = options.throttle_wait();
        self.max_delay = options.max_delay();
        self
    }

    /// Hook invoked synchronously for every accepted event
    ///
    /// The hook may aggregate into the context's metadata and request a
    /// split through the [`Split`] capability.
    pub fn control<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut ChainContext<A, M>, &Split) + Send + Sync + 'static,
    {
        self.control = Some(Arc::new(hook));
        self
    }

    /// Timer host to schedule on (default: tokio runtime of the caller)
    pub fn timer(mut self, host: Arc<dyn TimerHost>) -> Self {
        self.timer = Some(host);
        self
    }

    pub fn build(self) -> Result<Bouncer<A, M>> {
        validate_throttle_wait(self.throttle_wait)?;
        if let Some(max_delay) = self.max_delay {
            validate_max_delay(max_delay)?;
        }

        let timer: Arc<dyn TimerHost> = match self.timer {
            Some(timer) => timer,
            None => Arc::new(TokioTimer::current()?),
        };

        let shared = Shared {
            state: ReentrantMutex::new(RefCell::new(State {
                cancelled: false,
                chain: Chain::new(ChainId::FIRST),
                outbox: VecDeque::new(),
                delivering: false,
            })),
            callback: self.callback,
            control: self.control,
            throttle_wait: self.throttle_wait,
            max_delay: self.max_delay,
            timer,
        };

        Ok(Bouncer {
            shared: Arc::new(shared),
        })
    }
}

impl<A, M> ScopedBounce<A, M>
where
    A: Send + 'static,
    M: Default + Send + 'static,
{
    /// Commit the bound chain if it is still open
    pub fn bounce(&self, force: bool) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let guard = shared.state.lock();
        let committed = shared.bounce_chain(&guard, self.chain, force);
        shared.deliver(&guard);
        committed
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain
    }
}

impl<A, M> Clone for ScopedBounce<A, M> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            chain: self.chain,
        }
    }
}

impl<A, M> Shared<A, M>
where
    A: Send + 'static,
    M: Default + Send + 'static,
{
    /// Ingress: record the event, consult the hook, feed the timers
    fn ingest(self: &Arc<Self>, cell: &RefCell<State<A, M>>, args: Vec<A>) {
        let (id, previous) = {
            let mut state = cell.borrow_mut();
            if state.cancelled {
                trace!("event ignored: bouncer cancelled");
                return;
            }
            let chain = &mut state.chain;
            let Some(context) = chain.context.as_mut() else {
                warn!(chain = %chain.id, "event ignored: fired from inside the control hook");
                return;
            };
            chain.got_any_event = true;
            let previous = context.record(args);
            trace!(chain = %chain.id, calls = context.call_count(), "event recorded");
            (chain.id, previous)
        };

        if let Some(hook) = &self.control {
            if self.run_control(cell, hook, id, previous) {
                return;
            }
        }

        if self.throttle(cell, id) {
            return;
        }
        self.arm_max_delay(cell, id);
    }

    /// Run the control hook; returns `true` if the chain was split or
    /// replaced while the hook ran
    fn run_control(
        self: &Arc<Self>,
        cell: &RefCell<State<A, M>>,
        hook: &ControlHook<A, M>,
        id: ChainId,
        previous: Option<Vec<A>>,
    ) -> bool {
        let Some(mut lent) = LentContext::take(cell, id) else {
            return true;
        };
        let split = match lent.context.as_mut() {
            Some(context) => {
                let split = Split::new(context.call_count());
                hook(context, &split);
                split
            }
            None => return true,
        };
        if !lent.restore() {
            debug!(chain = %id, "chain replaced while the control hook ran");
            return true;
        }

        let Some(include_current) = split.requested() else {
            return false;
        };

        let replay = if include_current {
            None
        } else {
            let mut state = cell.borrow_mut();
            state
                .chain
                .context
                .as_mut()
                .and_then(|context| context.unrecord(previous))
        };

        debug!(chain = %id, include_current, "control hook split the chain");
        self.commit(cell, id, Trigger::Control);

        if let Some(args) = replay {
            self.ingest(cell, args);
        }
        true
    }

    /// Throttle step for an accepted event; returns `true` if it committed
    fn throttle(self: &Arc<Self>, cell: &RefCell<State<A, M>>, id: ChainId) -> bool {
        let now = self.timer.now();
        let overdue = {
            let mut state = cell.borrow_mut();
            let chain = &mut state.chain;
            if chain.id != id {
                return true;
            }
            match (chain.throttle_timer, chain.throttle_deadline) {
                // The check should already have fired; the host is late
                (Some(_), Some(deadline)) if now >= deadline => Some(now - deadline),
                (Some(_), Some(deadline)) => {
                    let overtime = self.throttle_wait.saturating_sub(deadline - now);
                    chain.throttle_deadline = Some(deadline + overtime);
                    None
                }
                _ => {
                    chain.throttle_deadline = Some(now + self.throttle_wait);
                    chain.throttle_timer = Some(self.schedule_throttle(id, self.throttle_wait));
                    None
                }
            }
        };

        match overdue {
            Some(late) => {
                debug!(
                    chain = %id,
                    late_ms = millis(late),
                    "throttle deadline missed, committing"
                );
                self.commit(cell, id, Trigger::Throttle);
                true
            }
            None => false,
        }
    }

    fn schedule_throttle(self: &Arc<Self>, id: ChainId, delay: Duration) -> TimerId {
        let weak = Arc::downgrade(self);
        self.timer.schedule(
            delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_throttle_timer(id);
                }
            }),
        )
    }

    fn on_throttle_timer(self: &Arc<Self>, id: ChainId) {
        let guard = self.state.lock();
        let now = self.timer.now();
        let expired = {
            let mut state = guard.borrow_mut();
            if state.cancelled || state.chain.id != id {
                trace!(chain = %id, "stale throttle timer");
                return;
            }
            let chain = &mut state.chain;
            chain.throttle_timer = None;
            match chain.throttle_deadline {
                Some(deadline) if deadline > now => {
                    let delay = (deadline - now).min(self.throttle_wait);
                    chain.throttle_timer = Some(self.schedule_throttle(id, delay));
                    trace!(chain = %id, delay_ms = millis(delay), "throttle window extended");
                    false
                }
                _ => true,
            }
        };

        if expired {
            self.commit(&guard, id, Trigger::Throttle);
            self.deliver(&guard);
        }
    }

    /// Arm the max-delay deadline once per chain
    fn arm_max_delay(self: &Arc<Self>, cell: &RefCell<State<A, M>>, id: ChainId) {
        let Some(max_delay) = self.max_delay else {
            return;
        };
        let mut state = cell.borrow_mut();
        let chain = &mut state.chain;
        if chain.id != id || chain.max_delay_timer.is_some() {
            return;
        }

        let weak = Arc::downgrade(self);
        chain.max_delay_timer = Some(self.timer.schedule(
            max_delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_max_delay_timer(id);
                }
            }),
        ));
    }

    fn on_max_delay_timer(self: &Arc<Self>, id: ChainId) {
        let guard = self.state.lock();
        {
            let mut state = guard.borrow_mut();
            if state.cancelled || state.chain.id != id {
                trace!(chain = %id, "stale max-delay timer");
                return;
            }
            state.chain.max_delay_timer = None;
        }
        self.commit(&guard, id, Trigger::Debounce);
        self.deliver(&guard);
    }

    fn bounce_chain(
        self: &Arc<Self>,
        cell: &RefCell<State<A, M>>,
        id: ChainId,
        force: bool,
    ) -> bool {
        {
            let state = cell.borrow();
            if state.cancelled || state.chain.id != id {
                return false;
            }
            if !force && !state.chain.got_any_event {
                trace!(chain = %id, "bounce skipped: no events");
                return false;
            }
        }
        self.commit(cell, id, Trigger::Global)
    }

    /// Commit chain `id` at most once, then open the next generation
    ///
    /// The frozen chain is queued; `deliver` hands it to the callback.
    fn commit(&self, cell: &RefCell<State<A, M>>, id: ChainId, trigger: Trigger) -> bool {
        let bounce = {
            let mut state = cell.borrow_mut();
            if state.cancelled {
                trace!(chain = %id, %trigger, "commit ignored: cancelled");
                return false;
            }
            if state.chain.id != id {
                trace!(chain = %id, %trigger, "commit ignored: chain already superseded");
                return false;
            }
            let Some(context) = state.chain.context.take() else {
                warn!(chain = %id, %trigger, "commit ignored: chain is lent to the control hook");
                return false;
            };
            self.reset(&mut state);
            context.freeze(trigger)
        };

        debug!(
            chain = %bounce.chain_id(),
            %trigger,
            calls = bounce.call_count(),
            "bounce"
        );
        cell.borrow_mut().outbox.push_back(bounce);
        true
    }

    /// Run the callback for every queued bounce, oldest first
    ///
    /// Only the outermost delivery on the stack runs; bounces committed by
    /// re-entrant calls from the callback join its queue. Nothing goes out
    /// while the control hook holds the context, the entry point that ran
    /// the hook delivers afterwards.
    fn deliver(&self, cell: &RefCell<State<A, M>>) {
        {
            let mut state = cell.borrow_mut();
            if state.delivering || state.outbox.is_empty() || state.chain.context.is_none() {
                return;
            }
            state.delivering = true;
        }
        let _delivering = Delivering { cell };

        loop {
            let next = cell.borrow_mut().outbox.pop_front();
            let Some(bounce) = next else {
                break;
            };
            (self.callback)(bounce);
        }
    }
}

impl<A, M: Default> Shared<A, M> {
    /// Cancel the chain's timers and open a fresh generation
    fn reset(&self, state: &mut State<A, M>) {
        for timer in state.chain.take_timers() {
            self.timer.cancel(timer);
        }
        let next = state.chain.id.next();
        state.chain = Chain::new(next);
        trace!(chain = %next, "chain opened");
    }
}

impl<A, M> Drop for Shared<A, M> {
    fn drop(&mut self) {
        let chain = &mut self.state.get_mut().get_mut().chain;
        for timer in chain.take_timers() {
            self.timer.cancel(timer);
        }
    }
}

/// Chain context checked out for a control-hook call
///
/// Returned to the chain on `restore` or, if the hook panics, on drop.
struct LentContext<'a, A, M> {
    cell: &'a RefCell<State<A, M>>,
    id: ChainId,
    context: Option<ChainContext<A, M>>,
}

impl<'a, A, M> LentContext<'a, A, M> {
    fn take(cell: &'a RefCell<State<A, M>>, id: ChainId) -> Option<Self> {
        let context = cell.borrow_mut().chain.context.take()?;
        Some(Self {
            cell,
            id,
            context: Some(context),
        })
    }

    /// Put the context back; `false` if its chain is no longer current
    fn restore(mut self) -> bool {
        self.put_back()
    }

    fn put_back(&mut self) -> bool {
        let Some(context) = self.context.take() else {
            return false;
        };
        let Ok(mut state) = self.cell.try_borrow_mut() else {
            return false;
        };
        if state.chain.id != self.id || state.chain.context.is_some() {
            return false;
        }
        state.chain.context = Some(context);
        true
    }
}

/// Clears the delivering flag, also when the callback panics
struct Delivering<'a, A, M> {
    cell: &'a RefCell<State<A, M>>,
}

impl<A, M> Drop for Delivering<'_, A, M> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.cell.try_borrow_mut() {
            state.delivering = false;
        }
    }
}

impl<A, M> Drop for LentContext<'_, A, M> {
    fn drop(&mut self) {
        self.put_back();
    }
}

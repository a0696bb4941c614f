//! Manually driven timer host
//!
//! Time only moves when the owner calls [`ManualTimer::advance`] (or one of
//! its variants), which makes every bouncer decision reproducible.

use crate::timer::{millis, TimerHost, TimerId, TimerTask};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::trace;

/// Simulated clock with a queue of due tasks
pub struct ManualTimer {
    origin: Instant,
    state: Mutex<ManualState>,
}

struct ManualState {
    /// Offset of "now" from origin
    elapsed: Duration,
    next_id: u64,
    /// (due offset, id) -> task; ids break ties in scheduling order
    queue: BTreeMap<(Duration, TimerId), TimerTask>,
    /// id -> due offset, for cancellation
    due: HashMap<TimerId, Duration>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Mutex::new(ManualState {
                elapsed: Duration::ZERO,
                next_id: 1,
                queue: BTreeMap::new(),
                due: HashMap::new(),
            }),
        }
    }

    /// Time elapsed on the simulated clock
    pub fn elapsed(&self) -> Duration {
        self.state.lock().elapsed
    }

    /// Number of outstanding tasks
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Offset at which the next task is due
    pub fn next_due(&self) -> Option<Duration> {
        self.state.lock().queue.keys().next().map(|(due, _)| *due)
    }

    /// Move the clock forward by `by`, running every task that falls due
    pub fn advance(&self, by: Duration) {
        let target = self.elapsed() + by;
        self.advance_to(target);
    }

    /// Move the clock to `target` (offset from creation), running due tasks
    ///
    /// Tasks run in due order with the clock set to their due time. No lock
    /// is held while a task runs, so tasks may schedule or cancel others;
    /// newly scheduled tasks that fall due before `target` run too.
    /// Targets in the past are ignored.
    pub fn advance_to(&self, target: Duration) {
        while let Some(task) = self.pop_next(Some(target)) {
            task();
        }

        let mut state = self.state.lock();
        if target > state.elapsed {
            state.elapsed = target;
        }
    }

    /// Move the clock forward WITHOUT running due tasks
    ///
    /// Simulates a host that was busy: tasks that fell due are late and run
    /// on the next `advance`.
    pub fn stall(&self, by: Duration) {
        self.state.lock().elapsed += by;
    }

    /// Run outstanding tasks, however far in the future, jumping the clock
    ///
    /// Stops after `limit` tasks so a task that keeps rescheduling itself
    /// cannot spin forever. Returns the number of tasks run.
    pub fn run_until_idle(&self, limit: usize) -> usize {
        let mut ran = 0;
        while ran < limit {
            let Some(task) = self.pop_next(None) else {
                break;
            };
            task();
            ran += 1;
        }
        ran
    }

    /// Pop the earliest task due at or before `target` (any task if `None`)
    fn pop_next(&self, target: Option<Duration>) -> Option<TimerTask> {
        let mut state = self.state.lock();
        let key = *state.queue.keys().next()?;
        if target.is_some_and(|target| key.0 > target) {
            return None;
        }
        let task = state.queue.remove(&key)?;
        state.due.remove(&key.1);
        if key.0 > state.elapsed {
            state.elapsed = key.0;
        }
        trace!(timer = %key.1, at_ms = millis(key.0), "manual timer fired");
        Some(task)
    }
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerHost for ManualTimer {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId {
        let mut state = self.state.lock();
        let id = TimerId::from_raw(state.next_id);
        state.next_id += 1;
        let due = state.elapsed + delay;
        state.queue.insert((due, id), task);
        state.due.insert(id, due);
        id
    }

    fn cancel(&self, id: TimerId) {
        let mut state = self.state.lock();
        if let Some(due) = state.due.remove(&id) {
            state.queue.remove(&(due, id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> TimerTask) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |name: &'static str| -> TimerTask {
            let log = log_clone.clone();
            Box::new(move || log.lock().push(name))
        };
        (log, make)
    }

    #[test]
    fn test_tasks_run_in_due_order() {
        let timer = ManualTimer::new();
        let (log, task) = recorder();

        timer.schedule(Duration::from_millis(30), task("late"));
        timer.schedule(Duration::from_millis(10), task("early"));
        timer.schedule(Duration::from_millis(10), task("early-second"));

        timer.advance(Duration::from_millis(20));
        assert_eq!(*log.lock(), vec!["early", "early-second"]);
        assert_eq!(timer.elapsed(), Duration::from_millis(20));

        timer.advance(Duration::from_millis(10));
        assert_eq!(*log.lock(), vec!["early", "early-second", "late"]);
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn test_cancel_removes_task() {
        let timer = ManualTimer::new();
        let (log, task) = recorder();

        let id = timer.schedule(Duration::from_millis(5), task("cancelled"));
        timer.cancel(id);
        timer.cancel(id);
        timer.advance(Duration::from_millis(10));

        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_task_can_reschedule() {
        let timer = Arc::new(ManualTimer::new());
        let fired = Arc::new(Mutex::new(Vec::new()));

        let timer_clone = timer.clone();
        let fired_clone = fired.clone();
        timer.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                fired_clone.lock().push(timer_clone.elapsed());
                let fired = fired_clone.clone();
                let inner = timer_clone.clone();
                timer_clone.schedule(
                    Duration::from_millis(10),
                    Box::new(move || fired.lock().push(inner.elapsed())),
                );
            }),
        );

        timer.advance(Duration::from_millis(50));
        assert_eq!(
            *fired.lock(),
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
        assert_eq!(timer.elapsed(), Duration::from_millis(50));
    }

    #[test]
    fn test_stall_defers_due_tasks() {
        let timer = ManualTimer::new();
        let (log, task) = recorder();

        timer.schedule(Duration::from_millis(10), task("late"));
        timer.stall(Duration::from_millis(25));
        assert!(log.lock().is_empty());
        assert_eq!(timer.next_due(), Some(Duration::from_millis(10)));

        timer.advance(Duration::ZERO);
        assert_eq!(*log.lock(), vec!["late"]);
        assert_eq!(timer.elapsed(), Duration::from_millis(25));
    }

    #[test]
    fn test_now_tracks_elapsed() {
        let timer = ManualTimer::new();
        let start = timer.now();
        timer.advance(Duration::from_millis(250));
        assert_eq!(timer.now() - start, Duration::from_millis(250));
    }
}

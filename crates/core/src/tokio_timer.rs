//! Tokio-backed timer host

use crate::timer::{TimerHost, TimerId, TimerTask};
use crate::{Error, Result};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::trace;

/// Timer host that sleeps on a tokio runtime
///
/// Each scheduled task is a spawned sleep. `now()` reads the tokio clock,
/// so paused test time is honoured.
pub struct TokioTimer {
    /// Runtime the sleeps are spawned on
    handle: Handle,
    /// Outstanding sleeps, for cancellation
    tasks: Arc<DashMap<TimerId, AbortHandle>>,
    next_id: AtomicU64,
}

impl TokioTimer {
    /// Use the runtime of the calling context
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| Error::NoTimerHost(format!("not inside a tokio runtime: {}", e)))?;
        Ok(Self::with_handle(handle))
    }

    /// Use an explicit runtime handle
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            tasks: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of sleeps that have neither fired nor been cancelled
    pub fn outstanding(&self) -> usize {
        self.tasks.len()
    }
}

impl TimerHost for TokioTimer {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId {
        let id = TimerId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        let deadline = tokio::time::Instant::now() + delay;
        let tasks = self.tasks.clone();
        let (registered, gate) = oneshot::channel::<()>();

        let join = self.handle.spawn(async move {
            // Wait until the abort handle is tracked, so removal follows insertion
            let _ = gate.await;
            tokio::time::sleep_until(deadline).await;
            tasks.remove(&id);
            trace!(timer = %id, "tokio timer fired");
            task();
        });

        self.tasks.insert(id, join.abort_handle());
        let _ = registered.send(());
        id
    }

    fn cancel(&self, id: TimerId) {
        if let Some((_, abort)) = self.tasks.remove(&id) {
            abort.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        for entry in self.tasks.iter() {
            entry.value().abort();
        }
    }
}

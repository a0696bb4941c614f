//! Event channel coalescer
//!
//! Turns a channel of individual events into a channel of committed chains.

use bounce_core::{Bounce, BounceOptions, Bouncer, Result, TokioTimer};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Running coalescer
///
/// Owns the output side; control calls forward to the bouncer shared with
/// the ingress task.
pub struct Coalescer<E> {
    bouncer: Bouncer<E>,
    output: mpsc::UnboundedReceiver<Bounce<E>>,
    task: JoinHandle<()>,
}

/// Spawn an ingress task on the current runtime
///
/// Each event received on `input` is fired into the chain as a
/// single-argument event. When `input` closes the pending chain is flushed
/// and, once every handle is gone, the output channel closes.
pub fn spawn_coalescer<E>(
    mut input: mpsc::Receiver<E>,
    options: &BounceOptions,
) -> Result<Coalescer<E>>
where
    E: Send + 'static,
{
    options.validate()?;
    let timer = Arc::new(TokioTimer::current()?);
    let (tx, output) = mpsc::unbounded_channel();

    let bouncer = Bouncer::builder(options.throttle_wait(), move |bounce: Bounce<E>| {
        debug!(chain = %bounce.chain_id(), trigger = %bounce.trigger(), "forwarding bounce");
        // Receiver gone means nobody is listening any more
        let _ = tx.send(bounce);
    })
    .options(options)
    .timer(timer)
    .build()?;

    let ingress = bouncer.clone();
    let task = tokio::spawn(async move {
        let mut received = 0u64;
        while let Some(event) = input.recv().await {
            received += 1;
            ingress.fire_one(event);
        }
        ingress.bounce(false);
        info!("Coalescer input closed after {} events", received);
    });

    Ok(Coalescer {
        bouncer,
        output,
        task,
    })
}

impl<E> Coalescer<E>
where
    E: Send + 'static,
{
    /// Next committed chain, `None` once input and handles are gone
    pub async fn recv(&mut self) -> Option<Bounce<E>> {
        self.output.recv().await
    }

    /// Commit the pending chain now, if it has events
    pub fn flush(&self) -> bool {
        self.bouncer.bounce(false)
    }

    /// Drop the pending chain and ignore input until `resume`
    pub fn cancel(&self) -> bool {
        self.bouncer.cancel()
    }

    pub fn resume(&self) -> bool {
        self.bouncer.resume()
    }

    /// Release the control handle and return the output channel
    ///
    /// The output closes once the ingress task has drained its input.
    pub fn into_output(self) -> mpsc::UnboundedReceiver<Bounce<E>> {
        self.output
    }

    /// Whether the ingress task has finished
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

//! Bounded worker pool with a shared work queue and a result channel.
//!
//! Each stage that fans out (fetch, summarize) owns its own pool of a fixed
//! size. Workers pull items from a shared queue one at a time and send
//! outcomes down an `mpsc` channel, so results arrive in completion order.
//! A panicking job is caught and reported for its own item; siblings keep
//! draining the queue. Cancellation abandons in-flight jobs and leaves
//! queued items untouched, and both are handed back to the caller.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What a pool run produced.
#[derive(Debug)]
pub struct PoolOutput<I, T> {
    /// Job results in completion order.
    pub completed: Vec<T>,
    /// Items never finished because the run was cancelled.
    pub abandoned: Vec<I>,
    /// Items whose job panicked.
    pub panicked: Vec<I>,
}

impl<I, T> Default for PoolOutput<I, T> {
    fn default() -> Self {
        Self {
            completed: Vec::new(),
            abandoned: Vec::new(),
            panicked: Vec::new(),
        }
    }
}

enum Outcome<I, T> {
    Done(T),
    Abandoned(I),
    Panicked(I),
}

/// Run `job` over `items` with at most `workers` jobs in flight.
///
/// `stage` only labels log lines.
pub async fn run_pool<I, T, F, Fut>(
    stage: &'static str,
    items: Vec<I>,
    workers: usize,
    cancel: &CancellationToken,
    job: F,
) -> PoolOutput<I, T>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let worker_count = workers.max(1).min(items.len());
    let queue = Arc::new(Mutex::new(VecDeque::from(items)));
    let (tx, mut rx) = mpsc::unbounded_channel::<Outcome<I, T>>();
    let job = Arc::new(job);

    let mut set = JoinSet::new();
    for worker in 0..worker_count {
        let queue = Arc::clone(&queue);
        let tx = tx.clone();
        let job = Arc::clone(&job);
        let cancel = cancel.clone();

        set.spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                let Some(item) = queue.lock().await.pop_front() else {
                    break;
                };

                let run = AssertUnwindSafe(job(item.clone())).catch_unwind();
                let outcome = tokio::select! {
                    biased;
                    () = cancel.cancelled() => Outcome::Abandoned(item),
                    result = run => match result {
                        Ok(value) => Outcome::Done(value),
                        Err(_) => {
                            tracing::warn!(stage, worker, "pool job panicked");
                            Outcome::Panicked(item)
                        }
                    },
                };

                let stop = matches!(outcome, Outcome::Abandoned(_));
                if tx.send(outcome).is_err() || stop {
                    break;
                }
            }
        });
    }
    drop(tx);

    let mut output = PoolOutput::default();
    while let Some(outcome) = rx.recv().await {
        match outcome {
            Outcome::Done(value) => output.completed.push(value),
            Outcome::Abandoned(item) => output.abandoned.push(item),
            Outcome::Panicked(item) => output.panicked.push(item),
        }
    }

    while let Some(joined) = set.join_next().await {
        if let Err(e) = joined {
            tracing::warn!(stage, error = %e, "pool worker ended abnormally");
        }
    }

    output.abandoned.extend(queue.lock().await.drain(..));

    tracing::debug!(
        stage,
        completed = output.completed.len(),
        abandoned = output.abandoned.len(),
        panicked = output.panicked.len(),
        "pool finished"
    );
    output
}

//! Fan-out of per-user work over a bounded worker pool
//!
//! Users are handed to a rayon pool in chunks. Each finished user is sent back
//! over a channel tagged with its id, so results are collected into a map and
//! never depend on completion order. A task that panics or errors is retried
//! up to `max_retries` times before the whole dispatch fails with the user
//! named. A task running longer than the configured timeout fails the
//! dispatch as well.

use crate::config::ParallelConfig;
use crate::error::{PrepError, Result};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Statistics of a finished dispatch
#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    pub users: usize,
    pub threads: usize,
    pub retried: usize,
    pub elapsed: Duration,
}

type Outcome<R> = (String, Result<R>, usize);

/// Runs one task per user id on a bounded pool
#[derive(Debug, Clone)]
pub struct ParallelDispatcher {
    config: ParallelConfig,
}

impl ParallelDispatcher {
    pub fn new(config: ParallelConfig) -> Self {
        Self { config }
    }

    /// Run `task` once per `(user_id, input)` pair
    ///
    /// Blocks until every user has a result or the first unrecoverable
    /// failure. User ids must be distinct.
    pub fn dispatch<T, R, F>(
        &self,
        groups: Vec<(String, T)>,
        task: F,
    ) -> Result<(HashMap<String, R>, DispatchStats)>
    where
        T: Send + Sync + 'static,
        R: Send + 'static,
        F: Fn(&str, &T) -> Result<R> + Send + Sync + 'static,
    {
        let start = Instant::now();
        let total = groups.len();
        let threads = self.config.num_threads();

        let mut seen = HashSet::with_capacity(total);
        if let Some((user_id, _)) = groups.iter().find(|(id, _)| !seen.insert(id.as_str())) {
            return Err(PrepError::DataError(format!(
                "user '{user_id}' was partitioned more than once"
            )));
        }

        if total == 0 {
            return Ok((
                HashMap::new(),
                DispatchStats {
                    threads,
                    ..Default::default()
                },
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("nomad-worker-{i}"))
            .build()
            .map_err(|e| PrepError::ThreadPoolError(e.to_string()))?;

        let groups = Arc::new(groups);
        let task = Arc::new(task);
        // chunk index -> (user currently running, start time)
        let in_flight: Arc<Mutex<HashMap<usize, (String, Instant)>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<Outcome<R>>();

        let chunk_size = self.config.chunk_size.max(1);
        let max_retries = self.config.max_retries;

        debug!(users = total, threads, chunk_size, "Dispatching per-user tasks");

        for (chunk, begin) in (0..total).step_by(chunk_size).enumerate() {
            let end = (begin + chunk_size).min(total);
            let groups = Arc::clone(&groups);
            let task = Arc::clone(&task);
            let in_flight = Arc::clone(&in_flight);
            let cancelled = Arc::clone(&cancelled);
            let tx = tx.clone();

            pool.spawn(move || {
                for (user_id, input) in &groups[begin..end] {
                    if cancelled.load(Ordering::Relaxed) {
                        return;
                    }

                    in_flight.lock().insert(chunk, (user_id.clone(), Instant::now()));
                    let (outcome, attempts) = run_with_retry(user_id, input, task.as_ref(), max_retries);
                    in_flight.lock().remove(&chunk);

                    let failed = outcome.is_err();
                    if tx.send((user_id.clone(), outcome, attempts)).is_err() || failed {
                        return;
                    }
                }
            });
        }
        drop(tx);

        let timeout = Duration::from_millis(self.config.task_timeout_ms);
        let poll = (timeout / 4).max(Duration::from_millis(1));
        let mut results: HashMap<String, R> = HashMap::with_capacity(total);
        let mut retried = 0usize;

        let outcome = loop {
            if results.len() == total {
                break Ok(());
            }

            match rx.recv_timeout(poll) {
                Ok((user_id, Ok(summary), attempts)) => {
                    if attempts > 1 {
                        retried += 1;
                    }
                    results.insert(user_id, summary);
                }
                Ok((_, Err(err), _)) => break Err(err),
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(user_id) = overdue(&in_flight, timeout) {
                        break Err(PrepError::TaskTimeout {
                            user_id,
                            timeout_ms: self.config.task_timeout_ms,
                        });
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(PrepError::ThreadPoolError(format!(
                        "workers stopped after {} of {} users",
                        results.len(),
                        total
                    )));
                }
            }
        };

        if let Err(err) = outcome {
            cancelled.store(true, Ordering::Relaxed);
            warn!(error = %err, completed = results.len(), users = total, "Dispatch aborted");
            return Err(err);
        }

        let stats = DispatchStats {
            users: total,
            threads,
            retried,
            elapsed: start.elapsed(),
        };
        info!(
            users = stats.users,
            threads = stats.threads,
            retried = stats.retried,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Per-user aggregation finished"
        );

        Ok((results, stats))
    }
}

/// The user whose running task has exceeded `timeout`, if any
fn overdue(
    in_flight: &Mutex<HashMap<usize, (String, Instant)>>,
    timeout: Duration,
) -> Option<String> {
    in_flight
        .lock()
        .values()
        .filter(|(_, started)| started.elapsed() >= timeout)
        .max_by_key(|(_, started)| started.elapsed())
        .map(|(user_id, _)| user_id.clone())
}

fn run_with_retry<T, R, F>(
    user_id: &str,
    input: &T,
    task: &F,
    max_retries: usize,
) -> (Result<R>, usize)
where
    F: Fn(&str, &T) -> Result<R>,
{
    let attempts = max_retries + 1;
    let mut reason = String::new();

    for attempt in 1..=attempts {
        match panic::catch_unwind(AssertUnwindSafe(|| task(user_id, input))) {
            Ok(Ok(result)) => return (Ok(result), attempt),
            Ok(Err(err)) => reason = err.to_string(),
            Err(payload) => reason = panic_message(payload.as_ref()),
        }
        warn!(user_id, attempt, reason = %reason, "Per-user task failed");
    }

    (
        Err(PrepError::TaskFailed {
            user_id: user_id.to_string(),
            attempts,
            reason,
        }),
        attempts,
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

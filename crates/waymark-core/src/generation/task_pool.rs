//! Bounded-concurrency runner for independent tasks.
//!
//! Used for batch work such as analysing many files with one prompt each.
//! Every task gets a timeout and a bounded number of retries; results come
//! back in input order regardless of completion order.

use std::future::Future;
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::TaskPoolConfig;

/// Final state of one pooled task.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Completed(T),
    /// The last attempt returned an error
    Failed { attempts: u32, error: anyhow::Error },
    /// The last attempt exceeded the per-task timeout
    TimedOut { attempts: u32 },
    Cancelled,
}

impl<T> TaskOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            TaskOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskPool {
    config: TaskPoolConfig,
}

impl TaskPool {
    pub fn new(config: TaskPoolConfig) -> Self {
        Self { config }
    }

    /// Runs `task` once per input with at most `max_workers` in flight.
    ///
    /// Each invocation receives a child of `cancel`; once `cancel` fires,
    /// queued tasks never start and running ones resolve as
    /// [`TaskOutcome::Cancelled`].
    pub async fn run_all<I, T, F, Fut>(
        &self,
        inputs: Vec<I>,
        task: F,
        cancel: CancellationToken,
    ) -> Vec<TaskOutcome<T>>
    where
        I: Clone + Send + 'static,
        T: Send + 'static,
        F: Fn(I, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let count = inputs.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let task = Arc::new(task);
        let mut set = JoinSet::new();

        for (index, input) in inputs.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let task = Arc::clone(&task);
            let cancel = cancel.clone();
            let config = self.config.clone();
            set.spawn(async move {
                let outcome = run_one(input, task.as_ref(), &semaphore, &config, &cancel).await;
                (index, outcome)
            });
        }

        let mut results: Vec<Option<TaskOutcome<T>>> = (0..count).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, outcome)) => results[index] = Some(outcome),
                Err(e) => warn!("Pooled task aborted: {e}"),
            }
        }

        results
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or_else(|| TaskOutcome::Failed {
                    attempts: 0,
                    error: anyhow::anyhow!("task panicked"),
                })
            })
            .collect()
    }
}

async fn run_one<I, T, F, Fut>(
    input: I,
    task: &F,
    semaphore: &Semaphore,
    config: &TaskPoolConfig,
    cancel: &CancellationToken,
) -> TaskOutcome<T>
where
    I: Clone,
    F: Fn(I, CancellationToken) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return TaskOutcome::Cancelled,
        permit = semaphore.acquire() => match permit {
            Ok(permit) => permit,
            Err(_) => return TaskOutcome::Cancelled,
        },
    };

    let timeout = config.task_timeout();
    let mut attempts = 0;
    loop {
        if cancel.is_cancelled() {
            return TaskOutcome::Cancelled;
        }
        attempts += 1;

        let attempt = tokio::time::timeout(timeout, task(input.clone(), cancel.child_token()));
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TaskOutcome::Cancelled,
            result = attempt => match result {
                Ok(Ok(value)) => return TaskOutcome::Completed(value),
                Ok(Err(error)) => {
                    warn!("Pooled task attempt {attempts} failed: {error:#}");
                    TaskOutcome::Failed { attempts, error }
                }
                Err(_) => {
                    warn!("Pooled task attempt {attempts} timed out after {timeout:?}");
                    TaskOutcome::TimedOut { attempts }
                }
            },
        };

        if attempts > config.task_retries {
            return outcome;
        }
        debug!("Retrying pooled task ({attempts}/{})", config.task_retries + 1);
    }
}

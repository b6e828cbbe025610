//! Drives one in-flight generation task to a terminal state by querying
//! the provider's status endpoint on a fixed interval. Ticks are strictly
//! sequential — a new query is never issued while the previous one is in
//! flight — and a terminal state or cancellation stops the loop with no
//! orphaned timers.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::MirageError;

/// Max consecutive status-query failures before giving up.
const MAX_POLL_FAILURES: u32 = 5;

/// Provider status values meaning terminal success.
const DONE_STATUSES: &[&str] = &["succeed", "succeeded", "completed", "complete", "done", "finished"];

/// Provider status values meaning terminal failure. A provider-side
/// "cancelled" is a failure here — caller cancellation never reaches the
/// provider and is reported as [`TaskState::Cancelled`] instead.
const FAILED_STATUSES: &[&str] = &["failed", "error", "cancelled", "timeout"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Task id obtained, no status observed yet.
    Pending,
    /// Provider reported a non-terminal status, displayed verbatim.
    InProgress { status: String },
    Completed { video_url: String },
    Failed { reason: String },
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled
        )
    }
}

/// One in-flight asynchronous job at the external provider. Ephemeral
/// session state — never persisted.
#[derive(Debug, Clone)]
pub struct GenerationTask {
    pub task_id: String,
    pub state: TaskState,
}

impl GenerationTask {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            state: TaskState::Pending,
        }
    }
}

/// One observation from the provider's status endpoint.
#[derive(Debug, Clone, Default)]
pub struct TaskSnapshot {
    pub status: String,
    pub video_url: Option<String>,
    pub error: Option<String>,
}

/// Where status observations come from. The video gateway implements
/// this over the transport; tests script it.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, task_id: &str) -> Result<TaskSnapshot, MirageError>;
}

/// Scheduling seam so the state machine is testable without real timers.
#[async_trait]
pub trait PollTimer: Send + Sync {
    async fn wait(&self, interval: Duration);
}

pub struct IntervalTimer;

#[async_trait]
impl PollTimer for IntervalTimer {
    async fn wait(&self, interval: Duration) {
        tokio::time::sleep(interval).await;
    }
}

/// Map one status observation to a task state. Completion without an
/// artifact is an explicit failure, never `Completed`.
pub fn map_snapshot(snapshot: &TaskSnapshot) -> TaskState {
    let status = snapshot.status.to_ascii_lowercase();

    if DONE_STATUSES.contains(&status.as_str()) {
        return match &snapshot.video_url {
            Some(url) => TaskState::Completed {
                video_url: url.clone(),
            },
            None => TaskState::Failed {
                reason: "provider reported completion without an artifact".to_string(),
            },
        };
    }

    if FAILED_STATUSES.contains(&status.as_str()) {
        let reason = snapshot
            .error
            .clone()
            .unwrap_or_else(|| format!("task {status}"));
        return TaskState::Failed { reason };
    }

    TaskState::InProgress {
        status: snapshot.status.clone(),
    }
}

pub struct TaskPoller {
    interval: Duration,
    timer: Box<dyn PollTimer>,
}

impl TaskPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timer: Box::new(IntervalTimer),
        }
    }

    pub fn with_timer(interval: Duration, timer: Box<dyn PollTimer>) -> Self {
        Self { interval, timer }
    }

    /// Poll `task` to a terminal state, publishing every observed state
    /// through `states`. Returns the terminal state; cancellation yields
    /// [`TaskState::Cancelled`] within one tick, never `Failed`.
    ///
    /// A not-found reply before the first successful observation is
    /// retried — providers index freshly-created tasks with a delay —
    /// but after one it means the task is gone.
    pub async fn track(
        &self,
        source: &dyn StatusSource,
        task: &GenerationTask,
        cancel: &CancellationToken,
        states: &watch::Sender<TaskState>,
    ) -> TaskState {
        let mut state = task.state.clone();
        let mut seen_alive = false;
        let mut consecutive_failures: u32 = 0;

        loop {
            // biased: cancellation wins over a ready tick or reply, so no
            // further query is issued once the caller has given up.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    state = TaskState::Cancelled;
                    break;
                }
                _ = self.timer.wait(self.interval) => {}
            }

            let observed = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    state = TaskState::Cancelled;
                    break;
                }
                outcome = source.fetch_status(&task.task_id) => outcome,
            };

            match observed {
                Ok(snapshot) => {
                    seen_alive = true;
                    consecutive_failures = 0;
                    tracing::debug!(
                        task_id = %task.task_id,
                        status = %snapshot.status,
                        "task status observed"
                    );
                    let next = map_snapshot(&snapshot);
                    if next.is_terminal() {
                        state = next;
                        break;
                    }
                    state = next;
                    let _ = states.send(state.clone());
                }
                Err(MirageError::Cancelled) => {
                    state = TaskState::Cancelled;
                    break;
                }
                Err(err) if err.is_not_found() && !seen_alive => {
                    consecutive_failures += 1;
                    if consecutive_failures >= MAX_POLL_FAILURES {
                        state = TaskState::Failed {
                            reason: format!("task {} never became visible", task.task_id),
                        };
                        break;
                    }
                    tracing::debug!(task_id = %task.task_id, "task not visible yet, retrying");
                }
                Err(err) if err.is_not_found() => {
                    state = TaskState::Failed {
                        reason: "task no longer known to the provider".to_string(),
                    };
                    break;
                }
                Err(err) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        task_id = %task.task_id,
                        failures = consecutive_failures,
                        "status query failed: {err}"
                    );
                    if consecutive_failures >= MAX_POLL_FAILURES {
                        state = TaskState::Failed {
                            reason: format!(
                                "{consecutive_failures} consecutive status failures: {err}"
                            ),
                        };
                        break;
                    }
                }
            }
        }

        let _ = states.send(state.clone());
        state
    }
}

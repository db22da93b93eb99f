//! Polling of asynchronous server tasks.
//!
//! Publish and policy installation return a task id immediately and finish
//! in the background. [`Session::sync_task`] polls `show-task` at a fixed
//! interval until the task leaves the in-progress state or the polling budget
//! is spent. Either way the last record seen is returned; a timeout is not an
//! error.

use crate::models::{endpoint, PolicyPushParameters, ShowTaskRequest, TaskRecord};
use crate::session::Session;
use crate::Result;
use checkpoint_core::client::{DEFAULT_TASK_CHECK_INTERVAL, DEFAULT_TASK_MAX_DURATION};
use checkpoint_core::config::ManagementConfig;
use checkpoint_core::types::TASK_IN_PROGRESS;
use checkpoint_core::uuid::{PolicyPackageUuid, TargetUuid, TaskId};
use checkpoint_core::Error;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Polling cadence and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPollOptions {
    /// Wait before each poll.
    pub check_interval: Duration,
    /// Total budget. Each poll spends one `check_interval` of it.
    pub max_duration: Duration,
}

impl Default for TaskPollOptions {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_TASK_CHECK_INTERVAL),
            max_duration: Duration::from_secs(DEFAULT_TASK_MAX_DURATION),
        }
    }
}

impl TaskPollOptions {
    /// Create options from an interval and a budget.
    #[must_use]
    pub const fn new(check_interval: Duration, max_duration: Duration) -> Self {
        Self {
            check_interval,
            max_duration,
        }
    }

    /// Options from the task polling settings of a [`ManagementConfig`].
    #[must_use]
    pub fn from_config(config: &ManagementConfig) -> Self {
        Self::new(config.task_check_interval(), config.task_max_duration())
    }

    fn validate(&self) -> Result<()> {
        if self.check_interval.is_zero() {
            return Err(Error::ConfigError(
                "task check interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollState {
    Polling,
    Terminal,
    TimedOut,
    Cancelled,
}

fn next_state(record: Option<&TaskRecord>, remaining: Duration) -> PollState {
    if task_status(record) != TASK_IN_PROGRESS {
        PollState::Terminal
    } else if remaining.is_zero() {
        PollState::TimedOut
    } else {
        PollState::Polling
    }
}

impl Session {
    /// Poll a task until it is no longer in progress or the budget runs out.
    ///
    /// At least one poll is always made. Each iteration spends one check
    /// interval of budget, sleeps for it, then queries the task, so a 3 s
    /// budget at a 1 s interval polls exactly three times.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] for a zero check interval, or the first
    /// failed poll's error unchanged.
    pub async fn sync_task(
        &self,
        task_id: TaskId,
        options: TaskPollOptions,
    ) -> Result<Option<TaskRecord>> {
        self.sync_task_with_cancel(task_id, options, &CancellationToken::new())
            .await
    }

    /// [`Session::sync_task`] that also stops when `cancel` fires.
    ///
    /// Cancellation is only observed while waiting between polls, and
    /// returns the last record seen just as a timeout would.
    ///
    /// # Errors
    ///
    /// Same as [`Session::sync_task`].
    pub async fn sync_task_with_cancel(
        &self,
        task_id: TaskId,
        options: TaskPollOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<TaskRecord>> {
        options.validate()?;

        let mut remaining = options.max_duration;
        let mut last: Option<TaskRecord> = None;
        let mut polls = 0u32;

        let state = loop {
            remaining = remaining.saturating_sub(options.check_interval);

            tokio::select! {
                biased;
                () = cancel.cancelled() => break PollState::Cancelled,
                () = tokio::time::sleep(options.check_interval) => {}
            }

            last = self.poll_task(task_id).await?;
            polls += 1;

            let state = next_state(last.as_ref(), remaining);
            debug!(
                task_id = %task_id,
                polls,
                status = task_status(last.as_ref()),
                progress = ?last.as_ref().and_then(TaskRecord::progress_percentage),
                "Polled task"
            );
            if state != PollState::Polling {
                break state;
            }
        };

        match state {
            PollState::Terminal => {
                info!(task_id = %task_id, polls, status = task_status(last.as_ref()), "Task finished");
            }
            PollState::TimedOut => {
                warn!(task_id = %task_id, polls, "Task still in progress after polling budget");
            }
            PollState::Cancelled => {
                info!(task_id = %task_id, polls, "Task polling cancelled");
            }
            PollState::Polling => {}
        }

        Ok(last)
    }

    async fn poll_task(&self, task_id: TaskId) -> Result<Option<TaskRecord>> {
        let body = serde_json::to_value(ShowTaskRequest { task_id })
            .map_err(|err| Error::InvalidResponse(format!("Failed to encode request: {err}")))?;
        let bytes = self.make_raw_api_call(endpoint::SHOW_TASK, body).await?;
        first_task(&bytes)
    }

    /// Publish, then wait for the publish task when one is reported.
    ///
    /// # Errors
    ///
    /// Errors from [`Session::publish`] or [`Session::sync_task`].
    pub async fn publish_and_wait(&self, options: TaskPollOptions) -> Result<Option<TaskRecord>> {
        match self.publish().await? {
            Some(task_id) => self.sync_task(task_id, options).await,
            None => Ok(None),
        }
    }

    /// Install a policy, then wait for the installation task when one is
    /// reported.
    ///
    /// # Errors
    ///
    /// Errors from [`Session::push_policy`] or [`Session::sync_task`].
    pub async fn push_policy_and_wait(
        &self,
        policy: PolicyPackageUuid,
        targets: &[TargetUuid],
        parameters: &PolicyPushParameters,
        options: TaskPollOptions,
    ) -> Result<Option<TaskRecord>> {
        match self.push_policy(policy, targets, parameters).await? {
            Some(task_id) => self.sync_task(task_id, options).await,
            None => Ok(None),
        }
    }
}

fn parse_json(body: &[u8]) -> Result<Value> {
    serde_json::from_slice(body)
        .map_err(|err| Error::InvalidResponse(format!("Response body is not JSON: {err}")))
}

/// The `task-id` of a response body, if it carries a parseable one.
///
/// # Errors
///
/// Returns [`Error::InvalidResponse`] when the body is not JSON.
pub fn extract_task_id(body: &[u8]) -> Result<Option<TaskId>> {
    let value = parse_json(body)?;
    Ok(value
        .get("task-id")
        .and_then(Value::as_str)
        .and_then(|raw| TaskId::parse_str(raw).ok()))
}

/// The first element of a `show-task` response's `tasks` array.
///
/// # Errors
///
/// Returns [`Error::InvalidResponse`] when the body is not JSON.
pub fn first_task(body: &[u8]) -> Result<Option<TaskRecord>> {
    let value = parse_json(body)?;
    Ok(value
        .get("tasks")
        .and_then(Value::as_array)
        .and_then(|tasks| tasks.first())
        .and_then(Value::as_object)
        .map(|fields| TaskRecord::new(fields.clone())))
}

/// Status of a task record; an absent record counts as in progress.
#[must_use]
pub fn task_status(record: Option<&TaskRecord>) -> &str {
    record.map_or(TASK_IN_PROGRESS, TaskRecord::status)
}

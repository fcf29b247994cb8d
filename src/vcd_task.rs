//! vCD asynchronous tasks.
//!
//! Every mutating call returns a `<Task>`; the caller polls it until it
//! reaches a terminal status.
//!
//! Status machine:
//! - `queued`, `preRunning`, `running`: keep polling
//! - `success`: done
//! - anything else (`error`, `aborted`, ...): failed
//!
//! [`Task::wait_task_completion`] has no deadline of its own. Bound it with
//! [`crate::vcd_retry`] or `tokio::time::timeout`.

use std::{fmt, time::Duration};

use reqwest::Method;

use crate::vcd_client::{VcdClient, VcdError};
use crate::vcd_types::{LinkList, MIME_EMPTY, REL_TASK_CANCEL, TaskRecord, parse_href};

/// Status of a vCD task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting to be scheduled.
    Queued,
    /// Waiting on a pre-condition (e.g. approval).
    PreRunning,
    /// In progress.
    Running,
    /// Completed successfully.
    Success,
    /// Failed.
    Error,
    /// Cancelled.
    Aborted,
    /// Any other status reported by vCD. Treated as terminal.
    Other(String),
}

impl TaskStatus {
    /// Parse the `status` attribute of a `<Task>`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "queued" => Self::Queued,
            "preRunning" => Self::PreRunning,
            "running" => Self::Running,
            "success" => Self::Success,
            "error" => Self::Error,
            "aborted" => Self::Aborted,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether polling can stop.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::PreRunning | Self::Running)
    }

    /// The wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::PreRunning => "preRunning",
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
            Self::Aborted => "aborted",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle on a vCD task, refreshed through the shared client.
#[derive(Debug, Clone)]
pub struct Task {
    client: VcdClient,
    record: TaskRecord,
}

impl Task {
    /// Wrap a task document returned by vCD.
    #[must_use]
    pub const fn from_record(client: VcdClient, record: TaskRecord) -> Self {
        Self { client, record }
    }

    /// Last fetched task document.
    #[must_use]
    pub const fn record(&self) -> &TaskRecord {
        &self.record
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        TaskStatus::parse(&self.record.status)
    }

    /// Re-fetch the task document.
    ///
    /// # Errors
    ///
    /// Returns an error if the task has no href or the GET fails.
    pub async fn refresh(&mut self) -> Result<(), VcdError> {
        if self.record.href.is_empty() {
            return Err(VcdError::InvalidArgument(
                "cannot refresh, task is empty".to_string(),
            ));
        }
        let url = parse_href(&self.record.href)?;
        self.record = self.client.get_xml(url).await?;
        Ok(())
    }

    /// Poll until the task reaches a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`VcdError::TaskFailed`] if the task ends in any status other
    /// than `success`, or the refresh error if polling fails.
    pub async fn wait_task_completion(&mut self) -> Result<(), VcdError> {
        self.wait_inspect_task_completion(|_| {}).await
    }

    /// Poll until the task reaches a terminal status, passing each fetched
    /// document to `inspect`.
    ///
    /// # Errors
    ///
    /// Same as [`Task::wait_task_completion`].
    pub async fn wait_inspect_task_completion<F>(&mut self, mut inspect: F) -> Result<(), VcdError>
    where
        F: FnMut(&TaskRecord),
    {
        let interval = self.client.config().task_poll_interval();

        loop {
            self.refresh().await?;
            inspect(&self.record);

            let status = self.status();
            if !status.is_terminal() {
                tracing::debug!(
                    task = %self.record.name,
                    status = %status,
                    progress = ?self.record.progress,
                    "task still running"
                );
                tokio::time::sleep(interval).await;
                continue;
            }

            return if status == TaskStatus::Success {
                tracing::debug!(task = %self.record.name, "task completed");
                Ok(())
            } else {
                Err(VcdError::TaskFailed {
                    name: self.record.name.clone(),
                    description: self.failure_description(),
                })
            };
        }
    }

    /// Ask vCD to cancel the task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task has no cancel link or the POST fails.
    pub async fn cancel(&self) -> Result<(), VcdError> {
        let url = self.record.links.url_for_type(MIME_EMPTY, REL_TASK_CANCEL)?;
        self.client.send_empty(Method::POST, url).await
    }

    fn failure_description(&self) -> String {
        self.record
            .error
            .as_ref()
            .map(|e| e.message.clone())
            .filter(|m| !m.is_empty())
            .or_else(|| self.record.description.clone())
            .unwrap_or_else(|| format!("{} ({})", self.record.operation, self.record.status))
    }
}

/// Wait for each task in turn, stopping at the first failure.
///
/// # Errors
///
/// Returns the first task error.
pub async fn wait_all(tasks: impl IntoIterator<Item = Task>) -> Result<(), VcdError> {
    for mut task in tasks {
        task.wait_task_completion().await?;
    }
    Ok(())
}

/// [`wait_all`] bounded by `budget`; a zero budget waits without limit.
///
/// # Errors
///
/// Returns the first task error, or [`VcdError::RetryTimeout`] once `budget`
/// is spent.
pub async fn wait_all_within(
    budget: Duration,
    tasks: impl IntoIterator<Item = Task>,
) -> Result<(), VcdError> {
    if budget.is_zero() {
        return wait_all(tasks).await;
    }
    tokio::time::timeout(budget, wait_all(tasks))
        .await
        .map_err(|_| VcdError::RetryTimeout {
            elapsed: budget,
            last: None,
        })?
}

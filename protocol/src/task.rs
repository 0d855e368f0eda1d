//! Task planner data model: persistent multi-step plans with a per-step
//! state machine, and the derivation rule that keeps `Task::status` and
//! `Task::current_step_index` in lock-step with the steps. Both the
//! in-memory and SQL planner backends build on this module so their
//! derivations are bit-identical by construction.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Freeform,
    Structured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub description: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub status: StepStatus,
    pub retry_count: u32,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, description: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            step_type,
            status: StepStatus::Pending,
            retry_count: 0,
            output: None,
            error: None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("step index {0} out of range for task with {1} steps")]
    StepIndexOutOfRange(usize, usize),
    #[error("illegal step transition from {from:?} to {to:?}")]
    IllegalTransition { from: StepStatus, to: StepStatus },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub session_id: String,
    pub title: String,
    pub status: TaskStatus,
    pub current_step_index: usize,
    pub steps: Vec<Step>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Is `to` a legal successor of `from` in the step state machine?
/// `pending -> running -> {completed, failed}`, `failed -> pending` on
/// retry, and same-state transitions are always legal no-ops so that
/// `update_step` is idempotent.
fn is_legal_transition(from: StepStatus, to: StepStatus) -> bool {
    use StepStatus::*;
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (Pending, Running) | (Running, Completed) | (Running, Failed) | (Failed, Pending)
    )
}

impl Task {
    pub fn new(id: impl Into<String>, session_id: impl Into<String>, title: impl Into<String>, steps: Vec<Step>, now: DateTime<Utc>) -> Self {
        let mut task = Self {
            id: id.into(),
            session_id: session_id.into(),
            title: title.into(),
            status: TaskStatus::Pending,
            current_step_index: 0,
            steps,
            created_at: now,
            updated_at: now,
        };
        task.recompute();
        task
    }

    /// Apply a step transition and re-derive `status`/`current_step_index`.
    /// Returns the previous status of the step on success so callers can
    /// log or branch on the edge that was taken.
    pub fn update_step(
        &mut self,
        index: usize,
        new_status: StepStatus,
        output: Option<String>,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<StepStatus, TaskError> {
        let len = self.steps.len();
        let step = self
            .steps
            .get_mut(index)
            .ok_or(TaskError::StepIndexOutOfRange(index, len))?;

        let previous = step.status;
        if !is_legal_transition(previous, new_status) {
            return Err(TaskError::IllegalTransition {
                from: previous,
                to: new_status,
            });
        }

        let retried = previous == StepStatus::Failed && new_status == StepStatus::Pending;
        step.status = new_status;
        if retried {
            step.retry_count += 1;
            step.error = None;
        }
        if let Some(output) = output {
            step.output = Some(output);
        }
        if let Some(error) = error {
            step.error = Some(error);
        }

        self.updated_at = now;
        self.recompute();
        Ok(previous)
    }

    fn recompute(&mut self) {
        self.current_step_index = self
            .steps
            .iter()
            .position(|s| s.status != StepStatus::Completed)
            .unwrap_or(self.steps.len());

        self.status = if self.steps.iter().all(|s| s.status == StepStatus::Completed) {
            TaskStatus::Completed
        } else if self.steps.iter().any(|s| s.status == StepStatus::Running) {
            TaskStatus::Running
        } else if self
            .steps
            .get(self.current_step_index)
            .is_some_and(|s| s.status == StepStatus::Failed)
        {
            TaskStatus::Failed
        } else {
            TaskStatus::Pending
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(n: usize) -> Vec<Step> {
        (0..n)
            .map(|i| Step::new(format!("s{i}"), format!("step {i}"), StepType::Freeform))
            .collect()
    }

    #[test]
    fn new_task_is_pending_at_index_zero() {
        let t = Task::new("t1", "ses_1", "refactor", steps(2), Utc::now());
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.current_step_index, 0);
    }

    #[test]
    fn scenario_plan_task_walkthrough() {
        let mut t = Task::new("t1", "ses_1", "refactor", steps(2), Utc::now());

        t.update_step(0, StepStatus::Running, None, None, Utc::now()).expect("ok");
        assert_eq!(t.status, TaskStatus::Running);
        assert_eq!(t.current_step_index, 0);

        t.update_step(0, StepStatus::Completed, None, None, Utc::now()).expect("ok");
        assert_eq!(t.current_step_index, 1);
        assert_eq!(t.status, TaskStatus::Pending);

        t.update_step(1, StepStatus::Running, None, None, Utc::now()).expect("ok");
        t.update_step(1, StepStatus::Completed, None, None, Utc::now()).expect("ok");
        assert_eq!(t.current_step_index, 2);
        assert_eq!(t.status, TaskStatus::Completed);
    }

    #[test]
    fn failed_step_marks_task_failed_until_retried() {
        let mut t = Task::new("t1", "ses_1", "refactor", steps(2), Utc::now());
        t.update_step(0, StepStatus::Running, None, None, Utc::now()).expect("ok");
        t.update_step(0, StepStatus::Failed, None, Some("boom".into()), Utc::now())
            .expect("ok");
        assert_eq!(t.status, TaskStatus::Failed);
        assert_eq!(t.current_step_index, 0);

        t.update_step(0, StepStatus::Pending, None, None, Utc::now()).expect("retry");
        assert_eq!(t.steps[0].retry_count, 1);
        assert_eq!(t.status, TaskStatus::Pending);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut t = Task::new("t1", "ses_1", "refactor", steps(1), Utc::now());
        let err = t
            .update_step(0, StepStatus::Completed, None, None, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            TaskError::IllegalTransition {
                from: StepStatus::Pending,
                to: StepStatus::Completed
            }
        );
    }

    #[test]
    fn same_status_update_is_idempotent_noop() {
        let mut t = Task::new("t1", "ses_1", "refactor", steps(1), Utc::now());
        t.update_step(0, StepStatus::Running, None, None, Utc::now()).expect("ok");
        let before = t.status;
        t.update_step(0, StepStatus::Running, Some("still going".into()), None, Utc::now())
            .expect("ok");
        assert_eq!(t.status, before);
        assert_eq!(t.steps[0].output.as_deref(), Some("still going"));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut t = Task::new("t1", "ses_1", "refactor", steps(1), Utc::now());
        let err = t
            .update_step(5, StepStatus::Running, None, None, Utc::now())
            .unwrap_err();
        assert_eq!(err, TaskError::StepIndexOutOfRange(5, 1));
    }

    #[test]
    fn current_step_index_is_len_when_all_completed() {
        let mut t = Task::new("t1", "ses_1", "refactor", steps(1), Utc::now());
        t.update_step(0, StepStatus::Running, None, None, Utc::now()).expect("ok");
        t.update_step(0, StepStatus::Completed, None, None, Utc::now()).expect("ok");
        assert_eq!(t.current_step_index, 1);
    }
}

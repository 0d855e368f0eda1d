//! `plan_task(title, steps[])` and `update_step(task_id, step_index,
//! status, output?, error?)` — thin wrappers over `hive_state::TaskStore`
//! and `hive_protocol::Task`'s own derived state machine.

use async_trait::async_trait;
use chrono::Utc;
use hive_common::new_id_with_prefix;
use hive_protocol::Step;
use hive_protocol::StepStatus;
use hive_protocol::StepType;
use hive_protocol::Task;
use hive_state::TaskStore;
use serde::Deserialize;
use serde_json::json;

use crate::context::Info;
use crate::context::ToolCall;
use crate::context::ToolContext;
use crate::context::ToolResponse;
use crate::error::ToolError;
use crate::registry::Tool;

pub struct PlanTaskTool;

#[derive(Deserialize)]
struct PlanTaskArgs {
    title: String,
    steps: Vec<String>,
}

#[async_trait]
impl Tool for PlanTaskTool {
    fn info(&self) -> Info {
        Info {
            name: "plan_task".into(),
            description: "Create a multi-step task plan for this session.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string"},
                    "steps": {"type": "array", "items": {"type": "string"}}
                }
            }),
            required: vec!["title".into(), "steps".into()],
        }
    }

    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        match plan_task(ctx, &call.input).await {
            Ok(response) => response,
            Err(err) => ToolResponse::error(err.to_string()),
        }
    }
}

async fn plan_task(ctx: &ToolContext, input: &str) -> Result<ToolResponse, ToolError> {
    let args: PlanTaskArgs = serde_json::from_str(input).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;
    if args.steps.is_empty() {
        return Err(ToolError::InvalidArgs("steps must not be empty".into()));
    }

    let steps: Vec<Step> = args
        .steps
        .iter()
        .enumerate()
        .map(|(i, description)| Step::new(new_id_with_prefix("step"), description.clone(), step_type_for(i, args.steps.len())))
        .collect();

    let task = Task::new(new_id_with_prefix("task"), ctx.session_id.as_str(), args.title.as_str(), steps, Utc::now());
    let task_id = task.id.clone();
    ctx.tasks.create(task).await?;

    Ok(ToolResponse::ok_with_metadata(
        format!("created task {task_id} with {} step(s)", args.steps.len()),
        json!({"task_id": task_id}),
    ))
}

/// Every step is `Freeform` today; the distinction exists for a future
/// structured-output step kind, which no tool yet produces.
fn step_type_for(_index: usize, _total: usize) -> StepType {
    StepType::Freeform
}

pub struct UpdateStepTool;

#[derive(Deserialize)]
struct UpdateStepArgs {
    task_id: String,
    step_index: usize,
    status: UpdateStepStatus,
    output: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum UpdateStepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl From<UpdateStepStatus> for StepStatus {
    fn from(value: UpdateStepStatus) -> Self {
        match value {
            UpdateStepStatus::Pending => StepStatus::Pending,
            UpdateStepStatus::Running => StepStatus::Running,
            UpdateStepStatus::Completed => StepStatus::Completed,
            UpdateStepStatus::Failed => StepStatus::Failed,
        }
    }
}

#[async_trait]
impl Tool for UpdateStepTool {
    fn info(&self) -> Info {
        Info {
            name: "update_step".into(),
            description: "Transition one step of an existing task plan.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "task_id": {"type": "string"},
                    "step_index": {"type": "integer"},
                    "status": {"type": "string", "enum": ["pending", "running", "completed", "failed"]},
                    "output": {"type": "string"},
                    "error": {"type": "string"}
                }
            }),
            required: vec!["task_id".into(), "step_index".into(), "status".into()],
        }
    }

    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        match update_step(ctx, &call.input).await {
            Ok(response) => response,
            Err(err) => ToolResponse::error(err.to_string()),
        }
    }
}

async fn update_step(ctx: &ToolContext, input: &str) -> Result<ToolResponse, ToolError> {
    let args: UpdateStepArgs = serde_json::from_str(input).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;

    let mut task = ctx.tasks.get(&args.task_id).await?;
    let previous = task.update_step(args.step_index, args.status.into(), args.output, args.error, Utc::now())?;
    ctx.tasks.save(&task).await?;

    Ok(ToolResponse::ok_with_metadata(
        format!("step {} moved from {previous:?} to {:?}", args.step_index, task.steps[args.step_index].status),
        json!({"task_status": task.status}),
    ))
}

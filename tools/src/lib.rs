//! Tool registry and runtime: each tool advertises an `Info` (JSON
//! schema) and executes against a sandboxed, permission-adjacent
//! `ToolContext`, with the registry enforcing panic recovery and the
//! shared 300k-token truncation cap.

use std::sync::Arc;

pub mod context;
pub mod error;
pub mod handlers;
pub mod registry;

pub use context::Info;
pub use context::ToolCall;
pub use context::ToolContext;
pub use context::ToolResponse;
pub use context::ToolResponseKind;
pub use error::ToolError;
pub use registry::Tool;
pub use registry::ToolRegistry;

/// Build the registry with every tool this workspace requires. The LSP
/// pool is optional: a workspace with no configured language servers
/// still runs `wait_for_diagnostics` as a harmless no-op.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(handlers::read::ReadTool));
    registry.register(Arc::new(handlers::write::WriteTool));
    registry.register(Arc::new(handlers::edit::EditTool));
    registry.register(Arc::new(handlers::multi_edit::MultiEditTool));
    registry.register(Arc::new(handlers::delete::DeleteTool));
    registry.register(Arc::new(handlers::glob_tool::GlobTool));
    registry.register(Arc::new(handlers::grep::GrepTool));
    registry.register(Arc::new(handlers::ls::LsTool));
    registry.register(Arc::new(handlers::patch::PatchTool));
    registry.register(Arc::new(handlers::fetch::FetchTool));
    registry.register(Arc::new(handlers::bash::BashTool));
    registry.register(Arc::new(handlers::task::PlanTaskTool));
    registry.register(Arc::new(handlers::task::UpdateStepTool));
    registry.register(Arc::new(handlers::diagnostics::WaitForDiagnosticsTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_exposes_every_required_tool() {
        let registry = default_registry();
        let names: Vec<String> = registry.infos().into_iter().map(|info| info.name).collect();
        for expected in [
            "read",
            "write",
            "edit",
            "multi_edit",
            "delete",
            "glob",
            "grep",
            "ls",
            "patch",
            "fetch",
            "bash",
            "plan_task",
            "update_step",
            "wait_for_diagnostics",
        ] {
            assert!(names.contains(&expected.to_string()), "missing tool: {expected}");
        }
    }
}

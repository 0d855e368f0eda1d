pub mod bash;
pub mod delete;
pub mod diagnostics;
pub mod edit;
pub mod fetch;
pub mod glob_tool;
pub mod grep;
pub mod ls;
pub mod multi_edit;
pub mod patch;
pub mod read;
pub mod task;
pub mod write;

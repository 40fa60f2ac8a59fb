pub mod command_executor;

pub use command_executor::{display_command, CommandExecutor, ExecutionConfig, ExecutionResult};

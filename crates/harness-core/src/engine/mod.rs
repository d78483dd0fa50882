pub mod process;
pub mod runner;

pub use process::{ProcessRunner, ScriptExecutor, ToolOutput};
pub use runner::Runner;

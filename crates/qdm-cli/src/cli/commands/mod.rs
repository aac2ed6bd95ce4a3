//! CLI command handlers, one per file.

mod completions;
mod get;
mod probe;

pub use completions::run_completions;
pub use get::{run_get, GetArgs};
pub use probe::run_probe;

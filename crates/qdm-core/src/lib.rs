pub mod config;
pub mod error;
pub mod logging;
pub mod naming;

// Session engine, leaves first.
pub mod fetcher;
mod http;
pub mod planner;
pub mod probe;
pub mod reassemble;
pub mod session;
pub mod staging;

pub use config::SessionConfig;
pub use error::SessionError;
pub use session::{DownloadSession, SessionState, MAX_CONCURRENCY};

//! Driver embeddings for the reactive kernel: step-mode applications, a
//! multi-application host, and the blocking event loop.

pub mod app;
pub mod error;
pub mod host;
pub mod source;

pub use app::{App, AppState};
pub use error::HostError;
pub use host::{AppId, Host, run_loop};
pub use source::{EventSource, ScriptedSource};

//! Synchronous reactive kernel: a single-threaded scheduler over a dynamic
//! dependency graph of resumable reactors. External stimuli enter one at a
//! time; each is propagated through link and await edges in a full chain
//! that runs to quiescence before the next stimulus is admitted.

pub mod body;
pub mod engine;
pub mod error;
pub mod event;
pub mod graph;
pub mod journal;
pub mod registry;
pub mod scheduler;
#[cfg(test)]
pub(crate) mod test_support;
pub mod value;

pub use body::{AwaitSpec, BodyError, Fired, ReactorBody, Step, Wake};
pub use engine::{Engine, EngineBuilder, TurnCtx};
pub use error::KernelError;
pub use event::{SourceKey, Stimulus};
pub use graph::{DepGraph, Edge, EdgeKind, EdgeTarget, Filter, LinkHandle};
pub use journal::{Journal, JournalError, TraceEntry, TraceRecord};
pub use registry::{ReactorId, ReactorState, Registry, Terminal};
pub use scheduler::{Activation, Scheduler};
pub use value::Value;

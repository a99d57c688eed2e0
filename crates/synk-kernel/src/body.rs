use crate::engine::TurnCtx;
use crate::event::SourceKey;
use crate::graph::Filter;
use crate::registry::ReactorId;
use crate::value::Value;

/// Failure surface of a reactor body. Returning `Err` terminates the
/// reactor abnormally; the error becomes data delivered to awaiters and
/// never crosses the engine boundary.
pub type BodyError = anyhow::Error;

/// Why a body is being run: a fresh activation from its entry point, or the
/// resumption of the `await` it last suspended on.
#[derive(Debug, Clone)]
pub enum Wake {
    Start(Value),
    Fired(Fired),
}

/// What an awaited source produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Fired {
    /// The source fired normally: an event payload or a terminal value.
    Value(Value),
    /// The awaited reactor was killed before it could fire.
    Killed,
    /// The awaited reactor's body terminated abnormally.
    Failed(String),
}

/// What a body does at the end of a turn.
pub enum Step {
    /// Suspend until the given source fires.
    Await(AwaitSpec),
    /// Spawn the reactor and suspend until it terminates; the resumption
    /// carries its terminal value, after its dependents have settled.
    Call(ReactorId),
    /// Terminate with a value, firing outgoing edges.
    Done(Value),
}

/// The condition a suspending body hands back to the engine.
pub struct AwaitSpec {
    pub source: SourceKey,
    pub filter: Option<Filter>,
}

impl AwaitSpec {
    pub fn reactor(id: ReactorId) -> Self {
        Self {
            source: SourceKey::Reactor(id),
            filter: None,
        }
    }

    pub fn event(name: impl Into<String>) -> Self {
        Self {
            source: SourceKey::Event(name.into()),
            filter: None,
        }
    }

    /// Resume only when the fired value satisfies the predicate.
    pub fn filtered(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// A resumable unit of computation.
///
/// Bodies are explicit state machines driven by the engine: each call to
/// `step` runs one turn, from entry or resumption up to the next suspension
/// point or termination. Whatever state the body keeps across turns (struct
/// fields, closure captures) is the continuation; the engine guarantees it
/// is untouched between suspension and resume, and that no two bodies ever
/// run at the same instant.
pub trait ReactorBody: Send {
    fn step(&mut self, wake: Wake, ctx: &mut TurnCtx<'_>) -> Result<Step, BodyError>;
}

impl<F> ReactorBody for F
where
    F: FnMut(Wake, &mut TurnCtx<'_>) -> Result<Step, BodyError> + Send,
{
    fn step(&mut self, wake: Wake, ctx: &mut TurnCtx<'_>) -> Result<Step, BodyError> {
        self(wake, ctx)
    }
}

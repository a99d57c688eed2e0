use crate::body::{BodyError, ReactorBody, Step, Wake};
use crate::engine::TurnCtx;
use crate::registry::{ReactorId, Registry};
use crate::value::Value;

pub(crate) fn noop_body() -> Box<dyn ReactorBody> {
    Box::new(
        |_wake: Wake, _ctx: &mut TurnCtx<'_>| -> Result<Step, BodyError> {
            Ok(Step::Done(Value::Null))
        },
    )
}

/// Registry pre-filled with `n` idle reactors.
pub(crate) fn registry_with(n: usize) -> (Registry, Vec<ReactorId>) {
    let mut registry = Registry::new();
    let ids = (0..n).map(|_| registry.create(noop_body())).collect();
    (registry, ids)
}

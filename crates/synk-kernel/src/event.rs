use serde::{Deserialize, Serialize};

use crate::registry::ReactorId;
use crate::value::Value;

/// One external stimulus: a named event plus an optional payload.
///
/// Stimuli exist only while their propagation chain runs; the kernel never
/// stores them.
#[derive(Debug, Clone, PartialEq)]
pub struct Stimulus {
    pub name: String,
    pub payload: Value,
}

impl Stimulus {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Key under which edges are filed: a firing source is either a reactor
/// (fires on termination) or a named event (fires on admit/post).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKey {
    Reactor(ReactorId),
    Event(String),
}

impl SourceKey {
    pub fn event(name: impl Into<String>) -> Self {
        SourceKey::Event(name.into())
    }
}

impl From<ReactorId> for SourceKey {
    fn from(id: ReactorId) -> Self {
        SourceKey::Reactor(id)
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKey::Reactor(id) => write!(f, "{id}"),
            SourceKey::Event(name) => write!(f, "'{name}'"),
        }
    }
}

use std::collections::VecDeque;

use crate::body::Fired;
use crate::registry::ReactorId;
use crate::value::Value;

/// A scheduled run: either a fresh start from a reactor's entry point or
/// the resumption of a suspended one.
#[derive(Debug, Clone)]
pub enum Activation {
    Start { reactor: ReactorId, arg: Value },
    Resume { reactor: ReactorId, fired: Fired },
}

impl Activation {
    pub fn reactor(&self) -> ReactorId {
        match self {
            Activation::Start { reactor, .. } | Activation::Resume { reactor, .. } => *reactor,
        }
    }
}

/// FIFO work queue of pending activations, drained one at a time.
///
/// Two lanes: the main queue, and a completion lane for resumptions fired
/// by reactor termination. The completion lane is popped only when the main
/// queue is empty, so a caller awaiting a reactor resumes after everything
/// the callee set in motion has settled. Both lanes are FIFO; the selection
/// policy stays fair and the ordering between concurrently enqueued
/// activations stays unspecified contract-wise.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: VecDeque<Activation>,
    completions: VecDeque<Activation>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, activation: Activation) {
        self.queue.push_back(activation);
    }

    pub fn push_completion(&mut self, activation: Activation) {
        self.completions.push_back(activation);
    }

    pub fn pop(&mut self) -> Option<Activation> {
        self.queue
            .pop_front()
            .or_else(|| self.completions.pop_front())
    }

    pub fn len(&self) -> usize {
        self.queue.len() + self.completions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty() && self.completions.is_empty()
    }

    /// True when any pending activation belongs to the reactor.
    pub fn is_queued(&self, reactor: ReactorId) -> bool {
        self.queue
            .iter()
            .chain(self.completions.iter())
            .any(|activation| activation.reactor() == reactor)
    }

    /// Drop every pending activation of the reactor (cancellation sweep).
    pub fn purge(&mut self, reactor: ReactorId) {
        self.queue.retain(|activation| activation.reactor() != reactor);
        self.completions
            .retain(|activation| activation.reactor() != reactor);
    }
}

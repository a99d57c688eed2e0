use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::body::ReactorBody;
use crate::error::KernelError;
use crate::graph::AwaitId;
use crate::value::Value;

/// Terminal outcomes are retained for this many recently dead reactors so
/// `current_value` and the driver stay answerable just after death.
const TERMINAL_CACHE: usize = 256;

/// Stable reactor identity. Ids are allocated monotonically and never
/// reused, so a dead reactor's id stays invalid forever and edges can refer
/// to reactors without forming ownership cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReactorId(u64);

impl fmt::Display for ReactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactorState {
    Ready,
    Running,
    Suspended,
    Zombie,
    Dead,
}

/// How a reactor's life ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    Returned(Value),
    Failed(String),
    Killed,
}

struct Reactor {
    state: ReactorState,
    body: Option<Box<dyn ReactorBody>>,
    current_value: Option<Value>,
    await_edge: Option<AwaitId>,
}

/// Owns reactor records: allocates identities, enforces the state machine,
/// stores detached bodies between turns, and remembers recent terminal
/// outcomes.
#[derive(Default)]
pub struct Registry {
    reactors: HashMap<u64, Reactor>,
    next_id: u64,
    terminal: HashMap<u64, Terminal>,
    terminal_order: VecDeque<u64>,
}

fn legal(from: ReactorState, to: ReactorState) -> bool {
    use ReactorState::*;
    matches!(
        (from, to),
        (Ready, Running)
            | (Ready, Dead)
            | (Running, Suspended)
            | (Running, Zombie)
            | (Suspended, Running)
            | (Suspended, Dead)
            | (Zombie, Dead)
    )
}

fn action_for(to: ReactorState) -> &'static str {
    match to {
        ReactorState::Ready => "reset",
        ReactorState::Running => "run",
        ReactorState::Suspended => "suspend",
        ReactorState::Zombie => "retire",
        ReactorState::Dead => "destroy",
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, body: Box<dyn ReactorBody>) -> ReactorId {
        let id = ReactorId(self.next_id);
        self.next_id += 1;
        self.reactors.insert(
            id.0,
            Reactor {
                state: ReactorState::Ready,
                body: Some(body),
                current_value: None,
                await_edge: None,
            },
        );
        id
    }

    /// State of the reactor, `Dead` for reactors that once existed, or
    /// `NoSuchReactor` for ids never allocated.
    pub fn state(&self, id: ReactorId) -> Result<ReactorState, KernelError> {
        if let Some(reactor) = self.reactors.get(&id.0) {
            Ok(reactor.state)
        } else if id.0 < self.next_id {
            Ok(ReactorState::Dead)
        } else {
            Err(KernelError::NoSuchReactor(id))
        }
    }

    pub fn live_state(&self, id: ReactorId) -> Option<ReactorState> {
        self.reactors.get(&id.0).map(|reactor| reactor.state)
    }

    pub fn is_alive(&self, id: ReactorId) -> bool {
        self.reactors.contains_key(&id.0)
    }

    pub fn live_count(&self) -> usize {
        self.reactors.len()
    }

    pub fn mark(&mut self, id: ReactorId, to: ReactorState) -> Result<(), KernelError> {
        let from = self.state(id)?;
        let Some(reactor) = self.reactors.get_mut(&id.0) else {
            return Err(KernelError::InvalidTransition {
                reactor: id,
                from,
                action: action_for(to),
            });
        };
        if !legal(reactor.state, to) {
            return Err(KernelError::InvalidTransition {
                reactor: id,
                from: reactor.state,
                action: action_for(to),
            });
        }
        reactor.state = to;
        Ok(())
    }

    /// Detach the body for the duration of a turn. The record stays in
    /// place so the running reactor remains visible to primitives.
    pub fn take_body(&mut self, id: ReactorId) -> Result<Box<dyn ReactorBody>, KernelError> {
        let from = self.state(id)?;
        self.reactors
            .get_mut(&id.0)
            .and_then(|reactor| reactor.body.take())
            .ok_or(KernelError::InvalidTransition {
                reactor: id,
                from,
                action: "detach body",
            })
    }

    pub fn restore_body(&mut self, id: ReactorId, body: Box<dyn ReactorBody>) {
        if let Some(reactor) = self.reactors.get_mut(&id.0) {
            reactor.body = Some(body);
        }
    }

    pub fn set_current_value(&mut self, id: ReactorId, value: Value) {
        if let Some(reactor) = self.reactors.get_mut(&id.0) {
            reactor.current_value = Some(value);
        }
    }

    /// A re-triggered reactor starts from a clean slate.
    pub fn reset_current_value(&mut self, id: ReactorId) {
        if let Some(reactor) = self.reactors.get_mut(&id.0) {
            reactor.current_value = None;
        }
    }

    /// Most recent value the reactor produced: its live `current_value`, or
    /// its cached terminal value if it already returned and died.
    pub fn current_value(&self, id: ReactorId) -> Option<Value> {
        if let Some(reactor) = self.reactors.get(&id.0) {
            return reactor.current_value.clone();
        }
        match self.terminal.get(&id.0) {
            Some(Terminal::Returned(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn set_await_edge(&mut self, id: ReactorId, edge: AwaitId) {
        if let Some(reactor) = self.reactors.get_mut(&id.0) {
            reactor.await_edge = Some(edge);
        }
    }

    pub fn clear_await_edge(&mut self, id: ReactorId) {
        if let Some(reactor) = self.reactors.get_mut(&id.0) {
            reactor.await_edge = None;
        }
    }

    pub fn await_edge(&self, id: ReactorId) -> Option<AwaitId> {
        self.reactors.get(&id.0).and_then(|reactor| reactor.await_edge)
    }

    /// Remove the record and remember how it ended. Refused while the
    /// reactor is running; the engine settles running reactors itself.
    pub fn destroy(&mut self, id: ReactorId, terminal: Terminal) -> Result<(), KernelError> {
        let from = self.state(id)?;
        if from == ReactorState::Running || from == ReactorState::Dead {
            return Err(KernelError::InvalidTransition {
                reactor: id,
                from,
                action: "destroy",
            });
        }
        self.reactors.remove(&id.0);
        self.remember_terminal(id, terminal);
        Ok(())
    }

    pub fn terminal(&self, id: ReactorId) -> Option<&Terminal> {
        self.terminal.get(&id.0)
    }

    fn remember_terminal(&mut self, id: ReactorId, terminal: Terminal) {
        if self.terminal.len() >= TERMINAL_CACHE
            && let Some(old) = self.terminal_order.pop_front()
        {
            self.terminal.remove(&old);
        }
        self.terminal_order.push_back(id.0);
        self.terminal.insert(id.0, terminal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::noop_body;

    #[test]
    fn create_allocates_fresh_ready_reactors() {
        let mut registry = Registry::new();
        let a = registry.create(noop_body());
        let b = registry.create(noop_body());
        assert_ne!(a, b);
        assert_eq!(registry.state(a).unwrap(), ReactorState::Ready);
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn transition_table_is_enforced() {
        let mut registry = Registry::new();
        let id = registry.create(noop_body());

        registry.mark(id, ReactorState::Running).expect("trigger");
        registry.mark(id, ReactorState::Suspended).expect("await");
        registry.mark(id, ReactorState::Running).expect("resume");
        registry.mark(id, ReactorState::Zombie).expect("return");

        let err = registry.mark(id, ReactorState::Running).unwrap_err();
        assert!(
            matches!(
                err,
                KernelError::InvalidTransition {
                    from: ReactorState::Zombie,
                    ..
                }
            ),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn ready_reactor_cannot_suspend() {
        let mut registry = Registry::new();
        let id = registry.create(noop_body());
        let err = registry.mark(id, ReactorState::Suspended).unwrap_err();
        assert!(matches!(err, KernelError::InvalidTransition { .. }));
    }

    #[test]
    fn destroyed_reactor_reports_dead_and_keeps_terminal() {
        let mut registry = Registry::new();
        let id = registry.create(noop_body());
        registry
            .destroy(id, Terminal::Returned(Value::Int(5)))
            .expect("destroy ready reactor");

        assert!(!registry.is_alive(id));
        assert_eq!(registry.state(id).unwrap(), ReactorState::Dead);
        assert_eq!(registry.current_value(id), Some(Value::Int(5)));
        assert_eq!(
            registry.terminal(id),
            Some(&Terminal::Returned(Value::Int(5)))
        );
    }

    #[test]
    fn destroy_refuses_running_reactor() {
        let mut registry = Registry::new();
        let id = registry.create(noop_body());
        registry.mark(id, ReactorState::Running).unwrap();
        let err = registry.destroy(id, Terminal::Killed).unwrap_err();
        assert!(matches!(
            err,
            KernelError::InvalidTransition {
                from: ReactorState::Running,
                ..
            }
        ));
    }

    #[test]
    fn unknown_id_is_distinguished_from_dead() {
        let registry = Registry::new();
        let err = registry.state(ReactorId(3)).unwrap_err();
        assert!(matches!(err, KernelError::NoSuchReactor(_)));
    }

    #[test]
    fn await_edge_bookkeeping_round_trips() {
        let mut registry = Registry::new();
        let id = registry.create(noop_body());
        let mut graph = crate::graph::DepGraph::new();
        let edge = graph.add_await(crate::event::SourceKey::event("e"), id, None, Some(id));

        registry.set_await_edge(id, edge);
        assert_eq!(registry.await_edge(id), Some(edge));
        registry.clear_await_edge(id);
        assert_eq!(registry.await_edge(id), None);
    }

    #[test]
    fn terminal_cache_evicts_oldest() {
        let mut registry = Registry::new();
        let first = registry.create(noop_body());
        registry
            .destroy(first, Terminal::Returned(Value::Int(0)))
            .unwrap();
        for _ in 0..TERMINAL_CACHE {
            let id = registry.create(noop_body());
            registry.destroy(id, Terminal::Killed).unwrap();
        }
        assert!(registry.terminal(first).is_none(), "oldest entry evicted");
    }
}

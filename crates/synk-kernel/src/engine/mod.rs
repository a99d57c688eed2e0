use crate::body::{AwaitSpec, BodyError, Fired, ReactorBody, Step, Wake};
use crate::error::KernelError;
use crate::event::SourceKey;
use crate::graph::{DepGraph, EdgeKind, Filter, LinkHandle};
use crate::journal::{Journal, TraceRecord, mem::MemJournal};
use crate::registry::{ReactorId, ReactorState, Registry, Terminal};
use crate::scheduler::{Activation, Scheduler};
use crate::value::Value;

mod propagation;
mod turn;

pub use turn::TurnCtx;

/// The propagation engine: owns the registry, the dependency graph, and the
/// work queue, and runs one full propagation chain per admitted stimulus.
///
/// Strictly single-threaded and cooperative: exactly one reactor body
/// executes at any instant, activations run atomically to the next
/// suspension point or termination, and the graph is mutated only by the
/// running body or by the engine between activations.
pub struct Engine {
    registry: Registry,
    graph: DepGraph,
    scheduler: Scheduler,
    journal: Box<dyn Journal>,
    max_chain_activations: Option<usize>,
    chain_seq: u64,
}

#[derive(Default)]
pub struct EngineBuilder {
    journal: Option<Box<dyn Journal>>,
    max_chain_activations: Option<usize>,
}

impl EngineBuilder {
    pub fn with_journal(mut self, journal: Box<dyn Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Bound the number of activations one chain may run before the engine
    /// gives up with `ChainOverrun`. Unbounded by default.
    pub fn with_max_chain_activations(mut self, limit: usize) -> Self {
        self.max_chain_activations = Some(limit);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            registry: Registry::new(),
            graph: DepGraph::new(),
            scheduler: Scheduler::new(),
            journal: self.journal.unwrap_or_else(|| Box::new(MemJournal::new())),
            max_chain_activations: self.max_chain_activations,
            chain_seq: 0,
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Allocate a reactor without scheduling it.
    pub fn create(&mut self, body: impl ReactorBody + 'static) -> ReactorId {
        self.registry.create(Box::new(body))
    }

    /// Enqueue a fresh activation for the reactor. The chain it joins runs
    /// on the next `drain`.
    pub fn spawn(&mut self, reactor: ReactorId) -> Result<(), KernelError> {
        let state = self.registry.state(reactor)?;
        if state != ReactorState::Ready || self.scheduler.is_queued(reactor) {
            return Err(KernelError::InvalidTransition {
                reactor,
                from: state,
                action: "spawn",
            });
        }
        self.scheduler.push(Activation::Start {
            reactor,
            arg: Value::Null,
        });
        Ok(())
    }

    /// Wire a permanent link edge from an event or a live reactor to a live
    /// reactor. Edges wired here have no owning reactor and persist until
    /// unlinked or their endpoints die.
    pub fn link(
        &mut self,
        src: SourceKey,
        dst: ReactorId,
        filter: Option<Filter>,
    ) -> Result<LinkHandle, KernelError> {
        if let SourceKey::Reactor(source) = &src {
            let state = self.registry.state(*source)?;
            if state == ReactorState::Dead {
                return Err(KernelError::InvalidTransition {
                    reactor: *source,
                    from: state,
                    action: "link",
                });
            }
        }
        let dst_state = self.registry.state(dst)?;
        if dst_state == ReactorState::Dead {
            return Err(KernelError::InvalidTransition {
                reactor: dst,
                from: dst_state,
                action: "link",
            });
        }
        Ok(self.graph.add_link(src, dst, filter, None))
    }

    /// `create` + `link` for an anonymous body.
    pub fn link_body(
        &mut self,
        src: SourceKey,
        body: impl ReactorBody + 'static,
        filter: Option<Filter>,
    ) -> Result<(LinkHandle, ReactorId), KernelError> {
        let dst = self.create(body);
        let handle = self.link(src, dst, filter)?;
        Ok((handle, dst))
    }

    pub fn unlink(&mut self, handle: &LinkHandle) {
        self.graph.remove_link(handle);
    }

    /// Kill a reactor between chains: drop its queued activations, tear
    /// down its edges, and resume its awaiters with `Killed`.
    pub fn kill(&mut self, victim: ReactorId) -> Result<(), KernelError> {
        propagation::kill_reactor(
            &mut self.registry,
            &mut self.graph,
            &mut self.scheduler,
            victim,
        )?;
        self.journal.append(TraceRecord::ReactorKilled {
            chain: self.chain_seq,
            reactor: victim,
        })?;
        Ok(())
    }

    /// Admit one external stimulus: enqueue an activation for every link
    /// edge the event matches and a resumption for every await edge it
    /// satisfies (consuming those). An event no edge matches is silently
    /// ignored. Returns the number of activations enqueued.
    pub fn admit(&mut self, event: &str, payload: Value) -> Result<usize, KernelError> {
        self.chain_seq += 1;
        let key = SourceKey::event(event);
        let fanout = propagation::fire_source(
            &mut self.registry,
            &mut self.graph,
            &mut self.scheduler,
            &key,
            &payload,
            propagation::FireMode::Event,
        );
        if fanout == 0 {
            log::debug!("event '{event}' matched no edges");
        }
        self.journal.append(TraceRecord::StimulusAdmitted {
            chain: self.chain_seq,
            event: event.to_string(),
            fanout,
        })?;
        Ok(fanout)
    }

    /// Run queued activations to quiescence. Returns only when the queue is
    /// empty; everything the chain set in motion has run.
    pub fn drain(&mut self) -> Result<(), KernelError> {
        let mut ran: u64 = 0;
        while let Some(activation) = self.scheduler.pop() {
            if let Some(limit) = self.max_chain_activations
                && ran as usize >= limit
            {
                return Err(KernelError::ChainOverrun { limit });
            }
            ran += 1;
            self.run_activation(activation)?;
        }
        self.journal.append(TraceRecord::ChainDrained {
            chain: self.chain_seq,
            activations: ran,
        })?;
        Ok(())
    }

    /// One full propagation chain: admit the stimulus, drain the queue.
    pub fn step(&mut self, event: &str, payload: Value) -> Result<(), KernelError> {
        self.admit(event, payload)?;
        self.drain()
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_empty()
    }

    pub fn reactor_state(&self, reactor: ReactorId) -> Result<ReactorState, KernelError> {
        self.registry.state(reactor)
    }

    pub fn current_value(&self, reactor: ReactorId) -> Option<Value> {
        self.registry.current_value(reactor)
    }

    /// How a recently dead reactor ended, while its entry is still cached.
    pub fn terminal(&self, reactor: ReactorId) -> Option<Terminal> {
        self.registry.terminal(reactor).cloned()
    }

    pub fn live_reactors(&self) -> usize {
        self.registry.live_count()
    }

    pub fn graph(&self) -> &DepGraph {
        &self.graph
    }
}

use super::*;

/// The primitive set available to a running reactor body.
///
/// Every primitive is non-blocking and returns within the current
/// activation; suspension happens only through the `Step` a body returns.
/// Errors surface synchronously: acting on a dead reactor is an
/// `InvalidTransition` the body sees as the primitive's return value.
pub struct TurnCtx<'a> {
    pub(crate) registry: &'a mut Registry,
    pub(crate) graph: &'a mut DepGraph,
    pub(crate) scheduler: &'a mut Scheduler,
    pub(crate) journal: &'a mut dyn Journal,
    pub(crate) chain: u64,
    pub(crate) current: ReactorId,
    pub(crate) self_kill: bool,
}

impl TurnCtx<'_> {
    /// Identity of the reactor whose body is running.
    pub fn reactor_id(&self) -> ReactorId {
        self.current
    }

    /// Allocate a reactor without scheduling it.
    pub fn create(&mut self, body: impl ReactorBody + 'static) -> ReactorId {
        self.registry.create(Box::new(body))
    }

    /// Fork: enqueue a fresh activation for the reactor and keep running.
    /// Caller and spawnee are concurrent within the chain; their relative
    /// order is unspecified.
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

    pub fn spawn_body(&mut self, body: impl ReactorBody + 'static) -> Result<ReactorId, KernelError> {
        let reactor = self.create(body);
        self.spawn(reactor)?;
        Ok(reactor)
    }

    /// Fire a named event within the current chain: immediately enqueue
    /// every edge with that source. An event no edge matches is ignored.
    pub fn post(&mut self, event: &str, payload: Value) -> Result<(), KernelError> {
        let key = SourceKey::event(event);
        let fanout = propagation::fire_source(
            self.registry,
            self.graph,
            self.scheduler,
            &key,
            &payload,
            propagation::FireMode::Event,
        );
        if fanout == 0 {
            log::debug!("event '{event}' matched no edges");
        }
        self.journal.append(TraceRecord::EventPosted {
            chain: self.chain,
            reactor: self.current,
            event: event.to_string(),
            fanout,
        })?;
        Ok(())
    }

    /// Wire a permanent link edge owned by the running reactor; it dies
    /// with its owner unless released first.
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
        Ok(self.graph.add_link(src, dst, filter, Some(self.current)))
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

    /// Kill a reactor: drop its queued activations, tear down its edges,
    /// and resume its awaiters with `Killed`. Killing the running reactor
    /// itself marks it for destruction when the current turn returns; its
    /// outgoing links then never fire.
    pub fn kill(&mut self, victim: ReactorId) -> Result<(), KernelError> {
        if victim == self.current {
            self.self_kill = true;
            return Ok(());
        }
        propagation::kill_reactor(self.registry, self.graph, self.scheduler, victim)?;
        self.journal.append(TraceRecord::ReactorKilled {
            chain: self.chain,
            reactor: victim,
        })?;
        Ok(())
    }

    /// Most recent value the reactor produced, without suspending.
    pub fn current_value(&self, reactor: ReactorId) -> Result<Option<Value>, KernelError> {
        self.registry.state(reactor)?;
        Ok(self.registry.current_value(reactor))
    }

    pub fn reactor_state(&self, reactor: ReactorId) -> Result<ReactorState, KernelError> {
        self.registry.state(reactor)
    }
}

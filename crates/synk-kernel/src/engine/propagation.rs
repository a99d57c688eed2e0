use super::*;

#[derive(Clone, Copy)]
pub(crate) enum FireMode {
    /// A named event fired: await edges whose filter rejects the payload
    /// stay outstanding, and resumptions join the main queue.
    Event,
    /// A reactor terminated: the source can never fire again, so every
    /// await edge is consumed — rejected filters resume with `Killed` —
    /// and resumptions join the completion lane.
    Terminal,
}

/// Enqueue everything an edge source triggers when it fires with `value`.
/// Link fan-out is snapshotted first; only idle targets activate. Returns
/// the number of activations enqueued.
pub(crate) fn fire_source(
    registry: &mut Registry,
    graph: &mut DepGraph,
    scheduler: &mut Scheduler,
    src: &SourceKey,
    value: &Value,
    mode: FireMode,
) -> usize {
    let mut enqueued = 0;

    for edge in graph.fanout(src) {
        if edge.kind != EdgeKind::Link {
            continue;
        }
        if let Some(filter) = &edge.filter
            && !filter.admits(value)
        {
            continue;
        }
        let target = edge.target.reactor();
        match registry.live_state(target) {
            Some(ReactorState::Ready) if !scheduler.is_queued(target) => {
                scheduler.push(Activation::Start {
                    reactor: target,
                    arg: value.clone(),
                });
                enqueued += 1;
            }
            Some(state) => {
                log::debug!("link {src} -> {target} skipped: target {state:?} or already queued");
            }
            None => {
                log::debug!("link {src} -> {target} skipped: target gone");
            }
        }
    }

    let fired = match mode {
        FireMode::Event => graph.consume_matching_awaits(src, value),
        FireMode::Terminal => graph.consume_awaits(src),
    };
    for edge in fired {
        let target = edge.target.reactor();
        if !registry.is_alive(target) {
            continue;
        }
        registry.clear_await_edge(target);
        let admitted = edge.filter.as_ref().is_none_or(|f| f.admits(value));
        let resume = Activation::Resume {
            reactor: target,
            fired: if admitted {
                Fired::Value(value.clone())
            } else {
                Fired::Killed
            },
        };
        match mode {
            FireMode::Event => scheduler.push(resume),
            FireMode::Terminal => scheduler.push_completion(resume),
        }
        enqueued += 1;
    }

    enqueued
}

/// Destroy a non-running reactor: purge its queued activations, resume its
/// awaiters with `Killed`, drop every edge that mentions it.
pub(crate) fn kill_reactor(
    registry: &mut Registry,
    graph: &mut DepGraph,
    scheduler: &mut Scheduler,
    victim: ReactorId,
) -> Result<(), KernelError> {
    let state = registry.state(victim)?;
    if state == ReactorState::Dead || state == ReactorState::Running {
        // A running reactor kills itself through its turn context.
        return Err(KernelError::InvalidTransition {
            reactor: victim,
            from: state,
            action: "kill",
        });
    }
    scheduler.purge(victim);
    for edge in graph.consume_awaits(&SourceKey::Reactor(victim)) {
        let awaiter = edge.target.reactor();
        if registry.is_alive(awaiter) {
            registry.clear_await_edge(awaiter);
            scheduler.push(Activation::Resume {
                reactor: awaiter,
                fired: Fired::Killed,
            });
        }
    }
    graph.purge_reactor(victim);
    registry.destroy(victim, Terminal::Killed)
}

impl Engine {
    /// Run one activation atomically: from entry or resumption to the next
    /// suspension point or termination, then settle the outcome.
    pub(super) fn run_activation(&mut self, activation: Activation) -> Result<(), KernelError> {
        let id = activation.reactor();
        let Some(state) = self.registry.live_state(id) else {
            log::warn!("stale activation for {id} dropped");
            return Ok(());
        };
        let (wake, resumed) = match activation {
            Activation::Start { arg, .. } => {
                if state != ReactorState::Ready {
                    log::warn!("start activation for {id} dropped ({state:?})");
                    return Ok(());
                }
                self.registry.reset_current_value(id);
                (Wake::Start(arg), false)
            }
            Activation::Resume { fired, .. } => {
                if state != ReactorState::Suspended {
                    log::warn!("resume activation for {id} dropped ({state:?})");
                    return Ok(());
                }
                (Wake::Fired(fired), true)
            }
        };
        self.registry.mark(id, ReactorState::Running)?;
        let mut body = self.registry.take_body(id)?;
        let (outcome, self_kill) = {
            let mut ctx = TurnCtx {
                registry: &mut self.registry,
                graph: &mut self.graph,
                scheduler: &mut self.scheduler,
                journal: self.journal.as_mut(),
                chain: self.chain_seq,
                current: id,
                self_kill: false,
            };
            let outcome = body.step(wake, &mut ctx);
            (outcome, ctx.self_kill)
        };
        self.journal.append(TraceRecord::ActivationRan {
            chain: self.chain_seq,
            reactor: id,
            resumed,
        })?;

        if self_kill {
            return self.finish_killed(id);
        }
        match outcome {
            Err(err) => self.finish_failed(id, err),
            Ok(Step::Done(value)) => self.finish_returned(id, value),
            Ok(Step::Await(spec)) => self.finish_suspended(id, body, spec),
            Ok(Step::Call(target)) => self.finish_called(id, body, target),
        }
    }

    /// Park the reactor on its await edge. A suspended reactor holds
    /// exactly one outstanding await edge; that edge is its sole resume
    /// path.
    fn finish_suspended(
        &mut self,
        id: ReactorId,
        body: Box<dyn ReactorBody>,
        spec: AwaitSpec,
    ) -> Result<(), KernelError> {
        if let SourceKey::Reactor(source) = &spec.source {
            let source = *source;
            if source == id {
                // A yielded await/call cannot return a `Result` to the
                // body, so the typed error becomes the failure payload.
                return self.finish_failed(
                    id,
                    KernelError::InvalidTransition {
                        reactor: id,
                        from: ReactorState::Running,
                        action: "await",
                    }
                    .into(),
                );
            }
            if !self.registry.is_alive(source) {
                // The source already died. Its cached terminal outcome is
                // still the awaited condition: deliver it without creating
                // an edge, so no edge ever references a dead reactor.
                let Some(terminal) = self.registry.terminal(source).cloned() else {
                    return self.finish_failed(
                        id,
                        KernelError::InvalidTransition {
                            reactor: source,
                            from: ReactorState::Dead,
                            action: "await",
                        }
                        .into(),
                    );
                };
                let fired = match terminal {
                    Terminal::Returned(value) => {
                        if spec.filter.as_ref().is_none_or(|f| f.admits(&value)) {
                            Fired::Value(value)
                        } else {
                            Fired::Killed
                        }
                    }
                    Terminal::Failed(message) => Fired::Failed(message),
                    Terminal::Killed => Fired::Killed,
                };
                self.registry.restore_body(id, body);
                self.registry.mark(id, ReactorState::Suspended)?;
                self.scheduler.push_completion(Activation::Resume {
                    reactor: id,
                    fired,
                });
                return Ok(());
            }
        }
        self.registry.restore_body(id, body);
        self.registry.mark(id, ReactorState::Suspended)?;
        let edge = self
            .graph
            .add_await(spec.source, id, spec.filter, Some(id));
        self.registry.set_await_edge(id, edge);
        Ok(())
    }

    /// Spawn-then-await: the caller resumes with the callee's terminal
    /// value once the callee and everything it set in motion have settled.
    fn finish_called(
        &mut self,
        id: ReactorId,
        body: Box<dyn ReactorBody>,
        target: ReactorId,
    ) -> Result<(), KernelError> {
        let ready = target != id
            && self.registry.live_state(target) == Some(ReactorState::Ready)
            && !self.scheduler.is_queued(target);
        if !ready {
            // Same InvalidTransition the spawn primitive would have
            // returned, delivered through the failure channel because the
            // body has already yielded.
            let err = match self.registry.state(target) {
                Ok(from) => KernelError::InvalidTransition {
                    reactor: target,
                    from,
                    action: "call",
                },
                Err(err) => err,
            };
            return self.finish_failed(id, err.into());
        }
        self.scheduler.push(Activation::Start {
            reactor: target,
            arg: Value::Null,
        });
        self.finish_suspended(id, body, AwaitSpec::reactor(target))
    }

    /// Normal termination: fire outgoing edges with the terminal value,
    /// then die with edges cleaned up.
    fn finish_returned(&mut self, id: ReactorId, value: Value) -> Result<(), KernelError> {
        self.registry.mark(id, ReactorState::Zombie)?;
        self.registry.set_current_value(id, value.clone());
        fire_source(
            &mut self.registry,
            &mut self.graph,
            &mut self.scheduler,
            &SourceKey::Reactor(id),
            &value,
            FireMode::Terminal,
        );
        self.journal.append(TraceRecord::ReactorReturned {
            chain: self.chain_seq,
            reactor: id,
        })?;
        self.graph.purge_reactor(id);
        self.registry.destroy(id, Terminal::Returned(value))
    }

    /// Abnormal termination: the failure becomes data delivered to
    /// awaiters, link dependents are not triggered, and the chain goes on.
    fn finish_failed(&mut self, id: ReactorId, err: BodyError) -> Result<(), KernelError> {
        let message = format!("{err:#}");
        log::warn!("reactor {id} failed: {message}");
        self.registry.mark(id, ReactorState::Zombie)?;
        self.resume_awaiters(id, Fired::Failed(message.clone()));
        self.journal.append(TraceRecord::ReactorFailed {
            chain: self.chain_seq,
            reactor: id,
            message: message.clone(),
        })?;
        self.graph.purge_reactor(id);
        self.registry.destroy(id, Terminal::Failed(message))
    }

    /// Self-kill observed during the turn: no link firing, awaiters get
    /// `Killed`.
    fn finish_killed(&mut self, id: ReactorId) -> Result<(), KernelError> {
        self.registry.mark(id, ReactorState::Zombie)?;
        self.resume_awaiters(id, Fired::Killed);
        self.journal.append(TraceRecord::ReactorKilled {
            chain: self.chain_seq,
            reactor: id,
        })?;
        self.graph.purge_reactor(id);
        self.registry.destroy(id, Terminal::Killed)
    }

    fn resume_awaiters(&mut self, id: ReactorId, fired: Fired) {
        for edge in self.graph.consume_awaits(&SourceKey::Reactor(id)) {
            let awaiter = edge.target.reactor();
            if self.registry.is_alive(awaiter) {
                self.registry.clear_await_edge(awaiter);
                self.scheduler.push_completion(Activation::Resume {
                    reactor: awaiter,
                    fired: fired.clone(),
                });
            }
        }
    }
}

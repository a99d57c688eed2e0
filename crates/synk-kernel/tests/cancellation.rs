use std::sync::{Arc, Mutex};

use synk_kernel::{
    AwaitSpec, BodyError, Engine, Fired, KernelError, ReactorBody, ReactorId, ReactorState,
    SourceKey, Step, Terminal, TurnCtx, Value, Wake,
};

#[derive(Clone, Default)]
struct TraceLog(Arc<Mutex<Vec<String>>>);

impl TraceLog {
    fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

fn fired_label(fired: &Fired) -> String {
    match fired {
        Fired::Value(Value::Int(n)) => n.to_string(),
        Fired::Value(value) => format!("{value:?}"),
        Fired::Killed => "killed".into(),
        Fired::Failed(message) => format!("failed:{message}"),
    }
}

/// Suspends forever on an event nothing posts.
struct WaitForever;

impl ReactorBody for WaitForever {
    fn step(&mut self, wake: Wake, _ctx: &mut TurnCtx<'_>) -> Result<Step, BodyError> {
        match wake {
            Wake::Start(_) => Ok(Step::Await(AwaitSpec::event("never"))),
            Wake::Fired(_) => Ok(Step::Done(Value::Null)),
        }
    }
}

/// Spawn the target, await its termination, log what fired.
struct SpawnAwait {
    log: TraceLog,
    target: ReactorId,
}

impl ReactorBody for SpawnAwait {
    fn step(&mut self, wake: Wake, ctx: &mut TurnCtx<'_>) -> Result<Step, BodyError> {
        match wake {
            Wake::Start(_) => {
                ctx.spawn(self.target)?;
                Ok(Step::Await(AwaitSpec::reactor(self.target)))
            }
            Wake::Fired(fired) => {
                self.log.push(fired_label(&fired));
                Ok(Step::Done(Value::Null))
            }
        }
    }
}

#[test]
fn kill_resumes_awaiters_with_killed() {
    let mut engine = Engine::new();
    let log = TraceLog::default();

    let rb = engine.create(WaitForever);
    let ra = engine.create(SpawnAwait {
        log: log.clone(),
        target: rb,
    });
    engine.spawn(ra).expect("spawn ra");
    engine.drain().expect("first chain");
    assert_eq!(engine.reactor_state(rb).unwrap(), ReactorState::Suspended);
    assert_eq!(engine.reactor_state(ra).unwrap(), ReactorState::Suspended);

    // second chain: a reactor kills rb while both hang
    let killer = engine.create(
        move |_wake: Wake, ctx: &mut TurnCtx<'_>| -> Result<Step, BodyError> {
            ctx.kill(rb)?;
            Ok(Step::Done(Value::Null))
        },
    );
    engine
        .link(SourceKey::event("kill"), killer, None)
        .expect("link killer");
    engine.step("kill", Value::Null).expect("kill chain");

    assert_eq!(log.entries(), ["killed"]);
    assert_eq!(engine.reactor_state(rb).unwrap(), ReactorState::Dead);
    assert_eq!(engine.reactor_state(ra).unwrap(), ReactorState::Dead);
    assert_eq!(engine.terminal(rb), Some(Terminal::Killed));
}

#[test]
fn kill_leaves_no_trace_in_graph_or_queue() {
    let mut engine = Engine::new();

    let rb = engine.create(WaitForever);
    engine.spawn(rb).expect("spawn rb");
    engine.drain().expect("suspend rb");
    assert_eq!(engine.graph().edge_count(), 1);

    engine.kill(rb).expect("kill");
    assert!(!engine.graph().references(rb));
    assert_eq!(engine.graph().edge_count(), 0);
    assert_eq!(engine.live_reactors(), 0);

    let err = engine.kill(rb).unwrap_err();
    assert!(
        matches!(
            err,
            KernelError::InvalidTransition {
                from: ReactorState::Dead,
                ..
            }
        ),
        "killing a dead reactor is rejected: {err:?}"
    );
}

#[test]
fn kill_purges_a_still_queued_reactor() {
    let mut engine = Engine::new();
    let log = TraceLog::default();

    let victim = engine.create({
        let log = log.clone();
        move |_wake: Wake, _ctx: &mut TurnCtx<'_>| -> Result<Step, BodyError> {
            log.push("victim ran");
            Ok(Step::Done(Value::Null))
        }
    });

    // spawn the victim, kill it in the same turn, then await it: the await
    // sees the cached Killed outcome
    struct SpawnKillAwait {
        log: TraceLog,
        victim: ReactorId,
    }
    impl ReactorBody for SpawnKillAwait {
        fn step(&mut self, wake: Wake, ctx: &mut TurnCtx<'_>) -> Result<Step, BodyError> {
            match wake {
                Wake::Start(_) => {
                    ctx.spawn(self.victim)?;
                    ctx.kill(self.victim)?;
                    Ok(Step::Await(AwaitSpec::reactor(self.victim)))
                }
                Wake::Fired(fired) => {
                    self.log.push(fired_label(&fired));
                    Ok(Step::Done(Value::Null))
                }
            }
        }
    }
    let ra = engine.create(SpawnKillAwait {
        log: log.clone(),
        victim,
    });
    engine.spawn(ra).expect("spawn ra");
    engine.drain().expect("chain");

    assert_eq!(log.entries(), ["killed"], "victim never ran");
    assert_eq!(engine.terminal(victim), Some(Terminal::Killed));
}

#[test]
fn self_kill_suppresses_termination_firing() {
    let mut engine = Engine::new();
    let log = TraceLog::default();

    let suicidal = engine.create(
        move |_wake: Wake, ctx: &mut TurnCtx<'_>| -> Result<Step, BodyError> {
            let me = ctx.reactor_id();
            ctx.kill(me)?;
            // the body unwinds normally; the value below is discarded
            Ok(Step::Done(Value::Int(5)))
        },
    );
    let dependent = engine.create({
        let log = log.clone();
        move |_wake: Wake, _ctx: &mut TurnCtx<'_>| -> Result<Step, BodyError> {
            log.push("dependent ran");
            Ok(Step::Done(Value::Null))
        }
    });
    engine
        .link(SourceKey::Reactor(suicidal), dependent, None)
        .expect("link dependent");

    let awaiter = engine.create(SpawnAwait {
        log: log.clone(),
        target: suicidal,
    });
    engine.spawn(awaiter).expect("spawn awaiter");
    engine.drain().expect("chain");

    assert_eq!(log.entries(), ["killed"]);
    assert_eq!(engine.terminal(suicidal), Some(Terminal::Killed));
    assert_eq!(
        engine.reactor_state(dependent).unwrap(),
        ReactorState::Ready,
        "self-killed reactors never fire their links"
    );
}

#[test]
fn external_kill_between_chains() {
    let mut engine = Engine::new();
    let rb = engine.create(WaitForever);
    engine.spawn(rb).expect("spawn");
    engine.drain().expect("suspend");

    engine.kill(rb).expect("external kill");
    assert_eq!(engine.reactor_state(rb).unwrap(), ReactorState::Dead);
    assert!(engine.is_idle());
}

#[test]
fn await_on_evicted_reactor_fails_the_awaiter() {
    let mut engine = Engine::new();
    let log = TraceLog::default();

    // victim id from a registry whose terminal entry we then evict by
    // cycling more dead reactors than the cache holds
    let victim = engine.create(
        move |_wake: Wake, _ctx: &mut TurnCtx<'_>| -> Result<Step, BodyError> {
            Ok(Step::Done(Value::Null))
        },
    );
    engine.spawn(victim).expect("spawn victim");
    engine.drain().expect("victim dies");
    for _ in 0..300 {
        let filler = engine.create(
            move |_wake: Wake, _ctx: &mut TurnCtx<'_>| -> Result<Step, BodyError> {
                Ok(Step::Done(Value::Null))
            },
        );
        engine.spawn(filler).expect("spawn filler");
        engine.drain().expect("filler dies");
    }

    struct AwaitOnly {
        log: TraceLog,
        target: ReactorId,
    }
    impl ReactorBody for AwaitOnly {
        fn step(&mut self, wake: Wake, _ctx: &mut TurnCtx<'_>) -> Result<Step, BodyError> {
            match wake {
                Wake::Start(_) => Ok(Step::Await(AwaitSpec::reactor(self.target))),
                Wake::Fired(fired) => {
                    self.log.push(fired_label(&fired));
                    Ok(Step::Done(Value::Null))
                }
            }
        }
    }
    let ra = engine.create(AwaitOnly {
        log: log.clone(),
        target: victim,
    });
    engine.spawn(ra).expect("spawn ra");
    engine.drain().expect("chain");

    assert!(matches!(
        engine.terminal(ra),
        Some(Terminal::Failed(message)) if message.contains("cannot await")
    ));
    assert_eq!(log.entries(), Vec::<String>::new(), "the body never resumed");
}

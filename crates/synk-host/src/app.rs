use synk_kernel::{Engine, ReactorBody, ReactorId, ReactorState, Terminal, Value};

use crate::error::HostError;

/// Lifecycle of an application as the embedding sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Created; the bootstrap chain has not drained yet.
    Starting,
    /// Idle between chains, awaiting the next external event.
    Ready,
    /// The root reactor is dead.
    Terminated,
}

/// One application: a root reactor plus the engine that owns its graph and
/// queues. Step mode: each `step` drives exactly one full propagation chain
/// and returns when the queue drains; it never blocks on external I/O.
pub struct App {
    engine: Engine,
    root: ReactorId,
    bootstrapped: bool,
}

impl App {
    /// Create the root reactor and enqueue it without running anything.
    /// The application reports `Starting` until `bootstrap` drains the
    /// first chain.
    pub fn new(mut engine: Engine, root_body: impl ReactorBody + 'static) -> Result<Self, HostError> {
        let root = engine.create(root_body);
        engine.spawn(root)?;
        Ok(Self {
            engine,
            root,
            bootstrapped: false,
        })
    }

    /// Run the bootstrap chain: the root executes to its first suspension
    /// point or termination.
    pub fn bootstrap(&mut self) -> Result<AppState, HostError> {
        if !self.bootstrapped {
            self.engine.drain()?;
            self.bootstrapped = true;
        }
        Ok(self.state())
    }

    /// `new` + `bootstrap` on a default engine.
    pub fn start(root_body: impl ReactorBody + 'static) -> Result<Self, HostError> {
        Self::start_with(Engine::new(), root_body)
    }

    /// `new` + `bootstrap` on a configured engine.
    pub fn start_with(
        engine: Engine,
        root_body: impl ReactorBody + 'static,
    ) -> Result<Self, HostError> {
        let mut app = Self::new(engine, root_body)?;
        app.bootstrap()?;
        Ok(app)
    }

    pub fn state(&self) -> AppState {
        if matches!(
            self.engine.reactor_state(self.root),
            Ok(ReactorState::Dead)
        ) {
            AppState::Terminated
        } else if !self.bootstrapped {
            AppState::Starting
        } else {
            AppState::Ready
        }
    }

    /// Drive exactly one full propagation chain for the event.
    pub fn step(&mut self, event: &str, payload: Value) -> Result<AppState, HostError> {
        if self.state() == AppState::Terminated {
            return Err(HostError::Terminated);
        }
        self.engine.step(event, payload)?;
        Ok(self.state())
    }

    /// The root's terminal outcome once the application has terminated.
    pub fn result(&self) -> Option<Terminal> {
        self.engine.terminal(self.root)
    }

    pub fn root(&self) -> ReactorId {
        self.root
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }
}

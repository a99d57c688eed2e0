use std::collections::HashMap;
use std::fmt;

use synk_kernel::{ReactorBody, Terminal, Value};

use crate::app::{App, AppState};
use crate::error::HostError;
use crate::source::EventSource;

/// Opaque handle to one application inside a `Host`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppId(u64);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app{}", self.0)
    }
}

/// Registry of coexisting applications. Each application has its own
/// engine, graph, and queues; stepping one never touches another.
#[derive(Default)]
pub struct Host {
    apps: HashMap<u64, App>,
    next_id: u64,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an application: create and bootstrap its root reactor.
    pub fn start(&mut self, root_body: impl ReactorBody + 'static) -> Result<AppId, HostError> {
        let app = App::start(root_body)?;
        Ok(self.adopt(app))
    }

    /// Adopt an already-built application (e.g. one on a configured engine).
    pub fn adopt(&mut self, app: App) -> AppId {
        let id = AppId(self.next_id);
        self.next_id += 1;
        self.apps.insert(id.0, app);
        id
    }

    /// Drive one full propagation chain on the addressed application.
    pub fn step(
        &mut self,
        id: AppId,
        event: &str,
        payload: Value,
    ) -> Result<AppState, HostError> {
        self.app_mut(id)?.step(event, payload)
    }

    pub fn state(&self, id: AppId) -> Result<AppState, HostError> {
        Ok(self.app(id)?.state())
    }

    pub fn result(&self, id: AppId) -> Result<Option<Terminal>, HostError> {
        Ok(self.app(id)?.result())
    }

    pub fn remove(&mut self, id: AppId) -> Result<App, HostError> {
        self.apps.remove(&id.0).ok_or(HostError::AppNotFound(id))
    }

    pub fn app(&self, id: AppId) -> Result<&App, HostError> {
        self.apps.get(&id.0).ok_or(HostError::AppNotFound(id))
    }

    pub fn app_mut(&mut self, id: AppId) -> Result<&mut App, HostError> {
        self.apps.get_mut(&id.0).ok_or(HostError::AppNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

/// Loop mode: start a root reactor, then feed it stimuli from the source
/// until the root dies. Definitionally `App::start` plus a while-loop over
/// `App::step`; returns the root's terminal outcome.
pub fn run_loop(
    mut source: impl EventSource,
    root_body: impl ReactorBody + 'static,
) -> Result<Terminal, HostError> {
    let mut app = App::start(root_body)?;
    while app.state() != AppState::Terminated {
        let Some(stimulus) = source.next_event() else {
            return Err(HostError::SourceExhausted);
        };
        tracing::debug!(event = %stimulus.name, "admitting stimulus");
        app.step(&stimulus.name, stimulus.payload)?;
    }
    tracing::debug!("root reactor terminated");
    app.result().ok_or(HostError::RootOutcomeUnavailable)
}

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::event::SourceKey;
use crate::registry::ReactorId;
use crate::value::Value;

/// Opaque predicate over fired values. Filters are treated as pure: the
/// kernel may evaluate them any number of times and never in a guaranteed
/// order.
#[derive(Clone)]
pub struct Filter(Arc<dyn Fn(&Value) -> bool + Send + Sync>);

impl Filter {
    pub fn new(predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    pub fn admits(&self, value: &Value) -> bool {
        (self.0)(value)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<filter>")
    }
}

/// Identity of a single await edge; always fresh, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AwaitId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Permanent, user-controlled; persists until unlinked or its owner dies.
    Link,
    /// Temporary resume dependency; consumed when the source fires.
    Await(AwaitId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeTarget {
    /// Start the reactor from its entry point.
    Activate(ReactorId),
    /// Resume the suspended reactor's continuation.
    Resume(ReactorId),
}

impl EdgeTarget {
    pub fn reactor(&self) -> ReactorId {
        match self {
            EdgeTarget::Activate(id) | EdgeTarget::Resume(id) => *id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub kind: EdgeKind,
    pub target: EdgeTarget,
    pub filter: Option<Filter>,
    /// Reactor whose death tears this edge down; `None` for edges wired by
    /// the embedding.
    pub owner: Option<ReactorId>,
}

/// Handle returned by `link`, consumed by `unlink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkHandle {
    pub src: SourceKey,
    pub dst: ReactorId,
}

/// The dependency graph: outgoing edges keyed by source. Edge lists keep
/// insertion order, which is the fan-out enumeration order.
#[derive(Debug, Default)]
pub struct DepGraph {
    edges: IndexMap<SourceKey, Vec<Edge>>,
    next_await: u64,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a permanent link edge. Idempotent on `(src, dst)`: re-linking an
    /// existing pair is a no-op and returns the same handle.
    pub fn add_link(
        &mut self,
        src: SourceKey,
        dst: ReactorId,
        filter: Option<Filter>,
        owner: Option<ReactorId>,
    ) -> LinkHandle {
        let handle = LinkHandle {
            src: src.clone(),
            dst,
        };
        let list = self.edges.entry(src).or_default();
        if list
            .iter()
            .any(|edge| edge.kind == EdgeKind::Link && edge.target.reactor() == dst)
        {
            return handle;
        }
        list.push(Edge {
            kind: EdgeKind::Link,
            target: EdgeTarget::Activate(dst),
            filter,
            owner,
        });
        handle
    }

    /// Remove the matching link edge; no-op when absent.
    pub fn remove_link(&mut self, handle: &LinkHandle) {
        if let Some(list) = self.edges.get_mut(&handle.src) {
            list.retain(|edge| {
                !(edge.kind == EdgeKind::Link && edge.target.reactor() == handle.dst)
            });
            if list.is_empty() {
                self.edges.shift_remove(&handle.src);
            }
        }
    }

    pub fn has_link(&self, src: &SourceKey, dst: ReactorId) -> bool {
        self.edges.get(src).is_some_and(|list| {
            list.iter()
                .any(|edge| edge.kind == EdgeKind::Link && edge.target.reactor() == dst)
        })
    }

    /// Add a temporary await edge resuming `target` when `src` fires.
    /// Always creates a fresh edge.
    pub fn add_await(
        &mut self,
        src: SourceKey,
        target: ReactorId,
        filter: Option<Filter>,
        owner: Option<ReactorId>,
    ) -> AwaitId {
        let id = AwaitId(self.next_await);
        self.next_await += 1;
        self.edges.entry(src).or_default().push(Edge {
            kind: EdgeKind::Await(id),
            target: EdgeTarget::Resume(target),
            filter,
            owner,
        });
        id
    }

    pub fn remove_await(&mut self, id: AwaitId) -> bool {
        let mut removed = false;
        for (_, list) in self.edges.iter_mut() {
            list.retain(|edge| {
                let hit = edge.kind == EdgeKind::Await(id);
                removed |= hit;
                !hit
            });
        }
        self.edges.retain(|_, list| !list.is_empty());
        removed
    }

    /// Snapshot of the outgoing edges at `src`, in insertion order. Later
    /// graph mutations do not affect a snapshot already taken, so an unlink
    /// during a chain never changes the currently propagating set.
    pub fn fanout(&self, src: &SourceKey) -> Vec<Edge> {
        self.edges.get(src).cloned().unwrap_or_default()
    }

    /// Remove and return every await edge at `src` whose filter admits the
    /// value; non-matching await edges stay outstanding.
    pub fn consume_matching_awaits(&mut self, src: &SourceKey, value: &Value) -> Vec<Edge> {
        let Some(list) = self.edges.get_mut(src) else {
            return Vec::new();
        };
        let mut fired = Vec::new();
        list.retain(|edge| {
            let take = matches!(edge.kind, EdgeKind::Await(_))
                && edge.filter.as_ref().is_none_or(|f| f.admits(value));
            if take {
                fired.push(edge.clone());
            }
            !take
        });
        if list.is_empty() {
            self.edges.shift_remove(src);
        }
        fired
    }

    /// Remove and return every await edge at `src`, matching or not. Used
    /// when the source can never fire again.
    pub fn consume_awaits(&mut self, src: &SourceKey) -> Vec<Edge> {
        let Some(list) = self.edges.get_mut(src) else {
            return Vec::new();
        };
        let mut fired = Vec::new();
        list.retain(|edge| {
            let take = matches!(edge.kind, EdgeKind::Await(_));
            if take {
                fired.push(edge.clone());
            }
            !take
        });
        if list.is_empty() {
            self.edges.shift_remove(src);
        }
        fired
    }

    /// Drop every edge sourced at, targeting, or owned by the reactor.
    /// Cleanup on death is immediate: afterwards no edge anywhere mentions
    /// the id.
    pub fn purge_reactor(&mut self, id: ReactorId) {
        self.edges.shift_remove(&SourceKey::Reactor(id));
        for (_, list) in self.edges.iter_mut() {
            list.retain(|edge| edge.target.reactor() != id && edge.owner != Some(id));
        }
        self.edges.retain(|_, list| !list.is_empty());
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// True when some edge mentions the reactor as source, target, or owner.
    pub fn references(&self, id: ReactorId) -> bool {
        self.edges.iter().any(|(src, list)| {
            *src == SourceKey::Reactor(id)
                || list
                    .iter()
                    .any(|edge| edge.target.reactor() == id || edge.owner == Some(id))
        })
    }
}

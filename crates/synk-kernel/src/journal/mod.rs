pub mod fs;
pub mod mem;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::ReactorId;

/// Monotonic cursor assigned to every appended trace entry.
pub type JournalSeq = u64;

/// One kernel lifecycle observation. The engine appends a record at each
/// point where the propagation state changes; the journal is a diagnostic
/// trace of chains, not a replay log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum TraceRecord {
    StimulusAdmitted {
        chain: u64,
        event: String,
        fanout: usize,
    },
    ActivationRan {
        chain: u64,
        reactor: ReactorId,
        resumed: bool,
    },
    EventPosted {
        chain: u64,
        reactor: ReactorId,
        event: String,
        fanout: usize,
    },
    ReactorReturned {
        chain: u64,
        reactor: ReactorId,
    },
    ReactorFailed {
        chain: u64,
        reactor: ReactorId,
        message: String,
    },
    ReactorKilled {
        chain: u64,
        reactor: ReactorId,
    },
    ChainDrained {
        chain: u64,
        activations: u64,
    },
}

impl TraceRecord {
    /// The propagation chain this record belongs to.
    pub fn chain(&self) -> u64 {
        match self {
            TraceRecord::StimulusAdmitted { chain, .. }
            | TraceRecord::ActivationRan { chain, .. }
            | TraceRecord::EventPosted { chain, .. }
            | TraceRecord::ReactorReturned { chain, .. }
            | TraceRecord::ReactorFailed { chain, .. }
            | TraceRecord::ReactorKilled { chain, .. }
            | TraceRecord::ChainDrained { chain, .. } => *chain,
        }
    }
}

/// Owned entry returned by journal readers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceEntry {
    pub seq: JournalSeq,
    pub record: TraceRecord,
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("corrupt entry: {0}")]
    Corrupt(String),
}

/// Uniform interface over concrete journal backends (in-memory,
/// filesystem) so the engine targets a single abstraction.
pub trait Journal: Send {
    fn append(&mut self, record: TraceRecord) -> Result<JournalSeq, JournalError>;

    /// Loads entries starting at `from` (inclusive). Passing 0 returns the
    /// full trace.
    fn load_from(&self, from: JournalSeq) -> Result<Vec<TraceEntry>, JournalError>;

    /// Next sequence that will be assigned on append.
    fn next_seq(&self) -> JournalSeq;
}

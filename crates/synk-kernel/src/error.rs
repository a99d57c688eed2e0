use thiserror::Error;

use crate::registry::{ReactorId, ReactorState};

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("no reactor with id {0}")]
    NoSuchReactor(ReactorId),
    #[error("reactor {reactor} is {from:?}; cannot {action}")]
    InvalidTransition {
        reactor: ReactorId,
        from: ReactorState,
        action: &'static str,
    },
    #[error("propagation chain exceeded {limit} activations without draining")]
    ChainOverrun { limit: usize },
    #[error("journal error: {0}")]
    Journal(#[from] crate::journal::JournalError),
}

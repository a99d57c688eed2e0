use thiserror::Error;

use crate::host::AppId;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("kernel error: {0}")]
    Kernel(#[from] synk_kernel::KernelError),
    #[error("no application with id {0}")]
    AppNotFound(AppId),
    #[error("application already terminated")]
    Terminated,
    #[error("event source ended before the root reactor terminated")]
    SourceExhausted,
    #[error("root terminal outcome no longer available")]
    RootOutcomeUnavailable,
}

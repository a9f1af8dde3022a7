use crate::anniversary::ResolveError;
use crate::provider::ProviderError;

/// Error type for a single field recompute.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FieldError {
    #[error("Provider failure: {0}")]
    Provider(#[from] ProviderError),
    #[error("Anniversary resolution failed: {0}")]
    Resolve(ResolveError),
    #[error("Field failed: {0}")]
    Failed(String),
}

impl From<ResolveError> for FieldError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Provider(p) => FieldError::Provider(p),
            other => FieldError::Resolve(other),
        }
    }
}

/// Error type for engine and scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("Scope not found: {0}")]
    ScopeNotFound(String),
    #[error("Registry build failed: {0}")]
    Build(String),
    #[error("Scheduler already running")]
    AlreadyRunning,
    #[error("Engine is shutting down")]
    ShuttingDown,
    #[error("Task failed: {0}")]
    Failed(String),
}

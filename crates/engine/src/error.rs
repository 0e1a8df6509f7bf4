use hortator_substrate::SubstrateError;
use thiserror::Error;

/// Top-level reconciliation error (§4.16, §7). Distinguishes what the
/// controller framework should do: requeue with backoff (`Substrate`), or
/// treat as a bug surfaced through tracing (`Internal`).
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Substrate(#[from] SubstrateError),

    #[error("pod builder: {0}")]
    PodBuilder(#[from] hortator_substrate::pod_builder::PodBuilderError),

    #[error("internal: {0}")]
    Internal(String),
}

impl ReconcileError {
    pub fn requeue_after(&self) -> Option<std::time::Duration> {
        match self {
            ReconcileError::Substrate(err) if !err.is_transient() => Some(std::time::Duration::from_secs(5)),
            _ => None,
        }
    }
}

use thiserror::Error;

/// Errors surfaced by the workload-substrate interface (§1, §7).
///
/// The distinction between `Transient` and `Persistent` lets callers decide
/// whether to retry in-loop (conflict on a status write) or return and let
/// the controller framework requeue with backoff (get/list/create errors).
#[derive(Debug, Error)]
pub enum SubstrateError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("substrate request failed: {0}")]
    Persistent(String),
}

impl SubstrateError {
    /// A conflict on a status write should be retried in-loop on the same
    /// reconcile (§4.1, §7); everything else is persistent.
    pub fn is_transient(&self) -> bool {
        matches!(self, SubstrateError::Conflict(_))
    }
}

impl From<kube::Error> for SubstrateError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(resp) if resp.code == 404 => SubstrateError::NotFound(resp.message.clone()),
            kube::Error::Api(resp) if resp.reason == "AlreadyExists" => {
                SubstrateError::AlreadyExists(resp.message.clone())
            }
            kube::Error::Api(resp) if resp.code == 409 => SubstrateError::Conflict(resp.message.clone()),
            other => SubstrateError::Persistent(other.to_string()),
        }
    }
}

//! Cluster-level error types

use stratus_steps::{RunError, StepError};
use thiserror::Error;

/// Error type for cluster lifecycle operations
#[derive(Debug, Error)]
pub enum ClusterError {
    /// No document stored under the requested key
    #[error("cluster document not found: {0}")]
    NotFound(String),

    /// The persisted install phase is outside the known set; a
    /// configuration error reported before any step runs
    #[error("unrecognised install phase {0}")]
    UnknownPhase(u8),

    /// An operation required an installation in progress but the
    /// document carries none
    #[error("cluster has no installation in progress")]
    InstallNotStarted,

    /// Another writer holds the document's lease
    #[error("lease for '{0}' is held by another writer")]
    LeaseConflict(String),

    /// A step body needed the in-cluster client before the
    /// initialization step ran
    #[error("cluster clients not initialized")]
    ClientsNotInitialized,

    /// A step aborted the run; carries the failing step's name and
    /// the partial duration map
    #[error(transparent)]
    Run(#[from] RunError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

// Step bodies surface store/document failures as plain execution
// errors; the runner's retry classification never applies to them.
impl From<ClusterError> for StepError {
    fn from(err: ClusterError) -> Self {
        StepError::Execution(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            ClusterError::UnknownPhase(7).to_string(),
            "unrecognised install phase 7"
        );
        assert_eq!(
            ClusterError::LeaseConflict("clusters/demo".to_string()).to_string(),
            "lease for 'clusters/demo' is held by another writer"
        );
    }

    #[test]
    fn test_step_error_conversion() {
        let err: StepError = ClusterError::InstallNotStarted.into();
        assert!(matches!(err, StepError::Execution(_)));
        assert!(!err.is_authorization_pending());
    }
}

//! Error types for step execution
//!
//! This module classifies step failures so the runner can decide
//! whether to abort, retry, or continue past them.

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Error type for a single step execution
#[derive(Debug, Error)]
pub enum StepError {
    /// An underlying collaborator returned an error
    #[error("step execution failed: {0}")]
    Execution(String),

    /// A condition predicate never became true within its timeout
    #[error("condition not met within {timeout:?}")]
    ConditionTimeout { timeout: Duration },

    /// A cloud IAM role assignment has not propagated yet; retryable
    /// within the authorization retry budget
    #[error("authorization not yet propagated: {0}")]
    AuthorizationPending(String),

    /// The authorization retry budget was exhausted without success
    #[error("authorization retry budget of {budget:?} exhausted")]
    RetryBudgetExhausted { budget: Duration },

    /// The run was cancelled by the caller
    #[error("run cancelled")]
    Cancelled,

    /// Two steps in one assembled list share a friendly name
    #[error("duplicate step name: {0}")]
    DuplicateStepName(String),
}

impl StepError {
    /// True if this error is the transient permission-propagation
    /// signature that `RetryingAction` tolerates.
    pub fn is_authorization_pending(&self) -> bool {
        matches!(self, StepError::AuthorizationPending(_))
    }

    /// True if this error came from run-level cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StepError::Cancelled)
    }

    /// True if this error is a condition timeout.
    pub fn is_condition_timeout(&self) -> bool {
        matches!(self, StepError::ConditionTimeout { .. })
    }
}

/// Result type for step operations
pub type Result<T> = std::result::Result<T, StepError>;

/// Terminal error of a run, tagged with the failing step's friendly
/// name. Carries the duration map for the steps that did execute so
/// partial progress is still attributable.
#[derive(Debug, Error)]
#[error("step '{step}' failed: {source}")]
pub struct RunError {
    /// Friendly name of the step that aborted the run
    pub step: String,

    /// The step error, returned verbatim
    #[source]
    pub source: StepError,

    /// Elapsed time per completed step, keyed by friendly name
    pub durations: HashMap<String, Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StepError::Execution("disk full".to_string());
        assert_eq!(err.to_string(), "step execution failed: disk full");

        let err = StepError::ConditionTimeout {
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "condition not met within 30s");

        let err = StepError::Cancelled;
        assert_eq!(err.to_string(), "run cancelled");
    }

    #[test]
    fn test_classification() {
        assert!(StepError::AuthorizationPending("role".into()).is_authorization_pending());
        assert!(!StepError::Execution("x".into()).is_authorization_pending());

        assert!(StepError::Cancelled.is_cancelled());
        assert!(!StepError::Cancelled.is_condition_timeout());

        let timeout = StepError::ConditionTimeout {
            timeout: Duration::from_secs(1),
        };
        assert!(timeout.is_condition_timeout());
        assert!(!timeout.is_cancelled());
    }

    #[test]
    fn test_run_error_display() {
        let err = RunError {
            step: "start_vms".to_string(),
            source: StepError::Execution("quota exceeded".to_string()),
            durations: HashMap::new(),
        };
        assert_eq!(
            err.to_string(),
            "step 'start_vms' failed: step execution failed: quota exceeded"
        );
    }
}

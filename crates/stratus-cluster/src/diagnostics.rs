//! Best-effort failure diagnostics

use std::time::Duration;

use async_trait::async_trait;
use stratus_steps::StepError;

/// Hard cap on post-failure log collection; a hung collector must not
/// hold the operation's terminal error hostage
pub const DIAGNOSTICS_TIMEOUT: Duration = Duration::from_secs(120);

/// Captures cluster logs after a failed run. Invoked best-effort:
/// its errors are logged and swallowed, never surfaced as the run's
/// result.
#[async_trait]
pub trait DiagnosticsCollector: Send + Sync {
    async fn gather_failure_logs(&self) -> Result<(), StepError>;
}

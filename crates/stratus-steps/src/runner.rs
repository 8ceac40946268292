//! Sequential step runner
//!
//! Executes an ordered step list strictly in order, applying each
//! variant's retry/abort contract and collecting per-step timings.
//! Later steps assume the side effects of earlier ones are already
//! externally visible, so no intra-run parallelism is permitted.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{RunError, StepError};
use crate::metrics::{MetricsEmitter, NoopEmitter};
use crate::step::Step;

/// Interval between condition polls unless overridden
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Backoff between authorization-pending retries
pub const AUTHORIZATION_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Wall-clock budget for authorization-pending retries
pub const AUTHORIZATION_RETRY_BUDGET: Duration = Duration::from_secs(600);

/// Metric emitted once per non-mandatory condition failure
pub const CONDITION_FAILURE_METRIC: &str = "steps.condition.failures";

/// Sequential step executor
///
/// One `Runner` executes one flow at a time; independent invocations
/// for different clusters each construct their own step list and may
/// share a runner configuration.
pub struct Runner {
    poll_interval: Duration,
    clock: Arc<dyn Clock>,
    shutdown: Option<watch::Receiver<bool>>,
    metrics: Arc<dyn MetricsEmitter>,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            clock: Arc::new(SystemClock),
            shutdown: None,
            metrics: Arc::new(NoopEmitter),
        }
    }

    /// Set the condition polling interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Replace the clock, for deterministic tests
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Observe a shutdown signal; a `true` value cancels the run
    /// within one polling tick
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Sink for the non-mandatory condition failure counter
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsEmitter>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Execute the steps strictly in order.
    ///
    /// On success returns elapsed time per step, keyed by friendly
    /// name. On the first abort-classified failure, stops immediately
    /// and returns the error tagged with the failing step's name plus
    /// the durations collected so far.
    pub async fn run<C: Send + Sync + 'static>(
        &self,
        ctx: Arc<C>,
        steps: &[Step<C>],
    ) -> Result<HashMap<String, Duration>, RunError> {
        let mut durations = HashMap::new();

        // Duplicate names would corrupt per-step duration attribution;
        // reject the whole list before executing anything.
        let mut seen = HashSet::new();
        for step in steps {
            if !seen.insert(step.friendly_name()) {
                return Err(RunError {
                    step: step.friendly_name().to_string(),
                    source: StepError::DuplicateStepName(step.friendly_name().to_string()),
                    durations,
                });
            }
        }

        for step in steps {
            let name = step.friendly_name();

            if self.is_cancelled() {
                return Err(RunError {
                    step: name.to_string(),
                    source: StepError::Cancelled,
                    durations,
                });
            }

            info!(step = %name, "running step");
            let started = self.clock.now();
            let result = self.execute(ctx.clone(), step).await;
            let elapsed = self.clock.now().saturating_duration_since(started);

            match result {
                Ok(()) => {
                    debug!(step = %name, ?elapsed, "step done");
                    durations.insert(name.to_string(), elapsed);
                }
                Err(err) => {
                    error!(step = %name, error = %err, "step failed");
                    return Err(RunError {
                        step: name.to_string(),
                        source: err,
                        durations,
                    });
                }
            }
        }

        Ok(durations)
    }

    async fn execute<C: Send + Sync + 'static>(
        &self,
        ctx: Arc<C>,
        step: &Step<C>,
    ) -> Result<(), StepError> {
        match step {
            Step::Action { run, .. } => run(ctx).await,
            Step::Condition {
                name,
                run,
                timeout,
                mandatory,
            } => {
                self.execute_condition(ctx, name, run, *timeout, *mandatory)
                    .await
            }
            Step::RetryingAction {
                name,
                run,
                refresher,
            } => self.execute_retrying_action(ctx, name, run, refresher).await,
        }
    }

    /// Poll the predicate immediately, then at the poll interval,
    /// until it returns true, errors, times out, or the run is
    /// cancelled. Cancellation always aborts; timeout and predicate
    /// errors abort only for mandatory conditions.
    async fn execute_condition<C: Send + Sync + 'static>(
        &self,
        ctx: Arc<C>,
        name: &str,
        run: &crate::step::ConditionFn<C>,
        timeout: Duration,
        mandatory: bool,
    ) -> Result<(), StepError> {
        let deadline = self.clock.now() + timeout;

        let outcome = loop {
            match run(ctx.clone()).await {
                Ok(true) => break Ok(()),
                Ok(false) => {
                    if self.clock.now() >= deadline {
                        break Err(StepError::ConditionTimeout { timeout });
                    }
                    if let Err(cancelled) = self.wait(self.poll_interval).await {
                        break Err(cancelled);
                    }
                }
                Err(err) => break Err(err),
            }
        };

        match outcome {
            Ok(()) => Ok(()),
            // Cancellation aborts regardless of the mandatory flag
            Err(StepError::Cancelled) => Err(StepError::Cancelled),
            Err(err) if !mandatory => {
                warn!(step = %name, error = %err, "non-mandatory condition failed, continuing");
                let mut dims = HashMap::new();
                dims.insert("step".to_string(), name.to_string());
                self.metrics.emit_gauge(CONDITION_FAILURE_METRIC, 1, Some(&dims));
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Run the action, retrying only while the error is classified
    /// authorization-pending. Each retry backs off a fixed interval
    /// and refreshes the credential; the whole loop is bounded by a
    /// wall-clock budget.
    async fn execute_retrying_action<C: Send + Sync + 'static>(
        &self,
        ctx: Arc<C>,
        name: &str,
        run: &crate::step::ActionFn<C>,
        refresher: &Arc<dyn crate::step::CredentialRefresher>,
    ) -> Result<(), StepError> {
        let started = self.clock.now();
        let mut attempts = 0u32;

        loop {
            if attempts > 0 {
                let elapsed = self.clock.now().saturating_duration_since(started);
                if elapsed >= AUTHORIZATION_RETRY_BUDGET {
                    return Err(StepError::RetryBudgetExhausted {
                        budget: AUTHORIZATION_RETRY_BUDGET,
                    });
                }
            }
            attempts += 1;

            match run(ctx.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_authorization_pending() => {
                    warn!(step = %name, attempts, error = %err, "authorization not yet propagated, retrying");
                    self.wait(AUTHORIZATION_RETRY_BACKOFF).await?;
                    refresher.refresh().await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Sleep for the given duration, returning early with
    /// `StepError::Cancelled` if the shutdown signal fires.
    async fn wait(&self, duration: Duration) -> Result<(), StepError> {
        match &self.shutdown {
            None => {
                self.clock.sleep(duration).await;
                Ok(())
            }
            Some(rx) => {
                let mut rx = rx.clone();
                if *rx.borrow() {
                    return Err(StepError::Cancelled);
                }
                tokio::select! {
                    _ = self.clock.sleep(duration) => Ok(()),
                    // A closed channel means the controlling process is
                    // going away; treat it the same as cancellation.
                    _ = rx.wait_for(|cancelled| *cancelled) => Err(StepError::Cancelled),
                }
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }
}

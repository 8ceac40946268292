//! Sequential step orchestration for long-running cluster operations
//!
//! This crate provides the generic execution engine: a closed catalog
//! of step variants ([`Step`]), a strictly sequential [`Runner`] that
//! applies each variant's retry/abort contract, and the supporting
//! clock, metrics, and error types. Domain workflows assemble step
//! lists over their own context type and hand them to the runner.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use stratus_steps::{Runner, Step};
//!
//! struct Ctx;
//!
//! # async fn demo() -> Result<(), stratus_steps::RunError> {
//! let steps = vec![
//!     Step::action("create_dns", |_ctx: Arc<Ctx>| async { Ok(()) }),
//!     Step::condition(
//!         "api_servers_ready",
//!         |_ctx: Arc<Ctx>| async { Ok(true) },
//!         Duration::from_secs(30 * 60),
//!         true,
//!     ),
//! ];
//! let durations = Runner::new().run(Arc::new(Ctx), &steps).await?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod error;
pub mod metrics;
pub mod runner;
pub mod step;

pub use clock::{Clock, SimulatedClock, SystemClock};
pub use error::{Result, RunError, StepError};
pub use metrics::{CollectingEmitter, Gauge, MetricsEmitter, NoopEmitter, TracingEmitter};
pub use runner::{
    Runner, AUTHORIZATION_RETRY_BACKOFF, AUTHORIZATION_RETRY_BUDGET, CONDITION_FAILURE_METRIC,
    DEFAULT_POLL_INTERVAL,
};
pub use step::{ActionFn, ConditionFn, Credential, CredentialRefresher, Step, StepFuture};

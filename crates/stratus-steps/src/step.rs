//! Step variants and credential refresh
//!
//! A [`Step`] is one schedulable unit of a cluster operation. The
//! catalog is a closed enum so the runner can dispatch each variant's
//! retry/abort contract with an exhaustive match. Names are assigned
//! explicitly at construction — never derived from the callable — and
//! must be unique within one assembled list, because they key the
//! per-step duration and failure attribution.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StepError;

/// Boxed future returned by step bodies
pub type StepFuture<T> = Pin<Box<dyn Future<Output = Result<T, StepError>> + Send>>;

/// One-shot action body
pub type ActionFn<C> = Arc<dyn Fn(Arc<C>) -> StepFuture<()> + Send + Sync>;

/// Polled readiness predicate body
pub type ConditionFn<C> = Arc<dyn Fn(Arc<C>) -> StepFuture<bool> + Send + Sync>;

/// An access credential for a cloud control plane. Possibly stale;
/// the engine never stores one, it only requests refreshes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// External source of fresh credentials, consulted by
/// `RetryingAction` while waiting out permission propagation.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self) -> Result<Credential, StepError>;
}

/// A unit of orchestration work with its own retry/fatality policy
pub enum Step<C> {
    /// Executes once; a non-nil error aborts the run
    Action { name: String, run: ActionFn<C> },

    /// Polls `run` at the runner's interval until it returns true,
    /// the timeout elapses, or it returns an error. `mandatory`
    /// decides whether timeout/error aborts the run or is only
    /// recorded.
    Condition {
        name: String,
        run: ConditionFn<C>,
        timeout: Duration,
        mandatory: bool,
    },

    /// An action tolerant of the transient permission-propagation
    /// error: on that classification the runner backs off, refreshes
    /// the credential, and retries within a bounded budget.
    RetryingAction {
        name: String,
        run: ActionFn<C>,
        refresher: Arc<dyn CredentialRefresher>,
    },
}

impl<C> Step<C> {
    /// Create a one-shot action step
    pub fn action<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        Step::Action {
            name: name.into(),
            run: Arc::new(move |ctx| Box::pin(f(ctx)) as StepFuture<()>),
        }
    }

    /// Create a polling condition step
    pub fn condition<F, Fut>(name: impl Into<String>, f: F, timeout: Duration, mandatory: bool) -> Self
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, StepError>> + Send + 'static,
    {
        Step::Condition {
            name: name.into(),
            run: Arc::new(move |ctx| Box::pin(f(ctx)) as StepFuture<bool>),
            timeout,
            mandatory,
        }
    }

    /// Create a permission-propagation-tolerant retrying action step
    pub fn retrying_action<F, Fut>(
        name: impl Into<String>,
        refresher: Arc<dyn CredentialRefresher>,
        f: F,
    ) -> Self
    where
        F: Fn(Arc<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        Step::RetryingAction {
            name: name.into(),
            run: Arc::new(move |ctx| Box::pin(f(ctx)) as StepFuture<()>),
            refresher,
        }
    }

    /// The stable identifier used for logs and metric keys
    pub fn friendly_name(&self) -> &str {
        match self {
            Step::Action { name, .. } => name,
            Step::Condition { name, .. } => name,
            Step::RetryingAction { name, .. } => name,
        }
    }
}

impl<C> fmt::Debug for Step<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Action { name, .. } => f.debug_struct("Action").field("name", name).finish(),
            Step::Condition {
                name,
                timeout,
                mandatory,
                ..
            } => f
                .debug_struct("Condition")
                .field("name", name)
                .field("timeout", timeout)
                .field("mandatory", mandatory)
                .finish(),
            Step::RetryingAction { name, .. } => f
                .debug_struct("RetryingAction")
                .field("name", name)
                .finish(),
        }
    }
}

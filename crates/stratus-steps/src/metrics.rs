//! Metrics emission for step timing and failure counts
//!
//! The engine reports per-step durations and condition failure counts
//! through a [`MetricsEmitter`], so callers can wire in their platform
//! telemetry pipeline. Emitters must tolerate concurrent use.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::info;

/// Sink for gauge metrics
pub trait MetricsEmitter: Send + Sync {
    /// Emit a single gauge value under the given metric name
    fn emit_gauge(&self, name: &str, value: i64, dimensions: Option<&HashMap<String, String>>);
}

/// A recorded gauge emission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gauge {
    pub name: String,
    pub value: i64,
    pub dimensions: HashMap<String, String>,
}

/// A no-op emitter for callers that do not report telemetry
#[derive(Debug, Default, Clone)]
pub struct NoopEmitter;

impl MetricsEmitter for NoopEmitter {
    fn emit_gauge(&self, _name: &str, _value: i64, _dimensions: Option<&HashMap<String, String>>) {
        // Intentionally empty
    }
}

/// An emitter that collects all gauges, for tests
#[derive(Debug, Default)]
pub struct CollectingEmitter {
    gauges: Mutex<Vec<Gauge>>,
}

impl CollectingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gauges(&self) -> Vec<Gauge> {
        self.gauges.lock().unwrap().clone()
    }

    /// Value of the first gauge emitted under `name`, if any
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.gauges
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.value)
    }

    /// Number of gauges emitted under `name`
    pub fn count_of(&self, name: &str) -> usize {
        self.gauges
            .lock()
            .unwrap()
            .iter()
            .filter(|g| g.name == name)
            .count()
    }
}

impl MetricsEmitter for CollectingEmitter {
    fn emit_gauge(&self, name: &str, value: i64, dimensions: Option<&HashMap<String, String>>) {
        self.gauges.lock().unwrap().push(Gauge {
            name: name.to_string(),
            value,
            dimensions: dimensions.cloned().unwrap_or_default(),
        });
    }
}

/// An emitter that logs gauges through `tracing`, used by the CLI
#[derive(Debug, Default, Clone)]
pub struct TracingEmitter;

impl MetricsEmitter for TracingEmitter {
    fn emit_gauge(&self, name: &str, value: i64, dimensions: Option<&HashMap<String, String>>) {
        match dimensions {
            Some(dims) => info!(metric = %name, value, ?dims, "gauge"),
            None => info!(metric = %name, value, "gauge"),
        }
    }
}

//! The lifecycle contract shared by long-lived components.

use super::{ModuleConfig, ModuleManifest, ModuleResult, ModuleStatus};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Point-in-time metrics reported by a module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsPayload {
    /// Monotonically increasing counters.
    pub counters: BTreeMap<String, u64>,

    /// Values that can go up and down.
    pub gauges: BTreeMap<String, f64>,
}

impl MetricsPayload {
    /// Creates a new empty metrics payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a counter metric.
    pub fn counter(&mut self, name: impl Into<String>, value: u64) {
        self.counters.insert(name.into(), value);
    }

    /// Adds a gauge metric.
    pub fn gauge(&mut self, name: impl Into<String>, value: f64) {
        self.gauges.insert(name.into(), value);
    }

    /// Formats metrics in Prometheus text format, sorted by name.
    #[must_use]
    pub fn to_prometheus(&self, prefix: &str) -> String {
        let mut output = String::new();

        for (name, value) in &self.counters {
            let _ = writeln!(output, "{prefix}_{name} {value}");
        }
        for (name, value) in &self.gauges {
            let _ = writeln!(output, "{prefix}_{name} {value}");
        }

        output
    }
}

/// Lifecycle contract.
///
/// # Lifecycle
///
/// 1. `manifest()` - identity and capabilities
/// 2. `init()` - apply configuration
/// 3. `start()` - begin background work
/// 4. `status()` / `metrics()` / `heartbeat()` - monitoring
/// 5. `stop()` - signal background work to end
pub trait ModuleContract: Send + Sync {
    /// Returns the module's manifest.
    fn manifest(&self) -> ModuleManifest;

    /// Initializes the module with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::ConfigError` if the configuration is invalid and
    /// `ModuleError::InvalidState` if the module is running.
    fn init(&mut self, config: ModuleConfig) -> ModuleResult<()>;

    /// Starts background processing.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::StartFailed` if the module cannot start.
    fn start(&mut self) -> ModuleResult<()>;

    /// Stops background processing.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::InvalidState` if the module is not running.
    fn stop(&mut self) -> ModuleResult<()>;

    /// Returns the current status of the module.
    fn status(&self) -> ModuleStatus;

    /// Returns the current metrics of the module.
    fn metrics(&self) -> MetricsPayload;

    /// Liveness check. Defaults to [`ModuleStatus::is_operational`].
    fn heartbeat(&self) -> bool {
        self.status().is_operational()
    }
}

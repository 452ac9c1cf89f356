//! Rate limiting in front of admission control.

use super::status::SystemStatus;
use crate::config::{ConfigLoader, QuotaGateConfig};
use crate::module::{
    Capability, MetricsPayload, ModuleConfig, ModuleContract, ModuleError, ModuleManifest,
    ModuleResult, ModuleStatus,
};
use crate::modules::load_balancer::{
    LoadBalancer, LoadBalancerResult, LoadBalancerStats, SharedHandler,
};
use crate::modules::rate_limiting::TieredRateLimiter;
use crate::outcome::{Outcome, Rejection};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle on the background queue drain task.
struct DrainTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl DrainTask {
    fn signal(&self) {
        // No receiver means the task has already exited.
        let _ = self.shutdown.send(true);
    }
}

/// Rate limiter and load balancer behind one entry point.
///
/// [`setup`](Self::setup) must run inside a tokio runtime before requests
/// can be queued; without it a request that finds every slot taken is
/// rejected as overloaded.
pub struct Middleware<Req, Resp> {
    config: QuotaGateConfig,
    rate_limiter: TieredRateLimiter,
    load_balancer: Arc<LoadBalancer<Req, Resp>>,
    drain: Mutex<Option<DrainTask>>,
    started: AtomicBool,
}

impl<Req, Resp> std::fmt::Debug for Middleware<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Middleware")
            .field("rate_limiter", &self.rate_limiter)
            .field("load_balancer", &self.load_balancer)
            .field("draining", &self.drain.lock().is_some())
            .finish()
    }
}

impl<Req, Resp> Middleware<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Build a middleware from configuration. Nothing is spawned until
    /// [`setup`](Self::setup).
    #[must_use]
    pub fn new(config: QuotaGateConfig) -> Self {
        Self {
            rate_limiter: TieredRateLimiter::new(config.rate_limit.clone()),
            load_balancer: Arc::new(LoadBalancer::new(
                config.load_balancing.clone(),
                config.queue.clone(),
            )),
            config,
            drain: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(QuotaGateConfig::default())
    }

    /// Start the queue drain task. Calling this again while the task runs
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Fails outside a tokio runtime.
    pub fn setup(&self) -> LoadBalancerResult<()> {
        let mut drain = self.drain.lock();
        if drain.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            return Ok(());
        }

        let (shutdown, rx) = watch::channel(false);
        let handle = self.load_balancer.spawn_drain(rx)?;
        *drain = Some(DrainTask { shutdown, handle });
        self.started.store(true, Ordering::Release);

        info!(
            max_in_flight = self.load_balancer.config().max_requests_in_flight,
            queue_capacity = self.load_balancer.queue().capacity(),
            "middleware started"
        );
        Ok(())
    }

    /// Stop the drain task and wait for it to exit. Requests still queued
    /// are answered with a shutdown rejection.
    pub async fn shutdown(&self) {
        let task = self.drain.lock().take();
        let Some(task) = task else {
            return;
        };

        task.signal();
        if let Err(e) = task.handle.await {
            warn!(error = %e, "queue drain task ended abnormally");
        }
        info!("middleware stopped");
    }

    /// Rate-limit `request`, then pass it through admission control.
    ///
    /// A denied request is rejected with the caller's remaining allowance
    /// and never reaches the load balancer.
    pub async fn handle_request(
        &self,
        request: Req,
        handler: SharedHandler<Req, Resp>,
        user_id: &str,
        ip: &str,
    ) -> Outcome<Resp> {
        let decision = self.rate_limiter.check_detailed(user_id, ip);
        if !decision.allowed {
            let remaining = self.rate_limiter.remaining_tokens(user_id, ip);
            debug!(
                user_id,
                ip,
                tier = decision.exhausted.map(|tier| tier.as_str()),
                "rate limit exceeded"
            );
            return Rejection::rate_limited(remaining, self.config.queue.retry_delay).into();
        }

        self.load_balancer.handle(request, handler).await
    }

    /// Remaining allowance for `user_id`/`ip` and the current load.
    #[must_use]
    pub fn get_system_status(&self, user_id: &str, ip: &str) -> SystemStatus {
        SystemStatus {
            rate_limits: self.rate_limiter.remaining_tokens(user_id, ip),
            system_load: self.load_balancer.system_load(),
        }
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &TieredRateLimiter {
        &self.rate_limiter
    }

    #[must_use]
    pub fn load_balancer(&self) -> &Arc<LoadBalancer<Req, Resp>> {
        &self.load_balancer
    }

    #[must_use]
    pub fn config(&self) -> &QuotaGateConfig {
        &self.config
    }
}

impl<Req, Resp> ModuleContract for Middleware<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest::builder("quota-gate")
            .description("Tiered rate limiting and admission control")
            .version(0, 1, 0)
            .capability(Capability::RateLimiting)
            .capability(Capability::LoadBalancing)
            .build()
    }

    fn init(&mut self, config: ModuleConfig) -> ModuleResult<()> {
        let status = self.status();
        if status.is_operational() {
            return Err(ModuleError::InvalidState {
                current: status.to_string(),
                expected: "not running".to_string(),
            });
        }

        let config = match config.raw_config() {
            Some(raw) => ConfigLoader::standard()
                .load_str(raw)
                .map_err(|e| ModuleError::ConfigError(e.to_string()))?,
            None => QuotaGateConfig::default(),
        };

        debug!(?config, "initializing middleware");
        *self = Self::new(config);
        Ok(())
    }

    fn start(&mut self) -> ModuleResult<()> {
        self.setup()
            .map_err(|e| ModuleError::StartFailed(e.to_string()))
    }

    fn stop(&mut self) -> ModuleResult<()> {
        let Some(task) = self.drain.get_mut().take() else {
            return Err(ModuleError::InvalidState {
                current: self.status().to_string(),
                expected: "running".to_string(),
            });
        };

        // The task exits on its own once signalled; `shutdown` is the
        // variant that waits.
        task.signal();
        info!(
            checks = self.rate_limiter.total_checks(),
            denied = self.rate_limiter.total_denied(),
            "middleware stopping"
        );
        Ok(())
    }

    fn status(&self) -> ModuleStatus {
        match self.drain.lock().as_ref() {
            Some(task) if task.handle.is_finished() => ModuleStatus::Degraded {
                reason: "queue drain task exited".to_string(),
            },
            Some(_) => ModuleStatus::Running,
            None if self.started.load(Ordering::Acquire) => ModuleStatus::Stopped,
            None => ModuleStatus::Initialized,
        }
    }

    fn metrics(&self) -> MetricsPayload {
        let mut metrics = MetricsPayload::new();

        metrics.counter("rate_limit_checks", self.rate_limiter.total_checks());
        metrics.counter("rate_limit_allowed", self.rate_limiter.total_allowed());
        metrics.counter("rate_limit_denied", self.rate_limiter.total_denied());
        metrics.gauge("tracked_users", self.rate_limiter.tracked_users() as f64);
        metrics.gauge("tracked_ips", self.rate_limiter.tracked_ips() as f64);

        let stats = self.load_balancer.stats();
        metrics.counter("requests_total", LoadBalancerStats::get(&stats.total_requests));
        metrics.counter(
            "requests_admitted_directly",
            LoadBalancerStats::get(&stats.admitted_directly),
        );
        metrics.counter("requests_queued", LoadBalancerStats::get(&stats.queued));
        metrics.counter(
            "requests_rejected_overload",
            LoadBalancerStats::get(&stats.rejected_overload),
        );
        metrics.counter("requests_timed_out", LoadBalancerStats::get(&stats.timed_out));
        metrics.counter("requests_completed", LoadBalancerStats::get(&stats.completed));

        let load = self.load_balancer.system_load();
        metrics.gauge("current_requests", load.current_requests as f64);
        metrics.gauge("queue_size", load.queue_size as f64);
        metrics.gauge("active_requests", load.active_requests as f64);
        metrics.gauge(
            "max_requests_in_flight",
            self.load_balancer.config().max_requests_in_flight as f64,
        );

        metrics
    }
}

impl<Req, Resp> Drop for Middleware<Req, Resp> {
    fn drop(&mut self) {
        if let Some(task) = self.drain.get_mut().take() {
            task.handle.abort();
        }
    }
}

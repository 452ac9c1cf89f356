//! Admission controller: concurrency cap, overflow queue and handler deadline.

use super::config::{LoadBalancerConfig, QueueConfig, TimeoutPolicy};
use super::error::{LoadBalancerError, LoadBalancerResult};
use super::handler::SharedHandler;
use super::queue::RequestQueue;
use crate::logging::millis;
use crate::outcome::{Outcome, Rejection};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch, OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A handler result, or the panic payload of a handler that panicked.
type Executed<Resp> = std::thread::Result<Outcome<Resp>>;

/// Point-in-time load snapshot. Fields are read independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemLoad {
    /// Handlers currently holding an in-flight slot.
    pub current_requests: usize,
    /// Requests waiting in the queue.
    pub queue_size: usize,
    /// Queued requests taken by the drain task and not yet finished.
    pub active_requests: usize,
}

/// Admission statistics.
#[derive(Debug, Default)]
pub struct LoadBalancerStats {
    /// Requests passed to `handle`.
    pub total_requests: AtomicU64,
    /// Requests that got a slot immediately.
    pub admitted_directly: AtomicU64,
    /// Requests that waited in the queue.
    pub queued: AtomicU64,
    /// Requests refused for lack of capacity.
    pub rejected_overload: AtomicU64,
    /// Handlers that missed their deadline.
    pub timed_out: AtomicU64,
    /// Handlers that finished in time.
    pub completed: AtomicU64,
}

impl LoadBalancerStats {
    fn record(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a counter.
    #[must_use]
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// A request parked in the queue together with everything needed to run it.
pub struct QueuedRequest<Req, Resp> {
    request: Req,
    handler: SharedHandler<Req, Resp>,
    responder: oneshot::Sender<Executed<Resp>>,
}

/// The drain loop currently entitled to consume the queue.
struct DrainOwner {
    generation: u64,
    shutdown: watch::Receiver<bool>,
}

/// Admission controller.
///
/// At most `max_requests_in_flight` handlers run at once. A request finding
/// every slot taken waits in the bounded queue until the drain task hands it
/// a slot; if the queue stays full for `queue_timeout` the request is
/// rejected. Every handler runs under `request_timeout`.
pub struct LoadBalancer<Req, Resp> {
    config: LoadBalancerConfig,
    queue_config: QueueConfig,
    queue: RequestQueue<QueuedRequest<Req, Resp>>,
    slots: Arc<Semaphore>,
    drain_owner: Mutex<Option<DrainOwner>>,
    drain_generation: AtomicU64,
    stats: LoadBalancerStats,
}

impl<Req, Resp> std::fmt::Debug for LoadBalancer<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("config", &self.config)
            .field("queue", &self.queue)
            .field("available_slots", &self.slots.available_permits())
            .field("draining", &self.is_draining())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<Req, Resp> LoadBalancer<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    /// Create a load balancer.
    #[must_use]
    pub fn new(config: LoadBalancerConfig, queue_config: QueueConfig) -> Self {
        let max_in_flight = config.max_requests_in_flight.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            queue: RequestQueue::from_config(&queue_config),
            slots: Arc::new(Semaphore::new(max_in_flight)),
            config: LoadBalancerConfig {
                max_requests_in_flight: max_in_flight,
                ..config
            },
            queue_config,
            drain_owner: Mutex::new(None),
            drain_generation: AtomicU64::new(0),
            stats: LoadBalancerStats::default(),
        }
    }

    /// Create a load balancer with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoadBalancerConfig::default(), QueueConfig::default())
    }

    /// Run `request` through admission control.
    ///
    /// With a free slot the handler runs immediately. Otherwise the request
    /// is queued and this call resolves once the drain task has run it. A
    /// handler panic is resumed on the caller.
    pub async fn handle(&self, request: Req, handler: SharedHandler<Req, Resp>) -> Outcome<Resp> {
        LoadBalancerStats::record(&self.stats.total_requests);

        let executed = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => {
                LoadBalancerStats::record(&self.stats.admitted_directly);
                self.execute(permit, request, handler).await
            }
            Err(TryAcquireError::NoPermits) => match self.enqueue(request, handler).await {
                Ok(rx) => match rx.await {
                    Ok(executed) => executed,
                    Err(_) => Ok(Outcome::Rejected(Rejection::shutdown(
                        self.queue_config.retry_delay,
                    ))),
                },
                Err(rejection) => Ok(Outcome::Rejected(rejection)),
            },
            Err(TryAcquireError::Closed) => Ok(Outcome::Rejected(Rejection::shutdown(
                self.queue_config.retry_delay,
            ))),
        };

        match executed {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn enqueue(
        &self,
        request: Req,
        handler: SharedHandler<Req, Resp>,
    ) -> Result<oneshot::Receiver<Executed<Resp>>, Rejection> {
        if !self.is_draining() {
            LoadBalancerStats::record(&self.stats.rejected_overload);
            warn!(
                max_in_flight = self.config.max_requests_in_flight,
                "at capacity and no drain task running, rejecting request"
            );
            return Err(Rejection::overloaded(
                self.queue.len(),
                self.queue_config.retry_delay,
            ));
        }

        let (responder, rx) = oneshot::channel();
        let queued = QueuedRequest {
            request,
            handler,
            responder,
        };

        if self.queue.add(queued).await {
            LoadBalancerStats::record(&self.stats.queued);
            if !self.is_draining() {
                // The drain loop exited between the check above and the
                // add; nobody will read the queue, so answer its waiters.
                let dropped = self.queue.drain().len();
                debug!(dropped, "drain loop gone after enqueue, releasing waiters");
            }
            debug!(queue_size = self.queue.len(), "request queued");
            Ok(rx)
        } else {
            LoadBalancerStats::record(&self.stats.rejected_overload);
            let queue_size = self.queue.len();
            warn!(
                queue_size,
                capacity = self.queue.capacity(),
                "system is at capacity, rejecting request"
            );
            Err(Rejection::overloaded(
                queue_size,
                self.queue_config.retry_delay,
            ))
        }
    }

    /// Run the handler in its own task under the request deadline.
    ///
    /// The slot is held until this returns, whatever the exit path.
    async fn execute(
        &self,
        permit: OwnedSemaphorePermit,
        request: Req,
        handler: SharedHandler<Req, Resp>,
    ) -> Executed<Resp> {
        let _permit = permit;
        let deadline = self.config.request_timeout;
        let mut task = tokio::spawn(handler.call(request));

        match tokio::time::timeout(deadline, &mut task).await {
            Ok(Ok(response)) => {
                LoadBalancerStats::record(&self.stats.completed);
                Ok(Outcome::Completed(response))
            }
            Ok(Err(join_error)) => match join_error.try_into_panic() {
                Ok(panic) => Err(panic),
                Err(_) => Ok(Outcome::Rejected(Rejection::shutdown(
                    self.queue_config.retry_delay,
                ))),
            },
            Err(_) => {
                LoadBalancerStats::record(&self.stats.timed_out);
                if self.config.timeout_policy == TimeoutPolicy::Cancel {
                    task.abort();
                }
                warn!(
                    timeout_ms = millis(deadline),
                    policy = ?self.config.timeout_policy,
                    "request timed out"
                );
                Ok(Outcome::Rejected(Rejection::timed_out(
                    self.queue_config.retry_delay,
                )))
            }
        }
    }

    /// Drain the queue until `shutdown` turns `true` (or its sender is
    /// dropped) or the queue closes.
    ///
    /// Each taken request waits for a free slot and then runs in its own
    /// task; its outcome is delivered to the waiting caller. Requests still
    /// queued on exit are dropped and their callers receive a shutdown
    /// rejection.
    ///
    /// A loop that has been signalled but not yet exited does not block a
    /// new one; it hands the queue over without draining it.
    ///
    /// # Errors
    ///
    /// Returns [`LoadBalancerError::AlreadyDraining`] if another drain loop
    /// is active and not signalled on this load balancer.
    pub async fn process_queue(
        self: Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> LoadBalancerResult<()> {
        let generation = self.claim_drain(&shutdown)?;
        self.drain_loop(shutdown, generation).await;
        Ok(())
    }

    /// Spawn [`process_queue`](Self::process_queue) on the current runtime.
    ///
    /// The drain flag is set before this returns, so requests arriving
    /// immediately afterwards are queued rather than rejected.
    ///
    /// # Errors
    ///
    /// Fails if a drain loop is already active or no tokio runtime is
    /// available.
    pub fn spawn_drain(
        self: &Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> LoadBalancerResult<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LoadBalancerError::NoRuntime(e.to_string()))?;
        let generation = self.claim_drain(&shutdown)?;

        let lb = Arc::clone(self);
        Ok(runtime.spawn(async move { lb.drain_loop(shutdown, generation).await }))
    }

    fn claim_drain(&self, shutdown: &watch::Receiver<bool>) -> LoadBalancerResult<u64> {
        let mut owner = self.drain_owner.lock();
        if owner
            .as_ref()
            .is_some_and(|current| !is_signalled(&current.shutdown))
        {
            return Err(LoadBalancerError::AlreadyDraining);
        }

        let generation = self.drain_generation.fetch_add(1, Ordering::Relaxed) + 1;
        *owner = Some(DrainOwner {
            generation,
            shutdown: shutdown.clone(),
        });
        Ok(generation)
    }

    /// Give up ownership if `generation` still holds it. Returns whether it
    /// did.
    fn release_drain(&self, generation: u64) -> bool {
        let mut owner = self.drain_owner.lock();
        if owner
            .as_ref()
            .is_some_and(|current| current.generation == generation)
        {
            *owner = None;
            true
        } else {
            false
        }
    }

    async fn drain_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>, generation: u64) {
        let interval = self.queue_config.drain_interval;
        info!(
            interval_ms = millis(interval),
            capacity = self.queue.capacity(),
            "queue drain task started"
        );

        loop {
            let taken = tokio::select! {
                biased;
                () = stopped(&mut shutdown) => break,
                taken = self.queue.take() => taken,
            };
            let Some(QueuedRequest {
                request,
                handler,
                responder,
            }) = taken
            else {
                break;
            };

            let permit = tokio::select! {
                biased;
                () = stopped(&mut shutdown) => None,
                permit = Arc::clone(&self.slots).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                // Dropping the responder rejects the waiting caller.
                self.queue.complete();
                break;
            };

            if responder.is_closed() {
                // Caller gave up while waiting.
                self.queue.complete();
                continue;
            }

            let lb = Arc::clone(&self);
            tokio::spawn(async move {
                let executed = lb.execute(permit, request, handler).await;
                let _ = responder.send(executed);
                lb.queue.complete();
            });

            if self.queue.is_empty() && !interval.is_zero() {
                tokio::select! {
                    biased;
                    () = stopped(&mut shutdown) => break,
                    () = tokio::time::sleep(interval) => {}
                }
            }
        }

        // Ownership is released before draining so that a caller enqueueing
        // concurrently either lands in this drain or sees no owner.
        if self.release_drain(generation) {
            let dropped = self.queue.drain().len();
            info!(generation, dropped, "queue drain task stopped");
        } else {
            info!(generation, "queue drain task stopped, queue handed over");
        }
    }

    /// Whether a drain loop owns the queue and has not been told to stop.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.drain_owner
            .lock()
            .as_ref()
            .is_some_and(|owner| !is_signalled(&owner.shutdown))
    }

    /// Current load snapshot.
    #[must_use]
    pub fn system_load(&self) -> SystemLoad {
        SystemLoad {
            current_requests: self.config.max_requests_in_flight - self.slots.available_permits(),
            queue_size: self.queue.len(),
            active_requests: self.queue.active_requests(),
        }
    }

    /// Get the queue.
    #[must_use]
    pub fn queue(&self) -> &RequestQueue<QueuedRequest<Req, Resp>> {
        &self.queue
    }

    /// Get statistics.
    #[must_use]
    pub fn stats(&self) -> &LoadBalancerStats {
        &self.stats
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &LoadBalancerConfig {
        &self.config
    }

    /// Get the queue configuration.
    #[must_use]
    pub fn queue_config(&self) -> &QueueConfig {
        &self.queue_config
    }
}

/// Whether `true` has been published or the sender is gone.
fn is_signalled(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Resolves once `true` is published or the sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

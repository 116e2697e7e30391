use super::{Queue, ReconcileRequest};
use crate::prelude::{debug, warn};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Per-item exponential backoff configuration.
///
/// The n-th consecutive rate-limited add of the same request is delayed by
/// `base_delay * 2^n`, capped at `max_delay`, plus a small jitter.
///
/// If `base_delay > max_delay`, they are swapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Delay applied to the first retry.
    pub base_delay: Duration,
    /// Upper bound for any retry delay.
    pub max_delay: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_secs(1000),
        }
    }
}

impl RateLimiterConfig {
    pub(crate) fn normalize(mut self) -> Self {
        if self.base_delay > self.max_delay {
            std::mem::swap(&mut self.base_delay, &mut self.max_delay);
        }
        self
    }
}

/// Delay for a request that has already been requeued `failures` times.
///
/// Jitter is up to 10% of the exponential delay, computed in milliseconds.
#[allow(clippy::cast_possible_truncation)]
fn backoff_for(config: RateLimiterConfig, failures: u32) -> Duration {
    let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
    let base = config
        .base_delay
        .checked_mul(factor)
        .map_or(config.max_delay, |d| d.min(config.max_delay));

    let jitter = (base.as_millis() / 10).min(u128::from(u64::MAX)) as u64;
    let add = if jitter > 0 {
        fastrand::u64(0..=jitter)
    } else {
        0
    };

    base.saturating_add(Duration::from_millis(add))
        .min(config.max_delay)
}

#[derive(Default)]
struct State {
    // FIFO of requests waiting to be handed out; never holds duplicates.
    queue: VecDeque<ReconcileRequest>,
    // Requests that need processing, queued or not.
    dirty: HashSet<ReconcileRequest>,
    // Requests handed out by `get` and not yet marked `done`.
    processing: HashSet<ReconcileRequest>,
    failures: HashMap<ReconcileRequest, u32>,
}

struct Inner {
    state: Mutex<State>,
    notify: Notify,
    cancel: CancellationToken,
    limiter: RateLimiterConfig,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(&self, request: ReconcileRequest) {
        if self.cancel.is_cancelled() {
            debug!("Ignoring add on shut down queue: request={}", request);
            return;
        }

        let mut state = self.lock();
        if !state.dirty.insert(request.clone()) {
            return;
        }
        // Requeued by `done` once the current processing finishes.
        if state.processing.contains(&request) {
            return;
        }
        state.queue.push_back(request);
        drop(state);

        self.notify.notify_one();
    }
}

/// Work queue with coalescing and per-item rate limiting.
///
/// Semantics:
/// - a request that is already waiting is not queued twice;
/// - a request handed out by [`get`](Self::get) is never handed out to a second
///   consumer concurrently; adding it again while it is processed queues it
///   once [`done`](Self::done) is called;
/// - [`add_rate_limited`](Self::add_rate_limited) re-adds after an exponential
///   per-request delay, reset by [`forget`](Self::forget).
///
/// Cloning yields another handle to the same queue.
///
/// Delayed adds spawn onto the current Tokio runtime. Outside a runtime they
/// degrade to an immediate add.
#[derive(Clone)]
pub struct RateLimitingQueue {
    inner: Arc<Inner>,
}

impl Debug for RateLimitingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("RateLimitingQueue")
            .field("queued", &state.queue.len())
            .field("processing", &state.processing.len())
            .field("limiter", &self.inner.limiter)
            .field("shutting_down", &self.inner.cancel.is_cancelled())
            .finish()
    }
}

impl Default for RateLimitingQueue {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

impl RateLimitingQueue {
    /// Creates an empty queue.
    pub fn new(limiter: RateLimiterConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                notify: Notify::new(),
                cancel: CancellationToken::new(),
                limiter: limiter.normalize(),
            }),
        }
    }

    /// Waits for the next request.
    ///
    /// Returns `None` once the queue is shut down and drained. The caller must
    /// call [`done`](Self::done) when it has finished with the request.
    pub async fn get(&self) -> Option<ReconcileRequest> {
        loop {
            let notified = self.inner.notify.notified();

            {
                let mut state = self.inner.lock();
                if let Some(request) = state.queue.pop_front() {
                    state.dirty.remove(&request);
                    state.processing.insert(request.clone());
                    return Some(request);
                }
            }

            tokio::select! {
                () = self.inner.cancel.cancelled() => {
                    // Items queued between the check above and shutdown are still drained.
                    if self.inner.lock().queue.is_empty() {
                        return None;
                    }
                }
                () = notified => {}
            }
        }
    }

    /// Marks a request as processed.
    pub fn done(&self, request: &ReconcileRequest) {
        let mut state = self.inner.lock();
        state.processing.remove(request);

        if state.dirty.contains(request) {
            state.queue.push_back(request.clone());
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Adds a request after `delay`.
    pub fn add_after(&self, request: ReconcileRequest, delay: Duration) {
        if delay.is_zero() {
            self.inner.add(request);
            return;
        }

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(
                    "No Tokio runtime for delayed add; adding immediately: request={}, error={}",
                    request, e
                );
                self.inner.add(request);
                return;
            }
        };

        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            tokio::select! {
                () = inner.cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => inner.add(request),
            }
        });
    }

    /// Adds a request after its rate-limited delay and counts the retry.
    pub fn add_rate_limited(&self, request: ReconcileRequest) {
        let failures = {
            let mut state = self.inner.lock();
            let failures = state.failures.entry(request.clone()).or_insert(0);
            let previous = *failures;
            *failures = failures.saturating_add(1);
            previous
        };

        let delay = backoff_for(self.inner.limiter, failures);
        debug!(
            "Requeueing with backoff: request={}, requeues={}, backoff_ms={}",
            request,
            failures + 1,
            delay.as_millis()
        );
        self.add_after(request, delay);
    }

    /// Clears the retry count of a request.
    pub fn forget(&self, request: &ReconcileRequest) {
        self.inner.lock().failures.remove(request);
    }

    /// Number of rate-limited adds since the request was last forgotten.
    pub fn num_requeues(&self, request: &ReconcileRequest) -> u32 {
        self.inner
            .lock()
            .failures
            .get(request)
            .copied()
            .unwrap_or(0)
    }

    /// Number of requests waiting to be handed out.
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Returns `true` if no request is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops accepting requests. Consumers drain what is queued, then
    /// [`get`](Self::get) returns `None`.
    pub fn shut_down(&self) {
        self.inner.cancel.cancel();
    }

    /// Returns `true` once [`shut_down`](Self::shut_down) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

impl Queue for RateLimitingQueue {
    fn add(&self, request: ReconcileRequest) {
        self.inner.add(request);
    }
}

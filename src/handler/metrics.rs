use super::errors::MetricsErrorKind;

/// Trait for recording metrics from a `LinkedResourceHandler`.
///
/// Implement this trait to integrate with your metrics system. Methods are
/// called from event handling paths and may run concurrently.
///
/// # Example
///
/// ```
/// use linked_resources::handler::{MetricsErrorKind, MetricsRecorder};
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// #[derive(Default)]
/// struct Counters {
///     enqueued: AtomicU64,
///     errors: AtomicU64,
/// }
///
/// impl MetricsRecorder for Counters {
///     fn record_enqueued(&self) {
///         self.enqueued.fetch_add(1, Ordering::Relaxed);
///     }
///
///     fn record_error(&self, kind: MetricsErrorKind) {
///         self.errors.fetch_add(1, Ordering::Relaxed);
///         println!("error: {}", kind.as_str());
///     }
/// }
/// ```
pub trait MetricsRecorder: Send + Sync {
    /// Records that a request was handed to the queue or the enqueue hook.
    fn record_enqueued(&self);

    /// Records an error with a structured error kind.
    fn record_error(&self, kind: MetricsErrorKind);
}

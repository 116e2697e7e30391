//! Linked resource handler: reverse-index event fan-out.
//!
//! Many controllers reconcile objects (say `CertificateRequest`s `A1`, `A2`,
//! `A3`) that reference another object (an issuer `B1`). When `B1` changes,
//! every `A` that references it has to be reconciled again. Rather than
//! scanning every `A` on every `B` event, [`LinkedResourceHandler`] registers a
//! secondary index on the cache of `A` objects, keyed by the `<namespace>/<name>`
//! of the `B` they reference. A watch event on `B1` then becomes one indexed
//! list and one [`ReconcileRequest`](crate::queue::ReconcileRequest) per match.
//!
//! # Setup
//!
//! [`LinkedResourceHandlerBuilder::build`] generates a random index name
//! (`.x-index.<10 alphanumerics>` by default), resolves the linked kind
//! through the [`Scheme`](crate::scheme::Scheme), and installs the index. Any
//! failure is returned; no half-built handler escapes.
//!
//! # Event handling
//!
//! The [`EventHandler`] methods map the event's object through the index,
//! drop requests already produced during the same call, and hand the rest to
//! the queue (or to the configured enqueue hook). `update` maps both the old
//! and the new state into a single dedup set.
//!
//! # Failure mode
//!
//! Event methods have no error channel. If listing the cache fails, the
//! handler logs one error record naming the object, records
//! [`MetricsErrorKind::ListFailed`], and produces nothing for that event. The
//! missed reconciliation is only recovered when the event source resyncs and
//! re-delivers the object, so the staleness window after such a drop is
//! bounded by the source's resync period, not by this handler.

mod builder;
mod errors;
mod event;
mod linked;
mod metrics;

pub use builder::LinkedResourceHandlerBuilder;
pub use errors::{HandlerError, MalformedObject, MetricsErrorKind};
pub use event::{Event, EventHandler};
pub use linked::{EnqueueHook, LinkedResourceHandler};
pub use metrics::MetricsRecorder;

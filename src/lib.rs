#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

//! Reverse-index event fan-out for resource-reconciliation controllers.
//!
//! A controller that reconciles objects of kind `A`, each of which references
//! an object of kind `B`, needs every referencing `A` reconciled whenever a `B`
//! changes. [`LinkedResourceHandler`] does this with a secondary index on the
//! cache of `A` objects and turns every `B` event into deduplicated
//! [`ReconcileRequest`]s.
//!
//! The crate also carries the pieces such a controller is built around: an
//! [`InMemoryCache`] with field indexes, a [`RateLimitingQueue`] work queue, and
//! helpers resolving the workload identity and issuance request of a
//! certificate request.
//!
//! # Examples
//!
//! ```
//! use linked_resources::{
//!     DynamicObject, EventHandler, GroupVersionKind, InMemoryCache, LinkedResourceHandler,
//!     ReconcileRequest, Scheme, TypeMeta,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let request_kind = GroupVersionKind::gvk("cert-manager.io", "v1", "CertificateRequest");
//!
//! let mut scheme = Scheme::new();
//! scheme.register(request_kind.clone());
//!
//! let cache = Arc::new(InMemoryCache::new());
//!
//! // Index certificate requests by the issuer they reference.
//! let handler = LinkedResourceHandler::builder(
//!     Arc::new(scheme),
//!     cache.clone(),
//!     TypeMeta::kind("CertificateRequest"),
//!     |request: &DynamicObject| {
//!         request.data["issuerRef"]["name"]
//!             .as_str()
//!             .map(|issuer| vec![format!("{}/{}", request.namespace(), issuer)])
//!             .unwrap_or_default()
//!     },
//! )
//! .build(&CancellationToken::new())?;
//! cache.start();
//!
//! for name in ["a1", "a2"] {
//!     cache.apply(
//!         &request_kind,
//!         DynamicObject::new(TypeMeta::from(&request_kind), "certs", name)
//!             .with_data(serde_json::json!({ "issuerRef": { "name": "b1" } })),
//!     );
//! }
//!
//! // An event on issuer `certs/b1` requeues both requests.
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ReconcileRequest>();
//! let issuer = DynamicObject::new(TypeMeta::new("cert-manager.athenz.io/v1", "AthenzIssuer"), "certs", "b1");
//! handler.create(&issuer, &tx);
//!
//! let mut requests = Vec::new();
//! while let Ok(request) = rx.try_recv() {
//!     requests.push(request);
//! }
//! requests.sort_by(|a, b| a.name.cmp(&b.name));
//! assert_eq!(
//!     requests,
//!     vec![ReconcileRequest::new("certs", "a1"), ReconcileRequest::new("certs", "a2")]
//! );
//! # Ok(())
//! # }
//! ```

mod observability;
mod prelude;

pub mod cache;
pub mod constants;
pub mod handler;
pub mod identity;
pub mod issuer;
pub mod object;
pub mod queue;
pub mod scheme;

pub use cache::{Cache, CacheError, InMemoryCache};
pub use handler::{Event, EventHandler, HandlerError, LinkedResourceHandler};
pub use object::{DynamicObject, GroupVersionKind, ObjectKey, TypeMeta};
pub use queue::{Queue, RateLimitingQueue, ReconcileRequest};
pub use scheme::Scheme;

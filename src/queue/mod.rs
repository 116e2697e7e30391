//! Reconcile requests and the sinks they are delivered to.
//!
//! [`Queue`] is the minimal sink the linked resource handler writes into.
//! [`RateLimitingQueue`] is a work queue with coalescing and per-item backoff.
//! An unbounded Tokio channel sender is also a `Queue`, which lets an enqueue
//! hook forward requests to a channel instead.

mod rate_limiting;

pub use rate_limiting::{RateLimiterConfig, RateLimitingQueue};

use crate::object::ObjectKey;
use crate::prelude::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Identifies one object that must be reconciled.
///
/// Equality is structural: two requests for the same namespace and name are
/// the same request.
#[derive(Debug, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ReconcileRequest {
    /// Namespace of the object to reconcile.
    pub namespace: String,
    /// Name of the object to reconcile.
    pub name: String,
}

impl ReconcileRequest {
    /// Creates a request.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns the key of the object to reconcile.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }
}

impl From<ObjectKey> for ReconcileRequest {
    fn from(key: ObjectKey) -> Self {
        Self {
            namespace: key.namespace,
            name: key.name,
        }
    }
}

impl fmt::Display for ReconcileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Destination of reconcile requests.
///
/// `add` may be called concurrently from many threads. Implementations are
/// expected to coalesce duplicates, but callers do not rely on it.
pub trait Queue: Send + Sync {
    /// Adds a request.
    fn add(&self, request: ReconcileRequest);
}

impl<Q: Queue + ?Sized> Queue for Arc<Q> {
    fn add(&self, request: ReconcileRequest) {
        (**self).add(request);
    }
}

impl Queue for UnboundedSender<ReconcileRequest> {
    fn add(&self, request: ReconcileRequest) {
        if let Err(e) = self.send(request) {
            debug!("Dropping reconcile request, receiver closed: request={}", e.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_display_and_key() {
        let req = ReconcileRequest::new("ns1", "a1");
        assert_eq!(req.to_string(), "ns1/a1");
        assert_eq!(req.key(), ObjectKey::new("ns1", "a1"));
        assert_eq!(ReconcileRequest::from(ObjectKey::new("ns1", "a1")), req);
    }

    #[tokio::test]
    async fn channel_sender_is_a_queue() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let queue: &dyn Queue = &tx;

        queue.add(ReconcileRequest::new("ns1", "a1"));
        assert_eq!(rx.recv().await, Some(ReconcileRequest::new("ns1", "a1")));

        drop(rx);
        // Closed receiver is tolerated.
        queue.add(ReconcileRequest::new("ns1", "a2"));
    }
}

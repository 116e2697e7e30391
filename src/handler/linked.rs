use super::builder::LinkedResourceHandlerBuilder;
use super::errors::{HandlerError, MalformedObject, MetricsErrorKind};
use super::event::EventHandler;
use super::metrics::MetricsRecorder;
use crate::cache::{Cache, FieldSelector, IndexName};
use crate::object::{DynamicObject, GroupVersionKind, ObjectKey, TypeMeta};
use crate::prelude::{debug, error, warn};
use crate::queue::{Queue, ReconcileRequest};
use crate::scheme::Scheme;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Custom enqueue step: receives the queue passed to the event method and the
/// request to deliver.
pub type EnqueueHook = Arc<dyn Fn(&dyn Queue, ReconcileRequest) + Send + Sync + 'static>;

/// Fans events on target objects out to every linked object that references
/// them.
///
/// Built with [`LinkedResourceHandler::builder`]. Holds no mutable state:
/// every event call owns its own dedup set, so a handler can be shared freely
/// between threads. Cloning is cheap.
#[derive(Clone)]
pub struct LinkedResourceHandler {
    name: String,
    cache: Arc<dyn Cache>,
    linked: GroupVersionKind,
    index: IndexName,
    enqueue_hook: Option<EnqueueHook>,
    metrics: Option<Arc<dyn MetricsRecorder>>,
}

impl Debug for LinkedResourceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedResourceHandler")
            .field("name", &self.name)
            .field("linked", &self.linked)
            .field("index", &self.index)
            .field(
                "enqueue_hook",
                &self.enqueue_hook.as_ref().map(|_| "<EnqueueHook>"),
            )
            .field(
                "metrics",
                &self.metrics.as_ref().map(|_| "<MetricsRecorder>"),
            )
            .finish_non_exhaustive()
    }
}

impl LinkedResourceHandler {
    /// Returns a builder for a handler over the `linked_type` kind.
    ///
    /// See [`LinkedResourceHandlerBuilder::new`] for the extractor contract.
    pub fn builder<F>(
        scheme: Arc<Scheme>,
        cache: Arc<dyn Cache>,
        linked_type: TypeMeta,
        extractor: F,
    ) -> LinkedResourceHandlerBuilder
    where
        F: Fn(&DynamicObject) -> Vec<String> + Send + Sync + 'static,
    {
        LinkedResourceHandlerBuilder::new(scheme, cache, linked_type, extractor)
    }

    /// Creates a handler with default naming, metrics and randomness.
    ///
    /// # Errors
    ///
    /// See [`LinkedResourceHandlerBuilder::build`].
    pub fn new<F>(
        cancel: &CancellationToken,
        scheme: Arc<Scheme>,
        cache: Arc<dyn Cache>,
        linked_type: TypeMeta,
        extractor: F,
        enqueue_hook: Option<EnqueueHook>,
    ) -> Result<Self, HandlerError>
    where
        F: Fn(&DynamicObject) -> Vec<String> + Send + Sync + 'static,
    {
        let mut builder = Self::builder(scheme, cache, linked_type, extractor);
        if let Some(hook) = enqueue_hook {
            builder = builder.shared_enqueue_hook(hook);
        }
        builder.build(cancel)
    }

    pub(super) fn from_parts(
        name: String,
        cache: Arc<dyn Cache>,
        linked: GroupVersionKind,
        index: IndexName,
        enqueue_hook: Option<EnqueueHook>,
        metrics: Option<Arc<dyn MetricsRecorder>>,
    ) -> Self {
        debug!(
            "Registered linked resource index: handler={}, linked_kind={}, index={}",
            name, linked, index
        );
        Self {
            name,
            cache,
            linked,
            index,
            enqueue_hook,
            metrics,
        }
    }

    /// Name used in log records.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the reverse index registered on the cache.
    pub fn index_name(&self) -> &IndexName {
        &self.index
    }

    /// Resolved kind of the linked objects.
    pub fn linked_kind(&self) -> &GroupVersionKind {
        &self.linked
    }

    /// Returns a request for every linked object referencing `object`.
    ///
    /// Fail-open: if the cache cannot be listed, the error is logged once and
    /// no requests are returned. Listed items that are not valid linked objects
    /// are logged and skipped.
    pub fn find_linked(&self, object: &DynamicObject) -> Vec<ReconcileRequest> {
        let target = ObjectKey::from_object(object);
        let selector = FieldSelector::one_term_equal(self.index.as_str(), target.to_string());

        let items = match self.cache.list(&self.linked, &selector) {
            Ok(items) => items,
            Err(e) => {
                error!(
                    "Failed to list linked resources; event dropped until next resync: handler={}, object={}, object_kind={}, linked_kind={}, error={}",
                    self.name,
                    target,
                    object.kind(),
                    self.linked,
                    e
                );
                self.record_error(MetricsErrorKind::ListFailed);
                return Vec::new();
            }
        };

        let mut requests = Vec::with_capacity(items.len());
        for item in &items {
            match self.to_request(item) {
                Ok(request) => requests.push(request),
                Err(e) => {
                    warn!(
                        "Skipping listed object: handler={}, object={}, item={}, error={}",
                        self.name,
                        target,
                        item.key(),
                        e
                    );
                    self.record_error(MetricsErrorKind::MalformedItem);
                }
            }
        }
        requests
    }

    fn to_request(&self, item: &DynamicObject) -> Result<ReconcileRequest, MalformedObject> {
        if item.name().is_empty() {
            return Err(MalformedObject::MissingName);
        }
        if let Some(types) = &item.types {
            if !self.linked.matches(types) {
                return Err(MalformedObject::kind_mismatch(&self.linked, types));
            }
        }
        Ok(ReconcileRequest::new(item.namespace(), item.name()))
    }

    fn map_and_enqueue(
        &self,
        object: &DynamicObject,
        queue: &dyn Queue,
        seen: &mut HashSet<ReconcileRequest>,
    ) {
        for request in self.find_linked(object) {
            if !seen.insert(request.clone()) {
                continue;
            }

            match &self.enqueue_hook {
                Some(hook) => hook(queue, request),
                None => queue.add(request),
            }
            if let Some(m) = &self.metrics {
                m.record_enqueued();
            }
        }
    }

    fn record_error(&self, kind: MetricsErrorKind) {
        if let Some(m) = &self.metrics {
            m.record_error(kind);
        }
    }
}

impl EventHandler for LinkedResourceHandler {
    fn create(&self, object: &DynamicObject, queue: &dyn Queue) {
        let mut seen = HashSet::new();
        self.map_and_enqueue(object, queue, &mut seen);
    }

    // Both states are mapped: linked objects may still point at the old
    // identity.
    fn update(&self, old: &DynamicObject, new: &DynamicObject, queue: &dyn Queue) {
        let mut seen = HashSet::new();
        self.map_and_enqueue(old, queue, &mut seen);
        self.map_and_enqueue(new, queue, &mut seen);
    }

    fn delete(&self, object: &DynamicObject, queue: &dyn Queue) {
        let mut seen = HashSet::new();
        self.map_and_enqueue(object, queue, &mut seen);
    }

    fn generic(&self, object: &DynamicObject, queue: &dyn Queue) {
        let mut seen = HashSet::new();
        self.map_and_enqueue(object, queue, &mut seen);
    }
}

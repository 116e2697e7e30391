use super::errors::HandlerError;
use super::metrics::MetricsRecorder;
use super::linked::{EnqueueHook, LinkedResourceHandler};
use crate::cache::{Cache, IndexFn, IndexName, DEFAULT_INDEX_SUFFIX_LEN, MIN_INDEX_SUFFIX_LEN};
use crate::object::{DynamicObject, TypeMeta};
use crate::queue::{Queue, ReconcileRequest};
use crate::scheme::Scheme;
use std::fmt::Debug;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builder for [`LinkedResourceHandler`].
///
/// The four required collaborators are taken up front; everything else has a
/// default.
///
/// # Example
///
/// ```
/// use linked_resources::cache::InMemoryCache;
/// use linked_resources::handler::LinkedResourceHandler;
/// use linked_resources::object::{DynamicObject, GroupVersionKind, TypeMeta};
/// use linked_resources::scheme::Scheme;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut scheme = Scheme::new();
/// scheme.register(GroupVersionKind::gvk("cert-manager.io", "v1", "CertificateRequest"));
///
/// let handler = LinkedResourceHandler::builder(
///     Arc::new(scheme),
///     Arc::new(InMemoryCache::new()),
///     TypeMeta::kind("CertificateRequest"),
///     |request: &DynamicObject| {
///         request.data["issuerRef"]["name"]
///             .as_str()
///             .map(|issuer| vec![format!("{}/{}", request.namespace(), issuer)])
///             .unwrap_or_default()
///     },
/// )
/// .name("issuer-to-requests")
/// .rng(fastrand::Rng::with_seed(1))
/// .build(&CancellationToken::new())?;
///
/// assert!(handler.index_name().as_str().starts_with(".x-index."));
/// # Ok(())
/// # }
/// ```
pub struct LinkedResourceHandlerBuilder {
    scheme: Arc<Scheme>,
    cache: Arc<dyn Cache>,
    linked_type: TypeMeta,
    extractor: IndexFn,
    enqueue_hook: Option<EnqueueHook>,
    name: Option<String>,
    metrics: Option<Arc<dyn MetricsRecorder>>,
    rng: Option<fastrand::Rng>,
    index_suffix_len: usize,
}

impl Debug for LinkedResourceHandlerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedResourceHandlerBuilder")
            .field("linked_type", &self.linked_type)
            .field("name", &self.name)
            .field(
                "enqueue_hook",
                &self.enqueue_hook.as_ref().map(|_| "<EnqueueHook>"),
            )
            .field(
                "metrics",
                &self.metrics.as_ref().map(|_| "<MetricsRecorder>"),
            )
            .field("index_suffix_len", &self.index_suffix_len)
            .finish_non_exhaustive()
    }
}

impl LinkedResourceHandlerBuilder {
    /// Creates a builder.
    ///
    /// `extractor` maps a linked object to the `<namespace>/<name>` keys of
    /// every target object it references. It must be pure; it runs inside the
    /// cache's index maintenance, and a panic in it is not caught.
    pub fn new<F>(scheme: Arc<Scheme>, cache: Arc<dyn Cache>, linked_type: TypeMeta, extractor: F) -> Self
    where
        F: Fn(&DynamicObject) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            scheme,
            cache,
            linked_type,
            extractor: Arc::new(extractor),
            enqueue_hook: None,
            name: None,
            metrics: None,
            rng: None,
            index_suffix_len: DEFAULT_INDEX_SUFFIX_LEN,
        }
    }

    /// Replaces the default `queue.add(request)` with a custom enqueue step.
    ///
    /// The hook may run concurrently from independent events.
    #[must_use]
    pub fn enqueue_hook<H>(mut self, hook: H) -> Self
    where
        H: Fn(&dyn Queue, ReconcileRequest) + Send + Sync + 'static,
    {
        self.enqueue_hook = Some(Arc::new(hook));
        self
    }

    /// Stores an already shared hook as is.
    #[must_use]
    pub(super) fn shared_enqueue_hook(mut self, hook: EnqueueHook) -> Self {
        self.enqueue_hook = Some(hook);
        self
    }

    /// Sets the name used in log records. Defaults to the linked kind.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets a metrics recorder.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the random source for the index name. Defaults to a fresh,
    /// entropy-seeded generator per build.
    #[must_use]
    pub fn rng(mut self, rng: fastrand::Rng) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Sets the length of the random index name suffix (default 10).
    ///
    /// Lengths below [`MIN_INDEX_SUFFIX_LEN`] are raised to it when the name is
    /// generated, so a short suffix never makes names on a shared cache likely
    /// to collide.
    #[must_use]
    pub const fn index_suffix_len(mut self, len: usize) -> Self {
        self.index_suffix_len = len;
        self
    }

    /// Resolves the linked kind, registers the reverse index and returns the
    /// handler.
    ///
    /// `cancel` scopes the index registration.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::SchemaResolution`] if the linked kind is not
    /// known to the scheme, and [`HandlerError::IndexRegistration`] if the cache
    /// rejects the index.
    pub fn build(self, cancel: &CancellationToken) -> Result<LinkedResourceHandler, HandlerError> {
        let mut rng = self.rng.unwrap_or_else(fastrand::Rng::new);
        let index = IndexName::generate(&mut rng, self.index_suffix_len);

        let linked = self.scheme.resolve(&self.linked_type)?;

        self.cache
            .index_field(cancel, &linked, &index, Arc::clone(&self.extractor))?;

        let name = self.name.unwrap_or_else(|| linked.kind.clone());

        Ok(LinkedResourceHandler::from_parts(
            name,
            self.cache,
            linked,
            index,
            self.enqueue_hook,
            self.metrics,
        ))
    }
}

//! Indexed object cache consumed by the linked resource handler.
//!
//! The [`Cache`] trait is the seam between the handler and whatever keeps a
//! read replica of cluster state. It needs only two operations: installing a
//! named secondary index over one kind, and listing the objects of that kind
//! whose index keys contain an exact value.
//!
//! [`InMemoryCache`] is a complete implementation backed by an `RwLock`,
//! suitable for tests and for embedding in a process that feeds it from its
//! own watch loop.

mod index_name;
mod store;

pub use index_name::{IndexName, DEFAULT_INDEX_SUFFIX_LEN, INDEX_NAME_PREFIX, MIN_INDEX_SUFFIX_LEN};
pub use store::InMemoryCache;

use crate::object::{DynamicObject, GroupVersionKind};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Index function: returns every index key for an object.
///
/// Must be pure and deterministic for a given object state. A panic inside it
/// is a programming error and is never caught by the cache.
pub type IndexFn = Arc<dyn Fn(&DynamicObject) -> Vec<String> + Send + Sync + 'static>;

/// Exact-match selector over a single field or index.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct FieldSelector {
    /// Index (or field) name.
    pub field: String,
    /// Value the index key must equal.
    pub value: String,
}

impl FieldSelector {
    /// Selects objects whose `field` equals `value`.
    pub fn one_term_equal(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}

/// Errors returned by a [`Cache`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum CacheError {
    /// Indexes can only be added before the cache is started.
    #[error("cache already started; indexes must be registered before start")]
    AlreadyStarted,

    /// An index with the same name already exists for the kind.
    #[error("index {index:?} already exists for {kind}")]
    IndexConflict {
        /// The kind the index was registered for.
        kind: GroupVersionKind,
        /// The conflicting index name.
        index: String,
    },

    /// The registration context was cancelled.
    #[error("index registration cancelled")]
    Cancelled,

    /// A selector referenced an index that was never registered.
    #[error("no index {index:?} is registered for {kind}")]
    IndexNotFound {
        /// The listed kind.
        kind: GroupVersionKind,
        /// The missing index name.
        index: String,
    },

    /// The backing store could not serve the request.
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// A read replica of cluster state that supports secondary indexes.
///
/// Implementations must provide read isolation: `list` may run concurrently
/// with index maintenance and must never observe a half-applied update.
pub trait Cache: Send + Sync {
    /// Installs a named index over objects of `gvk`.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the cache rejects the registration, e.g.
    /// because it has already started, the name is taken, or `cancel` has
    /// already fired.
    fn index_field(
        &self,
        cancel: &CancellationToken,
        gvk: &GroupVersionKind,
        index: &IndexName,
        extractor: IndexFn,
    ) -> Result<(), CacheError>;

    /// Lists objects of `gvk` matching `selector` exactly.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the index is unknown or the store is
    /// unavailable.
    fn list(
        &self,
        gvk: &GroupVersionKind,
        selector: &FieldSelector,
    ) -> Result<Vec<Arc<DynamicObject>>, CacheError>;
}

impl<C: Cache + ?Sized> Cache for Arc<C> {
    fn index_field(
        &self,
        cancel: &CancellationToken,
        gvk: &GroupVersionKind,
        index: &IndexName,
        extractor: IndexFn,
    ) -> Result<(), CacheError> {
        (**self).index_field(cancel, gvk, index, extractor)
    }

    fn list(
        &self,
        gvk: &GroupVersionKind,
        selector: &FieldSelector,
    ) -> Result<Vec<Arc<DynamicObject>>, CacheError> {
        (**self).list(gvk, selector)
    }
}

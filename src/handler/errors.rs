use crate::cache::CacheError;
use crate::object::{GroupVersionKind, TypeMeta};
use crate::scheme::SchemeError;
use std::fmt;
use thiserror::Error;

/// Errors returned while setting up a [`LinkedResourceHandler`](super::LinkedResourceHandler).
///
/// Event handling itself never fails outwardly; see the module docs.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum HandlerError {
    /// The linked kind could not be resolved against the scheme.
    #[error("failed to resolve linked kind: {0}")]
    SchemaResolution(#[from] SchemeError),

    /// The cache refused the reverse index.
    #[error("failed to register linked resource index: {0}")]
    IndexRegistration(#[from] CacheError),
}

/// Why a listed object could not be turned into a reconcile request.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum MalformedObject {
    /// The object has no name.
    #[error("object has no name")]
    MissingName,

    /// The object is not of the linked kind.
    #[error("expected {expected}, found {found_api_version}, Kind={found_kind}")]
    KindMismatch {
        /// The linked kind the handler lists.
        expected: GroupVersionKind,
        /// API version carried by the object.
        found_api_version: String,
        /// Kind carried by the object.
        found_kind: String,
    },
}

impl MalformedObject {
    pub(super) fn kind_mismatch(expected: &GroupVersionKind, found: &TypeMeta) -> Self {
        Self::KindMismatch {
            expected: expected.clone(),
            found_api_version: found.api_version.clone(),
            found_kind: found.kind.clone(),
        }
    }
}

/// Error kinds for structured metrics reporting.
///
/// Use these stable, low-cardinality labels when recording metrics.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum MetricsErrorKind {
    /// Listing linked objects failed; the event produced no requests.
    ListFailed,
    /// A listed object was skipped because it could not be converted.
    MalformedItem,
}

impl MetricsErrorKind {
    /// Returns a stable string representation of the error kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListFailed => "list_failed",
            Self::MalformedItem => "malformed_item",
        }
    }
}

impl fmt::Display for MetricsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Type registry resolving kind names to canonical [`GroupVersionKind`]s.

use crate::object::{GroupVersionKind, TypeMeta};
use std::collections::HashMap;
use thiserror::Error;

/// An error resolving a kind against a [`Scheme`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum SchemeError {
    /// The type information does not name a kind.
    #[error("kind is missing")]
    MissingKind,

    /// No registered type matches.
    #[error("no kind {kind:?} is registered for version {api_version:?}")]
    NotRegistered {
        /// The requested kind.
        kind: String,
        /// The requested API version, possibly empty.
        api_version: String,
    },

    /// The kind is registered under several group/versions and no API version
    /// was given to choose between them.
    #[error("kind {kind:?} is ambiguous: registered under {candidates} group/versions")]
    Ambiguous {
        /// The requested kind.
        kind: String,
        /// Number of registered candidates.
        candidates: usize,
    },
}

/// Registry of known object types.
///
/// A `Scheme` is built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Scheme {
    kinds: HashMap<String, Vec<GroupVersionKind>>,
}

impl Scheme {
    /// Creates an empty scheme.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type. Registering the same type twice is a no-op.
    pub fn register(&mut self, gvk: GroupVersionKind) -> &mut Self {
        let entries = self.kinds.entry(gvk.kind.clone()).or_default();
        if !entries.contains(&gvk) {
            entries.push(gvk);
        }
        self
    }

    /// Returns `true` if the exact type is registered.
    pub fn recognizes(&self, gvk: &GroupVersionKind) -> bool {
        self.kinds
            .get(&gvk.kind)
            .is_some_and(|entries| entries.contains(gvk))
    }

    /// Resolves type information to its canonical identity.
    ///
    /// When `type_meta.api_version` is empty the kind must be registered under
    /// exactly one group/version.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemeError`] if the kind is missing, unknown, or ambiguous.
    pub fn resolve(&self, type_meta: &TypeMeta) -> Result<GroupVersionKind, SchemeError> {
        if type_meta.kind.is_empty() {
            return Err(SchemeError::MissingKind);
        }

        let not_registered = || SchemeError::NotRegistered {
            kind: type_meta.kind.clone(),
            api_version: type_meta.api_version.clone(),
        };

        let candidates = self.kinds.get(&type_meta.kind).ok_or_else(not_registered)?;

        if !type_meta.api_version.is_empty() {
            return candidates
                .iter()
                .find(|gvk| gvk.api_version() == type_meta.api_version)
                .cloned()
                .ok_or_else(not_registered);
        }

        match candidates.as_slice() {
            [] => Err(not_registered()),
            [only] => Ok(only.clone()),
            many => Err(SchemeError::Ambiguous {
                kind: type_meta.kind.clone(),
                candidates: many.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> Scheme {
        let mut scheme = Scheme::new();
        scheme
            .register(GroupVersionKind::gvk("cert-manager.io", "v1", "CertificateRequest"))
            .register(GroupVersionKind::gvk("cert-manager.athenz.io", "v1", "AthenzIssuer"))
            .register(GroupVersionKind::gvk("cert-manager.athenz.io", "v1alpha1", "AthenzIssuer"))
            .register(GroupVersionKind::gvk("", "v1", "Secret"));
        scheme
    }

    macro_rules! resolve_success_tests {
        ($($name:ident: $value:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let (input, expected) = $value;
                assert_eq!(scheme().resolve(&input).unwrap(), expected);
            }
        )*
        }
    }

    resolve_success_tests! {
        resolve_unique_kind_without_version: (
            TypeMeta::kind("CertificateRequest"),
            GroupVersionKind::gvk("cert-manager.io", "v1", "CertificateRequest"),
        ),
        resolve_with_explicit_version: (
            TypeMeta::new("cert-manager.athenz.io/v1alpha1", "AthenzIssuer"),
            GroupVersionKind::gvk("cert-manager.athenz.io", "v1alpha1", "AthenzIssuer"),
        ),
        resolve_core_group: (
            TypeMeta::new("v1", "Secret"),
            GroupVersionKind::gvk("", "v1", "Secret"),
        ),
    }

    macro_rules! resolve_error_tests {
        ($($name:ident: $value:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let (input, expected_error) = $value;
                assert_eq!(scheme().resolve(&input).unwrap_err(), expected_error);
            }
        )*
        }
    }

    resolve_error_tests! {
        resolve_missing_kind: (TypeMeta::default(), SchemeError::MissingKind),
        resolve_unknown_kind: (
            TypeMeta::kind("ConfigMap"),
            SchemeError::NotRegistered { kind: "ConfigMap".into(), api_version: "".into() },
        ),
        resolve_unknown_version: (
            TypeMeta::new("cert-manager.io/v2", "CertificateRequest"),
            SchemeError::NotRegistered {
                kind: "CertificateRequest".into(),
                api_version: "cert-manager.io/v2".into(),
            },
        ),
        resolve_ambiguous_kind: (
            TypeMeta::kind("AthenzIssuer"),
            SchemeError::Ambiguous { kind: "AthenzIssuer".into(), candidates: 2 },
        ),
    }

    #[test]
    fn register_is_idempotent() {
        let mut scheme = Scheme::new();
        let gvk = GroupVersionKind::gvk("", "v1", "Secret");
        scheme.register(gvk.clone()).register(gvk.clone());

        assert!(scheme.recognizes(&gvk));
        assert_eq!(scheme.resolve(&TypeMeta::kind("Secret")).unwrap(), gvk);
    }
}

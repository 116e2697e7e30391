//! Object model shared by the cache, the handler and the work queue.
//!
//! Objects are kept untyped: a [`DynamicObject`] carries its type information,
//! its metadata and an arbitrary JSON payload. Identity is always the
//! `(namespace, name)` pair captured by [`ObjectKey`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Display, Formatter};

/// The `(namespace, name)` pair identifying an object of a given kind.
///
/// Cluster-scoped objects have an empty namespace.
#[derive(Debug, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Namespace of the object, empty for cluster-scoped kinds.
    pub namespace: String,
    /// Name of the object.
    pub name: String,
}

impl ObjectKey {
    /// Creates a key from a namespace and a name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns the key of the given object.
    pub fn from_object(object: &DynamicObject) -> Self {
        Self {
            namespace: object.metadata.namespace.clone(),
            name: object.metadata.name.clone(),
        }
    }
}

/// Formats as `<namespace>/<name>`.
///
/// This is the exact form used as the lookup value of linked resource indexes,
/// so identifier extractors must produce keys in this shape.
impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// API version and kind of an object, as carried on the wire.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    /// `<group>/<version>`, or just `<version>` for the core group. May be
    /// empty when the version is not known to the caller.
    #[serde(default)]
    pub api_version: String,
    /// Kind name, e.g. `CertificateRequest`.
    pub kind: String,
}

impl TypeMeta {
    /// Creates a `TypeMeta` from an API version and a kind.
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }

    /// Creates a `TypeMeta` naming only a kind, leaving the version to be
    /// resolved by a [`Scheme`](crate::scheme::Scheme).
    pub fn kind(kind: impl Into<String>) -> Self {
        Self::new("", kind)
    }
}

/// Canonical, fully resolved type identity.
#[derive(Debug, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct GroupVersionKind {
    /// API group, empty for the core group.
    pub group: String,
    /// API version.
    pub version: String,
    /// Kind name.
    pub kind: String,
}

impl GroupVersionKind {
    /// Creates a `GroupVersionKind`.
    pub fn gvk(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Returns `<group>/<version>`, or `<version>` for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Returns `true` if `type_meta` names this kind.
    ///
    /// An empty API version on `type_meta` matches any version.
    pub fn matches(&self, type_meta: &TypeMeta) -> bool {
        type_meta.kind == self.kind
            && (type_meta.api_version.is_empty() || type_meta.api_version == self.api_version())
    }
}

impl Display for GroupVersionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

impl From<&GroupVersionKind> for TypeMeta {
    fn from(gvk: &GroupVersionKind) -> Self {
        TypeMeta::new(gvk.api_version(), gvk.kind.clone())
    }
}

/// Metadata common to every object.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Namespace, empty for cluster-scoped kinds.
    #[serde(default)]
    pub namespace: String,
    /// Name.
    #[serde(default)]
    pub name: String,
    /// Labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// An object of any kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicObject {
    /// Type information, when the object carries it.
    #[serde(flatten)]
    pub types: Option<TypeMeta>,
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Everything else.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl DynamicObject {
    /// Creates an object of the given kind with the given namespace and name.
    pub fn new(types: TypeMeta, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            types: Some(types),
            metadata: ObjectMeta {
                namespace: namespace.into(),
                name: name.into(),
                ..ObjectMeta::default()
            },
            data: serde_json::Value::Null,
        }
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Adds an annotation.
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.annotations.insert(key.into(), value.into());
        self
    }

    /// Returns the namespace.
    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Returns the name.
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Returns the object's key.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::from_object(self)
    }

    /// Returns the kind, or `"<unknown>"` when the object carries no type
    /// information.
    pub fn kind(&self) -> &str {
        self.types.as_ref().map_or("<unknown>", |t| t.kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_key_display_is_index_form() {
        assert_eq!(ObjectKey::new("ns1", "b1").to_string(), "ns1/b1");
        assert_eq!(ObjectKey::new("", "cluster-wide").to_string(), "/cluster-wide");
    }

    #[test]
    fn gvk_api_version_for_core_and_named_groups() {
        let core = GroupVersionKind::gvk("", "v1", "Secret");
        assert_eq!(core.api_version(), "v1");

        let named = GroupVersionKind::gvk("cert-manager.io", "v1", "CertificateRequest");
        assert_eq!(named.api_version(), "cert-manager.io/v1");
        assert_eq!(named.to_string(), "cert-manager.io/v1, Kind=CertificateRequest");
    }

    #[test]
    fn gvk_matches_type_meta() {
        let gvk = GroupVersionKind::gvk("cert-manager.io", "v1", "CertificateRequest");

        assert!(gvk.matches(&TypeMeta::new("cert-manager.io/v1", "CertificateRequest")));
        assert!(gvk.matches(&TypeMeta::kind("CertificateRequest")));
        assert!(!gvk.matches(&TypeMeta::new("cert-manager.io/v2", "CertificateRequest")));
        assert!(!gvk.matches(&TypeMeta::kind("Certificate")));
    }

    #[test]
    fn dynamic_object_deserializes_with_flattened_types() {
        let object: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "cert-manager.athenz.io/v1",
            "kind": "AthenzIssuer",
            "metadata": { "namespace": "ns1", "name": "issuer" },
            "data": { "spec": { "cloud": "local" } }
        }))
        .unwrap();

        assert_eq!(object.kind(), "AthenzIssuer");
        assert_eq!(object.key(), ObjectKey::new("ns1", "issuer"));
        assert_eq!(object.data["spec"]["cloud"], "local");
    }

    #[test]
    fn dynamic_object_without_types_reports_unknown_kind() {
        let object = DynamicObject::default();
        assert_eq!(object.kind(), "<unknown>");
    }
}

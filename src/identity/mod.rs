//! Workload identity helpers.
//!
//! Certificate requests name the workload they are for either through the
//! [`IDENTITY_ANNOTATION`] or through a SPIFFE URI SAN in the CSR itself. The
//! SPIFFE ID has the Kubernetes shape
//! `spiffe://<trust-domain>/ns/<namespace>/sa/<service-account>`, and the
//! service account name in turn encodes an Athenz domain and service.

mod csr;

pub use csr::spiffe_uri_from_csr;

use crate::constants::{IDENTITY_ANNOTATION, SPIFFE_SCHEME_PREFIX};
use crate::prelude::debug;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// An error that can arise extracting a workload identity.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum IdentityError {
    /// The URI is not `spiffe://<td>/ns/<ns>/sa/<sa>`.
    #[error("invalid SPIFFE URI format")]
    InvalidFormat,

    /// The identity annotation is absent.
    #[error("spiffe uri not found in annotations")]
    MissingAnnotation,

    /// The input holds no PEM block.
    #[error("no PEM block found in input")]
    NoPemBlock,

    /// The PEM block is not a certificate request.
    #[error("not a certificate request PEM block: {0}")]
    NotCertificateRequest(String),

    /// Bytes follow the PEM block.
    #[error("unexpected data found after PEM block")]
    TrailingData,

    /// The CSR DER could not be parsed.
    #[error("failed to parse CSR: {0}")]
    ParseCsr(String),

    /// The CSR carries no `spiffe://` URI SAN.
    #[error("unable to extract SPIFFE URI from CSR")]
    MissingSpiffeUri,
}

/// A Kubernetes workload identity: `spiffe://<td>/ns/<ns>/sa/<sa>`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct WorkloadIdentity {
    trust_domain: String,
    namespace: String,
    service_account: String,
}

impl WorkloadIdentity {
    /// Parses a Kubernetes-shaped SPIFFE URI.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidFormat`] unless the input is exactly
    /// `spiffe://<td>/ns/<ns>/sa/<sa>` with non-empty components.
    ///
    /// # Examples
    ///
    /// ```
    /// use linked_resources::identity::WorkloadIdentity;
    ///
    /// let id = WorkloadIdentity::parse("spiffe://cluster.local/ns/default/sa/athenz.example").unwrap();
    /// assert_eq!(id.namespace(), "default");
    /// assert_eq!(id.service_account(), "athenz.example");
    /// ```
    pub fn parse(uri: &str) -> Result<Self, IdentityError> {
        let rest = uri
            .strip_prefix(SPIFFE_SCHEME_PREFIX)
            .ok_or(IdentityError::InvalidFormat)?;

        let mut segments = rest.split('/');
        match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(td), Some("ns"), Some(ns), Some("sa"), Some(sa), None)
                if !td.is_empty() && !ns.is_empty() && !sa.is_empty() =>
            {
                Ok(Self {
                    trust_domain: td.to_string(),
                    namespace: ns.to_string(),
                    service_account: sa.to_string(),
                })
            }
            _ => Err(IdentityError::InvalidFormat),
        }
    }

    /// Resolves the identity of a certificate request.
    ///
    /// The identity annotation wins; without it the SPIFFE URI SAN of the PEM
    /// encoded CSR is used.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if neither source yields a valid identity.
    pub fn for_request(
        annotations: &BTreeMap<String, String>,
        csr_pem: &[u8],
    ) -> Result<Self, IdentityError> {
        match identity_from_annotations(annotations) {
            Ok(uri) => Self::parse(uri),
            Err(e) => {
                debug!("Falling back to CSR for workload identity: reason={}", e);
                Self::parse(&spiffe_uri_from_csr(csr_pem)?)
            }
        }
    }

    /// Returns the trust domain.
    pub fn trust_domain(&self) -> &str {
        &self.trust_domain
    }

    /// Returns the namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the service account name.
    pub fn service_account(&self) -> &str {
        &self.service_account
    }

    /// Returns the Athenz service the service account maps to.
    pub fn service_name(&self) -> ServiceName {
        ServiceName::from_service_account(&self.service_account)
    }
}

impl Display for WorkloadIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/ns/{}/sa/{}",
            SPIFFE_SCHEME_PREFIX, self.trust_domain, self.namespace, self.service_account
        )
    }
}

impl FromStr for WorkloadIdentity {
    type Err = IdentityError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        Self::parse(uri)
    }
}

impl TryFrom<&str> for WorkloadIdentity {
    type Error = IdentityError;

    fn try_from(uri: &str) -> Result<Self, Self::Error> {
        Self::parse(uri)
    }
}

/// Athenz `<domain>.<service>` pair encoded in a service account name.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ServiceName {
    /// Everything before the last dot; empty when there is no dot.
    pub domain: String,
    /// Everything after the last dot.
    pub service: String,
}

impl ServiceName {
    /// Splits at the last dot: `athenz.prod.api` is domain `athenz.prod`,
    /// service `api`.
    pub fn from_service_account(name: &str) -> Self {
        match name.rsplit_once('.') {
            Some((domain, service)) => Self {
                domain: domain.to_string(),
                service: service.to_string(),
            },
            None => Self {
                domain: String::new(),
                service: name.to_string(),
            },
        }
    }
}

/// Returns the SPIFFE URI carried by the [`IDENTITY_ANNOTATION`].
///
/// The value is returned as is; it is not validated.
///
/// # Errors
///
/// Returns [`IdentityError::MissingAnnotation`] if the annotation is absent.
pub fn identity_from_annotations(
    annotations: &BTreeMap<String, String>,
) -> Result<&str, IdentityError> {
    annotations
        .get(IDENTITY_ANNOTATION)
        .map(String::as_str)
        .ok_or(IdentityError::MissingAnnotation)
}

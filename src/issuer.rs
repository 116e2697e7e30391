//! Credential issuance request model.
//!
//! Reconciling a certificate request ends in a call to a credential issuer
//! (Athenz ZTS in production). This module resolves everything that call needs
//! from the request itself: the workload identity, the Athenz service, the
//! provider name and the attestation payload. The transport is behind
//! [`CredentialIssuer`].

use crate::constants::LOCAL_CLOUD;
use crate::identity::{IdentityError, ServiceName, WorkloadIdentity};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use zeroize::Zeroizing;

/// Issuer settings taken from the issuer resource spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerConfig {
    /// ZTS base URL.
    #[serde(default)]
    pub zts_endpoint: String,
    /// Cloud name, e.g. `aws`, or `local` for self-signed issuance.
    #[serde(default)]
    pub cloud: String,
    /// Cloud region, e.g. `us-east-1`.
    #[serde(default)]
    pub region: String,
    /// Athenz provider service prefix.
    #[serde(default)]
    pub provider_prefix: String,
}

impl IssuerConfig {
    /// Returns `<provider_prefix>.<cloud>-<region>`.
    pub fn provider(&self) -> String {
        format!("{}.{}-{}", self.provider_prefix, self.cloud, self.region)
    }

    /// Returns true if issuance is local and no ZTS call is made.
    pub fn is_local(&self) -> bool {
        self.cloud == LOCAL_CLOUD
    }
}

/// Attestation payload sent with an identity registration.
///
/// Serializes as `{"identityToken": "..."}`. The token is wiped on drop and
/// never printed by `Debug`.
#[derive(Clone, Default, Serialize)]
pub struct AttestationData {
    #[serde(
        rename = "identityToken",
        serialize_with = "serialize_secret",
        skip_serializing_if = "is_blank"
    )]
    identity_token: Zeroizing<String>,
}

impl AttestationData {
    /// Wraps a service account token.
    pub fn new(identity_token: Zeroizing<String>) -> Self {
        Self { identity_token }
    }

    /// Returns the token.
    pub fn identity_token(&self) -> &str {
        &self.identity_token
    }

    /// Serializes the payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails.
    pub fn to_json(&self) -> Result<Zeroizing<String>, serde_json::Error> {
        serde_json::to_string(self).map(Zeroizing::new)
    }
}

impl fmt::Debug for AttestationData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttestationData")
            .field("identity_token", &"<redacted>")
            .finish()
    }
}

fn serialize_secret<S: Serializer>(value: &Zeroizing<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(value)
}

fn is_blank(value: &Zeroizing<String>) -> bool {
    value.is_empty()
}

/// Everything a [`CredentialIssuer`] needs to sign one request.
#[derive(Debug, Clone)]
pub struct IssuanceRequest {
    /// Workload the certificate is for.
    pub identity: WorkloadIdentity,
    /// Athenz service derived from the service account.
    pub service: ServiceName,
    /// Athenz provider, see [`IssuerConfig::provider`].
    pub provider: String,
    /// Attestation payload.
    pub attestation: AttestationData,
    /// The PEM encoded CSR, passed through unchanged.
    pub csr_pem: Vec<u8>,
}

impl IssuanceRequest {
    /// Builds a request for an already resolved identity.
    pub fn new(
        config: &IssuerConfig,
        identity: WorkloadIdentity,
        csr_pem: impl Into<Vec<u8>>,
        identity_token: Zeroizing<String>,
    ) -> Self {
        Self {
            service: identity.service_name(),
            identity,
            provider: config.provider(),
            attestation: AttestationData::new(identity_token),
            csr_pem: csr_pem.into(),
        }
    }

    /// Resolves the identity from the request's annotations, falling back to
    /// the CSR, and builds the request.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if no valid identity can be found.
    pub fn resolve(
        config: &IssuerConfig,
        annotations: &BTreeMap<String, String>,
        csr_pem: &[u8],
        identity_token: Zeroizing<String>,
    ) -> Result<Self, IdentityError> {
        let identity = WorkloadIdentity::for_request(annotations, csr_pem)?;
        Ok(Self::new(config, identity, csr_pem, identity_token))
    }
}

/// Signed credentials returned by an issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBundle {
    /// Leaf certificate followed by any intermediates.
    pub chain_pem: Vec<u8>,
    /// CA certificate, if the issuer returned one.
    pub ca_pem: Option<Vec<u8>>,
}

/// An error returned by a [`CredentialIssuer`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IssuerError {
    /// The request's identity could not be resolved.
    #[error("failed to resolve workload identity: {0}")]
    Identity(#[from] IdentityError),

    /// The issuer refused the request.
    #[error("issuer rejected the request: {0}")]
    Rejected(String),

    /// The issuer could not be reached.
    #[error("issuer transport error: {0}")]
    Transport(String),

    /// The issuer answered without a certificate.
    #[error("issuer returned no certificate")]
    EmptyResponse,
}

/// Future returned by [`CredentialIssuer::issue`].
pub type IssueFuture<'a> = Pin<Box<dyn Future<Output = Result<PemBundle, IssuerError>> + Send + 'a>>;

/// Signs issuance requests.
pub trait CredentialIssuer: Send + Sync {
    /// Issues credentials for `request`.
    fn issue<'a>(&'a self, request: &'a IssuanceRequest) -> IssueFuture<'a>;
}

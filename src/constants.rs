//! Constants shared across the crate.

/// Annotation carrying the SPIFFE ID a certificate request is issued for.
pub const IDENTITY_ANNOTATION: &str = "csi.cert-manager.athenz.io/identity";

/// URI prefix of every SPIFFE ID.
pub const SPIFFE_SCHEME_PREFIX: &str = "spiffe://";

/// PEM label of a PKCS#10 certificate signing request.
pub const CSR_PEM_LABEL: &str = "CERTIFICATE REQUEST";

/// `cloud` value selecting local self-signed issuance.
pub const LOCAL_CLOUD: &str = "local";

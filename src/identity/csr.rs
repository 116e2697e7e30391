use super::IdentityError;
use crate::constants::{CSR_PEM_LABEL, SPIFFE_SCHEME_PREFIX};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::extensions::ParsedExtension;
use x509_parser::nom::Err;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::{FromDer, GeneralName};

/// Returns the first `spiffe://` URI SAN of a PEM encoded PKCS#10 request.
///
/// The input must hold exactly one `CERTIFICATE REQUEST` block. Any run of
/// ASCII whitespace after the block, blank lines included, is accepted on
/// purpose: CSRs copied out of YAML block scalars often carry extra line
/// breaks. A strict single-block decode would reject those; here only
/// non-whitespace bytes after the block are an error.
///
/// # Errors
///
/// - [`IdentityError::NoPemBlock`] if no PEM block can be decoded.
/// - [`IdentityError::NotCertificateRequest`] for any other PEM label.
/// - [`IdentityError::TrailingData`] if bytes follow the block.
/// - [`IdentityError::ParseCsr`] if the DER is not a certificate request.
/// - [`IdentityError::MissingSpiffeUri`] if no URI SAN starts with `spiffe://`.
pub fn spiffe_uri_from_csr(csr_pem: &[u8]) -> Result<String, IdentityError> {
    let (rest, pem) = parse_x509_pem(csr_pem).map_err(|_| IdentityError::NoPemBlock)?;

    if pem.label != CSR_PEM_LABEL {
        return Err(IdentityError::NotCertificateRequest(pem.label));
    }
    if !rest.iter().all(u8::is_ascii_whitespace) {
        return Err(IdentityError::TrailingData);
    }

    let (_, csr) = X509CertificationRequest::from_der(&pem.contents).map_err(|e| match e {
        Err::Incomplete(_) => IdentityError::ParseCsr("incomplete DER input".to_string()),
        Err::Error(err) | Err::Failure(err) => IdentityError::ParseCsr(err.to_string()),
    })?;

    let uri = csr
        .requested_extensions()
        .into_iter()
        .flatten()
        .filter_map(|ext| match ext {
            ParsedExtension::SubjectAlternativeName(san) => Some(san),
            _ => None,
        })
        .flat_map(|san| san.general_names.iter())
        .find_map(|name| match name {
            GeneralName::URI(uri) if uri.starts_with(SPIFFE_SCHEME_PREFIX) => {
                Some((*uri).to_string())
            }
            _ => None,
        })
        .ok_or(IdentityError::MissingSpiffeUri);
    uri
}

//! Issued certificate validation utilities.

use chrono::Utc;
use tracing::debug;
use x509_parser::prelude::*;

use crate::error::{Error, Result};
use crate::types::Certificate;

/// Validates a certificate against its issuing CA certificate.
///
/// Checks, in order: expiry, `not_before`, issuer name, signature.
///
/// # Arguments
///
/// * `cert` - The certificate to validate.
/// * `ca_cert` - The CA certificate that should have issued this certificate.
///
/// # Errors
///
/// Returns an error if validation fails.
pub fn validate_certificate(cert: &Certificate, ca_cert: &Certificate) -> Result<()> {
    debug!("Validating certificate: {}", cert.serial());

    if is_expired(cert) {
        return Err(Error::Expired);
    }

    if is_not_yet_valid(cert) {
        return Err(Error::NotYetValid);
    }

    if cert.issuer() != ca_cert.subject() {
        return Err(Error::Validation(format!(
            "issuer '{}' does not match CA subject '{}'",
            cert.issuer(),
            ca_cert.subject()
        )));
    }

    verify_signature(cert, ca_cert)?;

    debug!("Certificate validated successfully: {}", cert.serial());

    Ok(())
}

/// Checks if a certificate is expired.
///
/// # Arguments
///
/// * `cert` - The certificate to check.
///
/// # Returns
///
/// `true` if the certificate's `not_after` has passed.
#[must_use]
pub fn is_expired(cert: &Certificate) -> bool {
    cert.not_after() < Utc::now()
}

/// Checks if a certificate is not yet valid.
///
/// # Returns
///
/// `true` if the certificate's `not_before` is in the future.
#[must_use]
pub fn is_not_yet_valid(cert: &Certificate) -> bool {
    cert.not_before() > Utc::now()
}

/// Verifies that a certificate was signed by the given issuer.
fn verify_signature(cert: &Certificate, issuer: &Certificate) -> Result<()> {
    let (_, parsed_cert) = X509Certificate::from_der(cert.der())
        .map_err(|e| Error::Parse(format!("failed to parse certificate: {e}")))?;

    let (_, parsed_issuer) = X509Certificate::from_der(issuer.der())
        .map_err(|e| Error::Parse(format!("failed to parse issuer certificate: {e}")))?;

    parsed_cert
        .verify_signature(Some(parsed_issuer.public_key()))
        .map_err(|e| {
            Error::SignatureVerification(format!(
                "signature verification failed for '{}': {:?}",
                cert.subject(),
                e
            ))
        })
}

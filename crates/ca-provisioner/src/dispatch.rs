//! Routes an authorization request to the matching provisioner operation.

use ca_pki::Certificate;
use tracing::debug;

use crate::error::{Error, Result};
use crate::provisioner::Provisioner;
use crate::request::{AuthorizationRequest, Method};
use crate::sign_options::SignOption;

/// Outcome of a successful authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// Signing is allowed with these options, in order.
    Sign(Vec<SignOption>),
    /// Revocation is allowed.
    Revoke,
    /// Renewal is allowed.
    Renew,
}

/// Authorizes `request` against `provisioner`.
///
/// `certificate` is the certificate being renewed; it is passed through for
/// auditing and not inspected.
///
/// # Errors
///
/// SSH signing is rejected with [`Error::UnsupportedMethod`]; other failures
/// come from the provisioner operation.
pub fn authorize(
    provisioner: &Provisioner,
    request: &AuthorizationRequest,
    certificate: Option<&Certificate>,
) -> Result<Authorization> {
    debug!(provisioner = %provisioner.id(), method = %request.method, "authorizing request");
    match request.method {
        Method::Sign => provisioner.authorize_sign(request).map(Authorization::Sign),
        Method::Revoke => provisioner
            .authorize_revoke(&request.credential)
            .map(|()| Authorization::Revoke),
        Method::Renew => provisioner
            .authorize_renewal(certificate)
            .map(|()| Authorization::Renew),
        Method::SignSsh => Err(Error::UnsupportedMethod {
            method: request.method.to_string(),
            id: provisioner.id(),
        }),
    }
}

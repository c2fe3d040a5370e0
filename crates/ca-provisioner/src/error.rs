//! Error types for provisioner authorization.

use std::fmt;

use thiserror::Error;

/// Errors produced while configuring provisioners or authorizing requests.
#[derive(Debug, Error)]
pub enum Error {
    /// The configured provisioner type string is empty.
    #[error("provisioner type cannot be empty")]
    EmptyType,

    /// The configured provisioner name is empty.
    #[error("provisioner name cannot be empty")]
    EmptyName,

    /// Merged claims violate the duration bounds.
    #[error("claims: {reason}")]
    InvalidClaims {
        /// The bound that failed.
        reason: String,
    },

    /// Variant-specific configuration is invalid.
    #[error("{reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The provisioner has renewal disabled.
    #[error("renew is disabled for provisioner {id}")]
    RenewDisabled {
        /// Provisioner ID.
        id: String,
    },

    /// `authorize_sign` was called with a non-sign method.
    #[error("unexpected method type {method} in context")]
    UnexpectedMethod {
        /// Numeric method code found in the request.
        method: u8,
    },

    /// The credential failed a provisioner check.
    #[error("authorization failed for provisioner {id}: {reason}")]
    Unauthorized {
        /// Provisioner ID.
        id: String,
        /// The check that failed.
        reason: String,
    },

    /// The provisioner does not allow revocation.
    #[error("revoke is not supported on a {provisioner_type} provisioner")]
    RevokeNotSupported {
        /// Upper-case provisioner type name.
        provisioner_type: String,
    },

    /// The method has no authorization path on this provisioner.
    #[error("method {method} is not supported by provisioner {id}")]
    UnsupportedMethod {
        /// Method name.
        method: String,
        /// Provisioner ID.
        id: String,
    },

    /// An operation was called before `init` succeeded.
    #[error("provisioner {id} has not been initialized")]
    NotInitialized {
        /// Provisioner ID.
        id: String,
    },

    /// No provisioner matched a lookup.
    #[error("provisioner not found: {key}")]
    NotFound {
        /// The ID, name or extension that was looked up.
        key: String,
    },

    /// Two provisioners share an ID.
    #[error("duplicated provisioner id {id}")]
    Duplicate {
        /// Provisioner ID.
        id: String,
    },

    /// The provisioner extension could not be encoded or decoded.
    #[error("error marshaling provisioner extension: {reason}")]
    Extension {
        /// The codec failure.
        reason: String,
    },

    /// A request or certificate validator rejected its input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Provisioner configuration could not be deserialized.
    #[error("invalid provisioner configuration: {reason}")]
    Config {
        /// The deserialization failure.
        reason: String,
    },

    /// Certificate handling or signing failed.
    #[error(transparent)]
    Pki(#[from] ca_pki::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Config {
            reason: err.to_string(),
        }
    }
}

/// A rejected certificate request or certificate, with what was expected and
/// what was observed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The request has no common name.
    #[error("certificate request cannot contain an empty common name")]
    EmptyCommonName,

    /// The request common name differs from the authorized one.
    #[error("certificate request does not contain the valid common name, got {got}, want {want}")]
    CommonNameMismatch {
        /// Observed common name.
        got: String,
        /// Authorized common name.
        want: String,
    },

    /// The request DNS names differ from the authorized set.
    #[error(
        "certificate request does not contain the valid DNS names - got {}, want {}",
        List(.got),
        List(.want)
    )]
    DnsNamesMismatch {
        /// Observed DNS names.
        got: Vec<String>,
        /// Authorized DNS names.
        want: Vec<String>,
    },

    /// The request IP addresses differ from the authorized set.
    #[error("IP Addresses claim failed - got {}, want {}", List(.got), List(.want))]
    IpAddressesMismatch {
        /// Observed IP addresses.
        got: Vec<String>,
        /// Authorized IP addresses.
        want: Vec<String>,
    },

    /// An email-only request carries DNS names.
    #[error("certificate request cannot contain DNS names")]
    UnexpectedDnsNames,

    /// An email-only request carries IP addresses.
    #[error("certificate request cannot contain IP addresses")]
    UnexpectedIpAddresses,

    /// An email-only request carries URIs.
    #[error("certificate request cannot contain URIs")]
    UnexpectedUris,

    /// An email-only request has no email address.
    #[error("certificate request does not contain any email address")]
    MissingEmail,

    /// An email-only request has more than one email address.
    #[error("certificate request does not contain too many email addresses")]
    TooManyEmails,

    /// The request email differs from the authorized one.
    #[error("certificate request does not contain the valid email address, got {got}, want {want}")]
    EmailMismatch {
        /// Observed email.
        got: String,
        /// Authorized email.
        want: String,
    },

    /// The certificate has already expired.
    #[error("NotAfter: {not_after} cannot be in the past")]
    NotAfterInPast {
        /// Certificate `NotAfter`.
        not_after: String,
    },

    /// The certificate validity window is inverted.
    #[error("NotAfter: {not_after} cannot be before NotBefore: {not_before}")]
    InvertedValidity {
        /// Certificate `NotAfter`.
        not_after: String,
        /// Certificate `NotBefore`.
        not_before: String,
    },

    /// The certificate lifetime is below the minimum.
    #[error(
        "requested duration of {requested} is less than the authorized minimum certificate duration of {min}"
    )]
    DurationTooShort {
        /// Requested lifetime.
        requested: String,
        /// Authorized minimum.
        min: String,
    },

    /// The certificate lifetime is above the maximum.
    #[error(
        "requested duration of {requested} is more than the authorized maximum certificate duration of {max}"
    )]
    DurationTooLong {
        /// Requested lifetime.
        requested: String,
        /// Authorized maximum.
        max: String,
    },

    /// The lifetime does not fit in a timestamp.
    #[error("requested duration of {requested} is out of range")]
    DurationOutOfRange {
        /// Requested lifetime.
        requested: String,
    },

    /// The requested `NotBefore` is past the upstream expiry.
    #[error("requested certificate notBefore ({not_before}) is after the limit notAfter ({limit})")]
    NotBeforeAfterLimit {
        /// Requested `NotBefore`.
        not_before: String,
        /// Upstream expiry.
        limit: String,
    },

    /// The requested `NotAfter` is past the upstream expiry.
    #[error("requested certificate notAfter ({not_after}) is after the limit notAfter ({limit})")]
    NotAfterAfterLimit {
        /// Requested `NotAfter`.
        not_after: String,
        /// Upstream expiry.
        limit: String,
    },

    /// The public key does not meet the key policy.
    #[error("{reason}")]
    PublicKey {
        /// Why the key was rejected.
        reason: String,
    },
}

/// Formats a list as `[a b c]`.
struct List<'a>(&'a [String]);

impl fmt::Display for List<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(" "))
    }
}

/// Result type alias for provisioner operations.
pub type Result<T> = std::result::Result<T, Error>;

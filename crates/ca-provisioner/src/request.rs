//! The request-scoped input to an authorization call.
//!
//! Credentials are produced by external verifiers (JWT signature checks,
//! OIDC token validation, cloud instance-identity documents). Provisioners
//! only inspect the claims those verifiers vouch for.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The operation a request was authenticated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// Issue an X.509 certificate.
    Sign,
    /// Issue an SSH certificate.
    SignSsh,
    /// Revoke a certificate.
    Revoke,
    /// Renew a certificate.
    Renew,
}

impl Method {
    /// Numeric code used in error messages.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Sign => 0,
            Self::SignSsh => 1,
            Self::Revoke => 2,
            Self::Renew => 3,
        }
    }

    /// Lower-case name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sign => "sign",
            Self::SignSsh => "sign-ssh",
            Self::Revoke => "revoke",
            Self::Renew => "renew",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims of a token whose signature has already been verified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// `iss`
    #[serde(rename = "iss", default)]
    pub issuer: String,
    /// `sub`
    #[serde(rename = "sub", default)]
    pub subject: String,
    /// `aud`
    #[serde(rename = "aud", default)]
    pub audience: Vec<String>,
    /// Key ID from the token header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Requested subject alternative names.
    #[serde(default)]
    pub sans: Vec<String>,
    /// Email claim, used by OIDC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl TokenClaims {
    /// Returns `true` when the token audience intersects `accepted`.
    #[must_use]
    pub fn has_audience(&self, accepted: &[String]) -> bool {
        self.audience.iter().any(|aud| accepted.contains(aud))
    }
}

/// A verified token together with the leaf certificate that signed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct X5cCredential {
    /// Token claims.
    pub claims: TokenClaims,
    /// Expiry of the leaf certificate in the `x5c` header.
    pub leaf_not_after: DateTime<Utc>,
}

/// A verified cloud instance-identity document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceIdentity {
    /// Account, project or tenant the instance belongs to.
    pub account: String,
    /// Instance identifier.
    pub instance_id: String,
    /// Private and public host names of the instance.
    #[serde(default)]
    pub hostnames: Vec<String>,
    /// IP addresses of the instance.
    #[serde(default)]
    pub ips: Vec<String>,
}

/// An externally verified identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Credential {
    /// No credential; the provisioner trusts the caller (ACME).
    None,
    /// A verified token.
    Token(TokenClaims),
    /// A verified token plus its signing certificate.
    X5c(X5cCredential),
    /// A verified instance-identity document.
    Instance(InstanceIdentity),
}

impl Credential {
    /// Returns the token claims carried by token-based credentials.
    #[must_use]
    pub const fn token(&self) -> Option<&TokenClaims> {
        match self {
            Self::Token(claims) => Some(claims),
            Self::X5c(x5c) => Some(&x5c.claims),
            Self::None | Self::Instance(_) => None,
        }
    }

    /// Short name of the credential kind for error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Token(_) => "token",
            Self::X5c(_) => "x5c token",
            Self::Instance(_) => "instance identity",
        }
    }
}

/// One authorization call: the method plus the credential presented for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Requested operation.
    pub method: Method,
    /// Verified credential.
    pub credential: Credential,
}

impl AuthorizationRequest {
    /// Creates a request.
    #[must_use]
    pub const fn new(method: Method, credential: Credential) -> Self {
        Self { method, credential }
    }

    /// A sign request without credential.
    #[must_use]
    pub const fn sign() -> Self {
        Self::new(Method::Sign, Credential::None)
    }
}

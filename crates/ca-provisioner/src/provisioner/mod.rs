//! Provisioners: configured authentication methods allowed to obtain
//! certificates.
//!
//! [`Provisioner`] is a closed set of variants. Each variant validates its
//! configuration in `init`, then authorizes sign, revoke and renew requests
//! using credentials an external verifier has already checked.

mod acme;
mod cloud;
mod jwk;
mod k8s_sa;
mod oidc;
mod x5c;

pub use acme::Acme;
pub use cloud::Cloud;
pub use jwk::{Jwk, JsonWebKey};
pub use k8s_sa::{K8sSa, K8S_SA_ISSUER};
pub use oidc::Oidc;
pub use x5c::X5c;

use std::fmt;
use std::net::IpAddr;

use ca_pki::{Certificate, SubjectAltName};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::claims::{Claimer, Claims, Config};
use crate::error::{Error, Result};
use crate::extension::ProvisionerExtension;
use crate::request::{AuthorizationRequest, Credential, Method, TokenClaims};
use crate::sign_options::{CertificateValidator, RequestValidator, SignOption, ValidityValidator};

/// Provisioner kind, with the numeric codes written into the provisioner
/// extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisionerType {
    /// JSON Web Key tokens.
    #[serde(rename = "JWK")]
    Jwk,
    /// OpenID Connect tokens.
    #[serde(rename = "OIDC")]
    Oidc,
    /// Google Cloud instance identity.
    #[serde(rename = "GCP")]
    Gcp,
    /// AWS instance identity.
    #[serde(rename = "AWS")]
    Aws,
    /// Azure instance identity.
    #[serde(rename = "Azure")]
    Azure,
    /// ACME; challenges are validated elsewhere.
    #[serde(rename = "ACME")]
    Acme,
    /// Tokens signed by a certificate chaining to trusted roots.
    #[serde(rename = "X5C")]
    X5c,
    /// Kubernetes service-account tokens.
    #[serde(rename = "K8sSA")]
    K8sSa,
}

impl ProvisionerType {
    const ALL: [Self; 8] = [
        Self::Jwk,
        Self::Oidc,
        Self::Gcp,
        Self::Aws,
        Self::Azure,
        Self::Acme,
        Self::X5c,
        Self::K8sSa,
    ];

    /// Numeric code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Jwk => 1,
            Self::Oidc => 2,
            Self::Gcp => 3,
            Self::Aws => 4,
            Self::Azure => 5,
            Self::Acme => 6,
            Self::X5c => 7,
            Self::K8sSa => 8,
        }
    }

    /// Looks a type up by its numeric code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Canonical name as written in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jwk => "JWK",
            Self::Oidc => "OIDC",
            Self::Gcp => "GCP",
            Self::Aws => "AWS",
            Self::Azure => "Azure",
            Self::Acme => "ACME",
            Self::X5c => "X5C",
            Self::K8sSa => "K8sSA",
        }
    }

    /// Case-insensitive lookup by configured name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }

    /// Provisioner ID for a provisioner of this type named `name`.
    #[must_use]
    pub fn id_for(self, name: &str) -> String {
        format!("{}/{name}", self.as_str().to_lowercase())
    }
}

impl fmt::Display for ProvisionerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields every provisioner shares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionerBase {
    /// Configured type string.
    #[serde(rename = "type", default)]
    pub type_name: String,
    /// Provisioner name, unique per type.
    #[serde(default)]
    pub name: String,
    /// Claims overriding the global defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claims: Option<Claims>,
    #[serde(skip)]
    claimer: Option<Claimer>,
    #[serde(skip)]
    audiences: crate::claims::Audiences,
}

impl ProvisionerBase {
    /// Creates a base with the given type string and name.
    #[must_use]
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets claims overriding the global defaults.
    #[must_use]
    pub fn with_claims(mut self, claims: Claims) -> Self {
        self.claims = Some(claims);
        self
    }

    /// Checks the type and name; runs before any variant check.
    fn check_identity(&self) -> Result<()> {
        if self.type_name.is_empty() {
            return Err(Error::EmptyType);
        }
        if self.name.is_empty() {
            return Err(Error::EmptyName);
        }
        Ok(())
    }

    /// Resolves claims and copies the audiences; the final step of `init`.
    fn bind(&mut self, config: &Config) -> Result<()> {
        self.claimer = Some(Claimer::new(self.claims.as_ref(), &config.claims)?);
        self.audiences = config.audiences.clone();
        Ok(())
    }

    fn claimer(&self, id: &str) -> Result<&Claimer> {
        self.claimer.as_ref().ok_or_else(|| Error::NotInitialized { id: id.to_string() })
    }

    fn is_initialized(&self) -> bool {
        self.claimer.is_some()
    }
}

/// Appends the options every variant ends with: duration, extension,
/// validity bounds and the public-key policy.
fn finish_options(
    mut options: Vec<SignOption>,
    duration: SignOption,
    extension: ProvisionerExtension,
    claimer: &Claimer,
) -> Vec<SignOption> {
    options.push(duration);
    options.push(SignOption::ProvisionerExtension(extension));
    options.push(SignOption::Certificate(CertificateValidator::Validity(
        ValidityValidator::new(claimer.min_tls_cert_duration(), claimer.max_tls_cert_duration()),
    )));
    options.push(SignOption::Certificate(CertificateValidator::DefaultPublicKey));
    options
}

fn unauthorized(id: &str, reason: impl Into<String>) -> Error {
    Error::Unauthorized {
        id: id.to_string(),
        reason: reason.into(),
    }
}

/// Extracts the token claims from a token-based credential.
fn expect_token<'a>(id: &str, credential: &'a Credential) -> Result<&'a TokenClaims> {
    credential
        .token()
        .ok_or_else(|| unauthorized(id, format!("expected a token, got {}", credential.kind())))
}

/// Checks issuer and audience of a verified token.
fn check_token(id: &str, token: &TokenClaims, issuer: &str, audiences: &[String]) -> Result<()> {
    if token.issuer != issuer {
        return Err(unauthorized(
            id,
            format!("invalid token issuer {}, want {issuer}", token.issuer),
        ));
    }
    if !token.has_audience(audiences) {
        return Err(unauthorized(
            id,
            format!("invalid token audience [{}]", token.audience.join(" ")),
        ));
    }
    Ok(())
}

fn check_subject(id: &str, token: &TokenClaims) -> Result<()> {
    if token.subject.is_empty() {
        return Err(unauthorized(id, "token subject cannot be empty"));
    }
    Ok(())
}

/// `CommonName`, `DnsNames` and `IpAddresses` validators for a token
/// subject and its SANs. SANs default to the subject.
fn subject_validators(id: &str, token: &TokenClaims) -> Result<Vec<SignOption>> {
    let sans = if token.sans.is_empty() {
        std::slice::from_ref(&token.subject)
    } else {
        token.sans.as_slice()
    };

    let mut dns = Vec::new();
    let mut ips: Vec<IpAddr> = Vec::new();
    for san in sans {
        match SubjectAltName::parse(san) {
            SubjectAltName::Dns(name) => dns.push(name),
            SubjectAltName::Ip(ip) => ips.push(ip),
            other => {
                return Err(unauthorized(
                    id,
                    format!("token SAN {other} is not a DNS name or IP address"),
                ));
            }
        }
    }

    Ok(vec![
        SignOption::Request(RequestValidator::CommonName(token.subject.clone())),
        SignOption::Request(RequestValidator::DnsNames(dns)),
        SignOption::Request(RequestValidator::IpAddresses(ips)),
    ])
}

/// A configured provisioner.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Provisioner {
    /// ACME.
    Acme(Acme),
    /// JSON Web Key tokens.
    Jwk(Jwk),
    /// OpenID Connect tokens.
    Oidc(Oidc),
    /// X5C tokens.
    X5c(X5c),
    /// Kubernetes service-account tokens.
    K8sSa(K8sSa),
    /// AWS, GCP or Azure instance identity.
    Cloud(Cloud),
}

impl Provisioner {
    fn base(&self) -> &ProvisionerBase {
        match self {
            Self::Acme(p) => &p.base,
            Self::Jwk(p) => &p.base,
            Self::Oidc(p) => &p.base,
            Self::X5c(p) => &p.base,
            Self::K8sSa(p) => &p.base,
            Self::Cloud(p) => &p.base,
        }
    }

    /// Provisioner kind.
    #[must_use]
    pub fn provisioner_type(&self) -> ProvisionerType {
        match self {
            Self::Acme(_) => ProvisionerType::Acme,
            Self::Jwk(_) => ProvisionerType::Jwk,
            Self::Oidc(_) => ProvisionerType::Oidc,
            Self::X5c(_) => ProvisionerType::X5c,
            Self::K8sSa(_) => ProvisionerType::K8sSa,
            Self::Cloud(p) => p.cloud_type(),
        }
    }

    /// Provisioner name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.base().name
    }

    /// `<type-lowercase>/<name>`, e.g. `acme/foo`.
    #[must_use]
    pub fn id(&self) -> String {
        self.provisioner_type().id_for(self.name())
    }

    /// Resolved claims; `None` until `init` succeeds.
    #[must_use]
    pub fn claimer(&self) -> Option<&Claimer> {
        self.base().claimer.as_ref()
    }

    /// Whether `init` has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.base().is_initialized()
    }

    /// Returns `(key_id, encrypted_key, true)` for a JWK provisioner with an
    /// encrypted private key and `("", "", false)` otherwise.
    #[must_use]
    pub fn encrypted_key(&self) -> (&str, &str, bool) {
        match self {
            Self::Jwk(p) => p.encrypted_key(),
            _ => ("", "", false),
        }
    }

    /// Validates the configuration and binds the resolved claims.
    ///
    /// Checks run in order: type, name, variant configuration, claims.
    ///
    /// # Errors
    ///
    /// Returns the first failing check. The provisioner stays unusable.
    pub fn init(&mut self, config: &Config) -> Result<()> {
        match self {
            Self::Acme(p) => p.init(config),
            Self::Jwk(p) => p.init(config),
            Self::Oidc(p) => p.init(config),
            Self::X5c(p) => p.init(config),
            Self::K8sSa(p) => p.init(config),
            Self::Cloud(p) => p.init(config),
        }
    }

    /// Authorizes a sign request and returns the ordered sign options.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::UnexpectedMethod`] for any method but
    /// [`Method::Sign`], [`Error::NotInitialized`] before `init`, or the
    /// variant's credential error. No options are returned on failure.
    pub fn authorize_sign(&self, request: &AuthorizationRequest) -> Result<Vec<SignOption>> {
        if request.method != Method::Sign {
            return Err(Error::UnexpectedMethod {
                method: request.method.code(),
            });
        }
        let options = match self {
            Self::Acme(p) => p.authorize_sign(),
            Self::Jwk(p) => p.authorize_sign(&request.credential),
            Self::Oidc(p) => p.authorize_sign(&request.credential),
            Self::X5c(p) => p.authorize_sign(&request.credential),
            Self::K8sSa(p) => p.authorize_sign(&request.credential),
            Self::Cloud(p) => p.authorize_sign(&request.credential),
        }?;
        debug!(provisioner = %self.id(), options = options.len(), "sign authorized");
        Ok(options)
    }

    /// Authorizes revocation of a certificate issued by this provisioner.
    ///
    /// # Errors
    ///
    /// Fails when the provisioner does not allow revocation or the
    /// credential is not valid for it.
    pub fn authorize_revoke(&self, credential: &Credential) -> Result<()> {
        match self {
            Self::Acme(p) => p.authorize_revoke(),
            Self::Jwk(p) => p.authorize_revoke(credential),
            Self::Oidc(p) => p.authorize_revoke(credential),
            Self::X5c(p) => p.authorize_revoke(credential),
            Self::K8sSa(p) => p.authorize_revoke(credential),
            Self::Cloud(p) => p.authorize_revoke(),
        }?;
        debug!(provisioner = %self.id(), "revoke authorized");
        Ok(())
    }

    /// Authorizes renewal.
    ///
    /// The certificate is accepted for auditing and future policy; it is not
    /// inspected.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::RenewDisabled`] when the resolved claims disable
    /// renewal.
    pub fn authorize_renewal(&self, _certificate: Option<&Certificate>) -> Result<()> {
        let id = self.id();
        if self.base().claimer(&id)?.is_renewal_disabled() {
            return Err(Error::RenewDisabled { id });
        }
        debug!(provisioner = %id, "renew authorized");
        Ok(())
    }

    /// Parses a provisioner from its JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed JSON or an unknown type.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl<'de> Deserialize<'de> for Provisioner {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error as _;

        let value = serde_json::Value::deserialize(deserializer)?;
        let type_name = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        if type_name.is_empty() {
            return Err(D::Error::custom(Error::EmptyType));
        }
        let provisioner_type = ProvisionerType::parse(type_name)
            .ok_or_else(|| D::Error::custom(format!("unsupported provisioner type {type_name}")))?;

        let parsed = match provisioner_type {
            ProvisionerType::Acme => serde_json::from_value(value).map(Self::Acme),
            ProvisionerType::Jwk => serde_json::from_value(value).map(Self::Jwk),
            ProvisionerType::Oidc => serde_json::from_value(value).map(Self::Oidc),
            ProvisionerType::X5c => serde_json::from_value(value).map(Self::X5c),
            ProvisionerType::K8sSa => serde_json::from_value(value).map(Self::K8sSa),
            ProvisionerType::Aws | ProvisionerType::Gcp | ProvisionerType::Azure => {
                serde_json::from_value::<Cloud>(value).map(|mut cloud| {
                    cloud.kind = provisioner_type;
                    Self::Cloud(cloud)
                })
            }
        };
        parsed.map_err(D::Error::custom)
    }
}

impl From<Acme> for Provisioner {
    fn from(p: Acme) -> Self {
        Self::Acme(p)
    }
}

impl From<Jwk> for Provisioner {
    fn from(p: Jwk) -> Self {
        Self::Jwk(p)
    }
}

impl From<Oidc> for Provisioner {
    fn from(p: Oidc) -> Self {
        Self::Oidc(p)
    }
}

impl From<X5c> for Provisioner {
    fn from(p: X5c) -> Self {
        Self::X5c(p)
    }
}

impl From<K8sSa> for Provisioner {
    fn from(p: K8sSa) -> Self {
        Self::K8sSa(p)
    }
}

impl From<Cloud> for Provisioner {
    fn from(p: Cloud) -> Self {
        Self::Cloud(p)
    }
}

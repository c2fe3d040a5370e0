//! OIDC provisioner: identity tokens from an OpenID Connect issuer.

use serde::{Deserialize, Serialize};

use super::{check_token, expect_token, finish_options, unauthorized, ProvisionerBase, ProvisionerType};
use crate::claims::Config;
use crate::error::{Error, Result};
use crate::extension::ProvisionerExtension;
use crate::request::Credential;
use crate::sign_options::{RequestValidator, SignOption};

/// A provisioner accepting ID tokens from one OpenID Connect client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Oidc {
    #[serde(flatten)]
    pub(super) base: ProvisionerBase,
    /// OAuth client ID; tokens must be issued for it.
    #[serde(rename = "clientID", default)]
    pub client_id: String,
    /// Expected token issuer.
    #[serde(default)]
    pub issuer: String,
    /// Emails allowed to request any identity and to revoke.
    #[serde(default)]
    pub admins: Vec<String>,
    /// Email domains accepted for non-admin users; empty accepts all.
    #[serde(default)]
    pub domains: Vec<String>,
}

impl Oidc {
    /// Creates an OIDC provisioner.
    #[must_use]
    pub fn new(name: impl Into<String>, client_id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            base: ProvisionerBase::new(ProvisionerType::Oidc.as_str(), name),
            client_id: client_id.into(),
            issuer: issuer.into(),
            admins: Vec::new(),
            domains: Vec::new(),
        }
    }

    fn id(&self) -> String {
        ProvisionerType::Oidc.id_for(&self.base.name)
    }

    fn is_admin(&self, email: &str) -> bool {
        self.admins.iter().any(|admin| admin == email)
    }

    pub(super) fn init(&mut self, config: &Config) -> Result<()> {
        self.base.check_identity()?;
        if self.client_id.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "clientID cannot be empty".into(),
            });
        }
        if self.issuer.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "issuer cannot be empty".into(),
            });
        }
        self.base.bind(config)
    }

    /// Validates the token and returns its email.
    fn authorize_token<'a>(&self, credential: &'a Credential) -> Result<&'a str> {
        let id = self.id();
        let token = expect_token(&id, credential)?;
        check_token(&id, token, &self.issuer, std::slice::from_ref(&self.client_id))?;

        let email = token.email.as_deref().unwrap_or_default();
        if email.is_empty() {
            return Err(unauthorized(&id, "token email cannot be empty"));
        }
        if !self.domains.is_empty() && !self.is_admin(email) {
            let domain = email.rsplit_once('@').map_or("", |(_, d)| d);
            if !self.domains.iter().any(|d| d.eq_ignore_ascii_case(domain)) {
                return Err(unauthorized(&id, format!("email domain {domain} is not allowed")));
            }
        }
        Ok(email)
    }

    pub(super) fn authorize_sign(&self, credential: &Credential) -> Result<Vec<SignOption>> {
        let claimer = self.base.claimer(&self.id())?;
        let email = self.authorize_token(credential)?;

        let mut validators = Vec::new();
        if !self.is_admin(email) {
            validators.push(SignOption::Request(RequestValidator::EmailOnlyIdentity(
                email.to_string(),
            )));
        }
        Ok(finish_options(
            validators,
            SignOption::DefaultDuration(claimer.default_tls_cert_duration()),
            ProvisionerExtension::new(ProvisionerType::Oidc, &self.base.name, &self.client_id),
            claimer,
        ))
    }

    pub(super) fn authorize_revoke(&self, credential: &Credential) -> Result<()> {
        let id = self.id();
        self.base.claimer(&id)?;
        let email = self.authorize_token(credential)?;
        if !self.is_admin(email) {
            return Err(unauthorized(&id, "only administrators can revoke certificates"));
        }
        Ok(())
    }
}

//! Kubernetes service-account provisioner.

use serde::{Deserialize, Serialize};
use x509_parser::pem::Pem;

use super::{check_token, expect_token, finish_options, ProvisionerBase, ProvisionerType};
use crate::claims::Config;
use crate::error::{Error, Result};
use crate::extension::ProvisionerExtension;
use crate::request::Credential;
use crate::sign_options::SignOption;

/// Issuer of Kubernetes service-account tokens.
pub const K8S_SA_ISSUER: &str = "kubernetes/serviceaccount";

/// A provisioner accepting Kubernetes service-account tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct K8sSa {
    #[serde(flatten)]
    pub(super) base: ProvisionerBase,
    /// PEM bundle of the keys that sign service-account tokens.
    #[serde(rename = "publicKeys", default)]
    pub public_keys: String,
    #[serde(skip)]
    key_count: usize,
}

impl K8sSa {
    /// Creates a service-account provisioner trusting the PEM `public_keys`.
    #[must_use]
    pub fn new(name: impl Into<String>, public_keys: impl Into<String>) -> Self {
        Self {
            base: ProvisionerBase::new(ProvisionerType::K8sSa.as_str(), name),
            public_keys: public_keys.into(),
            key_count: 0,
        }
    }

    fn id(&self) -> String {
        ProvisionerType::K8sSa.id_for(&self.base.name)
    }

    /// Number of public keys found at `init`.
    #[must_use]
    pub const fn key_count(&self) -> usize {
        self.key_count
    }

    pub(super) fn init(&mut self, config: &Config) -> Result<()> {
        self.base.check_identity()?;

        let key_count = Pem::iter_from_buffer(self.public_keys.as_bytes())
            .filter_map(std::result::Result::ok)
            .filter(|pem| pem.label.ends_with("PUBLIC KEY"))
            .count();
        if key_count == 0 {
            return Err(Error::InvalidConfig {
                reason: "public keys cannot be empty".into(),
            });
        }

        self.base.bind(config)?;
        self.key_count = key_count;
        Ok(())
    }

    fn authorize_token(&self, credential: &Credential, audiences: &[String]) -> Result<()> {
        let id = self.id();
        let token = expect_token(&id, credential)?;
        check_token(&id, token, K8S_SA_ISSUER, audiences)
    }

    pub(super) fn authorize_sign(&self, credential: &Credential) -> Result<Vec<SignOption>> {
        let claimer = self.base.claimer(&self.id())?;
        self.authorize_token(credential, &self.base.audiences.sign)?;
        Ok(finish_options(
            Vec::new(),
            SignOption::DefaultDuration(claimer.default_tls_cert_duration()),
            ProvisionerExtension::new(ProvisionerType::K8sSa, &self.base.name, ""),
            claimer,
        ))
    }

    pub(super) fn authorize_revoke(&self, credential: &Credential) -> Result<()> {
        self.base.claimer(&self.id())?;
        self.authorize_token(credential, &self.base.audiences.revoke)
    }
}

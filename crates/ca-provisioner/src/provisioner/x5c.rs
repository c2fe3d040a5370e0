//! X5C provisioner: tokens signed by a certificate chaining to configured
//! roots.

use ca_pki::Certificate;
use serde::{Deserialize, Serialize};
use x509_parser::pem::Pem;

use super::{
    check_subject, check_token, finish_options, subject_validators, unauthorized, ProvisionerBase,
    ProvisionerType,
};
use crate::claims::Config;
use crate::error::{Error, Result};
use crate::extension::ProvisionerExtension;
use crate::request::{Credential, X5cCredential};
use crate::sign_options::SignOption;

/// A provisioner accepting tokens whose `x5c` leaf chains to `roots`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct X5c {
    #[serde(flatten)]
    pub(super) base: ProvisionerBase,
    /// PEM bundle of trusted root certificates.
    #[serde(default)]
    pub roots: String,
    #[serde(skip)]
    parsed_roots: Vec<Certificate>,
}

impl X5c {
    /// Creates an X5C provisioner trusting the PEM `roots`.
    #[must_use]
    pub fn new(name: impl Into<String>, roots: impl Into<String>) -> Self {
        Self {
            base: ProvisionerBase::new(ProvisionerType::X5c.as_str(), name),
            roots: roots.into(),
            parsed_roots: Vec::new(),
        }
    }

    fn id(&self) -> String {
        ProvisionerType::X5c.id_for(&self.base.name)
    }

    /// Trusted roots parsed at `init`.
    #[must_use]
    pub fn trusted_roots(&self) -> &[Certificate] {
        &self.parsed_roots
    }

    pub(super) fn init(&mut self, config: &Config) -> Result<()> {
        self.base.check_identity()?;

        // Blocks that are not certificates are skipped.
        let roots = Pem::iter_from_buffer(self.roots.as_bytes())
            .filter_map(std::result::Result::ok)
            .filter(|pem| pem.label == "CERTIFICATE")
            .map(|pem| Certificate::from_der(&pem.contents))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        if roots.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "no x509 certificates found in roots attribute".into(),
            });
        }

        self.base.bind(config)?;
        self.parsed_roots = roots;
        Ok(())
    }

    fn authorize_token<'a>(&self, credential: &'a Credential, audiences: &[String]) -> Result<&'a X5cCredential> {
        let id = self.id();
        let Credential::X5c(x5c) = credential else {
            return Err(unauthorized(
                &id,
                format!("expected an x5c token, got {}", credential.kind()),
            ));
        };
        check_token(&id, &x5c.claims, &self.base.name, audiences)?;
        check_subject(&id, &x5c.claims)?;
        Ok(x5c)
    }

    pub(super) fn authorize_sign(&self, credential: &Credential) -> Result<Vec<SignOption>> {
        let id = self.id();
        let claimer = self.base.claimer(&id)?;
        let x5c = self.authorize_token(credential, &self.base.audiences.sign)?;
        let validators = subject_validators(&id, &x5c.claims)?;
        Ok(finish_options(
            validators,
            SignOption::LimitDuration {
                duration: claimer.default_tls_cert_duration(),
                not_after: x5c.leaf_not_after,
            },
            ProvisionerExtension::new(ProvisionerType::X5c, &self.base.name, ""),
            claimer,
        ))
    }

    pub(super) fn authorize_revoke(&self, credential: &Credential) -> Result<()> {
        self.base.claimer(&self.id())?;
        self.authorize_token(credential, &self.base.audiences.revoke)?;
        Ok(())
    }
}

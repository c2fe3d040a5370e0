//! JWK provisioner: tokens signed with a configured JSON Web Key.

use serde::{Deserialize, Serialize};

use super::{
    check_subject, check_token, expect_token, finish_options, subject_validators, unauthorized,
    ProvisionerBase, ProvisionerType,
};
use crate::claims::Config;
use crate::error::{Error, Result};
use crate::extension::ProvisionerExtension;
use crate::request::{Credential, TokenClaims};
use crate::sign_options::SignOption;

/// Public half of the provisioner key.
///
/// Only the identifying members are interpreted; the key material is kept
/// verbatim for the token verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key ID.
    #[serde(default)]
    pub kid: String,
    /// Key type, e.g. `EC`.
    #[serde(default)]
    pub kty: String,
    /// Signature algorithm, e.g. `ES256`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alg: String,
    /// Remaining key members (`crv`, `x`, `y`, `n`, `e`, ...).
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// A provisioner accepting tokens signed by one JSON Web Key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
    #[serde(flatten)]
    pub(super) base: ProvisionerBase,
    /// Verification key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<JsonWebKey>,
    /// JWE-encrypted private key handed to clients.
    #[serde(rename = "encryptedKey", default, skip_serializing_if = "Option::is_none")]
    pub encrypted_key: Option<String>,
}

impl Jwk {
    /// Creates a JWK provisioner named `name` verifying tokens with `key`.
    #[must_use]
    pub fn new(name: impl Into<String>, key: JsonWebKey) -> Self {
        Self {
            base: ProvisionerBase::new(ProvisionerType::Jwk.as_str(), name),
            key: Some(key),
            encrypted_key: None,
        }
    }

    /// Replaces the shared fields.
    #[must_use]
    pub fn with_base(mut self, base: ProvisionerBase) -> Self {
        self.base = base;
        self
    }

    /// Sets the encrypted private key.
    #[must_use]
    pub fn with_encrypted_key(mut self, encrypted_key: impl Into<String>) -> Self {
        self.encrypted_key = Some(encrypted_key.into());
        self
    }

    fn id(&self) -> String {
        ProvisionerType::Jwk.id_for(&self.base.name)
    }

    fn kid(&self) -> &str {
        self.key.as_ref().map_or("", |k| k.kid.as_str())
    }

    pub(super) fn encrypted_key(&self) -> (&str, &str, bool) {
        match &self.encrypted_key {
            Some(encrypted) => (self.kid(), encrypted.as_str(), true),
            None => ("", "", false),
        }
    }

    pub(super) fn init(&mut self, config: &Config) -> Result<()> {
        self.base.check_identity()?;
        if self.key.is_none() {
            return Err(Error::InvalidConfig {
                reason: "provisioner key cannot be empty".into(),
            });
        }
        self.base.bind(config)
    }

    fn authorize_token<'a>(&self, credential: &'a Credential, audiences: &[String]) -> Result<&'a TokenClaims> {
        let id = self.id();
        let token = expect_token(&id, credential)?;
        check_token(&id, token, &self.base.name, audiences)?;
        check_subject(&id, token)?;
        if let Some(kid) = &token.kid {
            if kid != self.kid() {
                return Err(unauthorized(&id, format!("invalid token key id {kid}")));
            }
        }
        Ok(token)
    }

    pub(super) fn authorize_sign(&self, credential: &Credential) -> Result<Vec<SignOption>> {
        let id = self.id();
        let claimer = self.base.claimer(&id)?;
        let token = self.authorize_token(credential, &self.base.audiences.sign)?;
        let validators = subject_validators(&id, token)?;
        Ok(finish_options(
            validators,
            SignOption::DefaultDuration(claimer.default_tls_cert_duration()),
            ProvisionerExtension::new(ProvisionerType::Jwk, &self.base.name, self.kid()),
            claimer,
        ))
    }

    pub(super) fn authorize_revoke(&self, credential: &Credential) -> Result<()> {
        self.base.claimer(&self.id())?;
        self.authorize_token(credential, &self.base.audiences.revoke)?;
        Ok(())
    }
}

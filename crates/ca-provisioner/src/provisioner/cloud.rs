//! Cloud instance-identity provisioners (AWS, GCP, Azure).

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::{finish_options, unauthorized, ProvisionerBase, ProvisionerType};
use crate::claims::Config;
use crate::error::{Error, Result};
use crate::extension::ProvisionerExtension;
use crate::request::{Credential, InstanceIdentity};
use crate::sign_options::{RequestValidator, SignOption};

/// A provisioner accepting instance-identity documents from one cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cloud {
    #[serde(flatten)]
    pub(super) base: ProvisionerBase,
    /// Allowed accounts, projects or tenants; empty accepts all.
    #[serde(default, alias = "projectIDs", alias = "tenantIDs")]
    pub accounts: Vec<String>,
    /// Restrict SANs to the instance's own identity.
    #[serde(rename = "disableCustomSANs", default)]
    pub disable_custom_sans: bool,
    #[serde(skip, default = "Cloud::default_kind")]
    pub(super) kind: ProvisionerType,
}

impl Cloud {
    const fn default_kind() -> ProvisionerType {
        ProvisionerType::Aws
    }

    fn with_kind(kind: ProvisionerType, name: impl Into<String>) -> Self {
        Self {
            base: ProvisionerBase::new(kind.as_str(), name),
            accounts: Vec::new(),
            disable_custom_sans: false,
            kind,
        }
    }

    /// Creates an AWS provisioner.
    #[must_use]
    pub fn aws(name: impl Into<String>) -> Self {
        Self::with_kind(ProvisionerType::Aws, name)
    }

    /// Creates a GCP provisioner.
    #[must_use]
    pub fn gcp(name: impl Into<String>) -> Self {
        Self::with_kind(ProvisionerType::Gcp, name)
    }

    /// Creates an Azure provisioner.
    #[must_use]
    pub fn azure(name: impl Into<String>) -> Self {
        Self::with_kind(ProvisionerType::Azure, name)
    }

    /// Which cloud this provisioner serves.
    #[must_use]
    pub const fn cloud_type(&self) -> ProvisionerType {
        self.kind
    }

    fn id(&self) -> String {
        self.kind.id_for(&self.base.name)
    }

    pub(super) fn init(&mut self, config: &Config) -> Result<()> {
        self.base.check_identity()?;
        self.base.bind(config)
    }

    fn sans_validators(&self, id: &str, identity: &InstanceIdentity) -> Result<Vec<SignOption>> {
        let ips = identity
            .ips
            .iter()
            .map(|ip| {
                ip.parse::<IpAddr>()
                    .map_err(|_| unauthorized(id, format!("invalid instance IP address {ip}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(vec![
            SignOption::Request(RequestValidator::CommonName(identity.instance_id.clone())),
            SignOption::Request(RequestValidator::DnsNames(identity.hostnames.clone())),
            SignOption::Request(RequestValidator::IpAddresses(ips)),
        ])
    }

    pub(super) fn authorize_sign(&self, credential: &Credential) -> Result<Vec<SignOption>> {
        let id = self.id();
        let claimer = self.base.claimer(&id)?;
        let Credential::Instance(identity) = credential else {
            return Err(unauthorized(
                &id,
                format!("expected an instance identity, got {}", credential.kind()),
            ));
        };
        if identity.instance_id.is_empty() {
            return Err(unauthorized(&id, "instance id cannot be empty"));
        }
        if !self.accounts.is_empty() && !self.accounts.contains(&identity.account) {
            return Err(unauthorized(
                &id,
                format!("account {} is not allowed", identity.account),
            ));
        }

        let validators = if self.disable_custom_sans {
            self.sans_validators(&id, identity)?
        } else {
            Vec::new()
        };
        let extension = ProvisionerExtension::new(self.kind, &self.base.name, &identity.account)
            .with_key_value_pairs(vec!["InstanceID".into(), identity.instance_id.clone()]);
        Ok(finish_options(
            validators,
            SignOption::DefaultDuration(claimer.default_tls_cert_duration()),
            extension,
            claimer,
        ))
    }

    pub(super) fn authorize_revoke(&self) -> Result<()> {
        self.base.claimer(&self.id())?;
        Err(Error::RevokeNotSupported {
            provisioner_type: self.kind.as_str().to_uppercase(),
        })
    }
}

//! ACME provisioner.

use serde::{Deserialize, Serialize};

use super::{finish_options, ProvisionerBase, ProvisionerType};
use crate::claims::Config;
use crate::error::Result;
use crate::extension::ProvisionerExtension;
use crate::sign_options::SignOption;

/// A provisioner for ACME clients. Challenge validation happens before
/// authorization, so signing needs no credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acme {
    #[serde(flatten)]
    pub(super) base: ProvisionerBase,
}

impl Acme {
    /// Creates an ACME provisioner named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_base(ProvisionerBase::new(ProvisionerType::Acme.as_str(), name))
    }

    /// Creates an ACME provisioner from shared fields.
    #[must_use]
    pub const fn from_base(base: ProvisionerBase) -> Self {
        Self { base }
    }

    fn id(&self) -> String {
        ProvisionerType::Acme.id_for(&self.base.name)
    }

    pub(super) fn init(&mut self, config: &Config) -> Result<()> {
        self.base.check_identity()?;
        self.base.bind(config)
    }

    pub(super) fn authorize_sign(&self) -> Result<Vec<SignOption>> {
        let claimer = self.base.claimer(&self.id())?;
        Ok(finish_options(
            Vec::new(),
            SignOption::DefaultDuration(claimer.default_tls_cert_duration()),
            ProvisionerExtension::new(ProvisionerType::Acme, &self.base.name, ""),
            claimer,
        ))
    }

    pub(super) fn authorize_revoke(&self) -> Result<()> {
        self.base.claimer(&self.id())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Claims;
    use crate::duration::Duration;
    use crate::error::Error;
    use crate::provisioner::testutil::config;
    use crate::provisioner::Provisioner;
    use crate::request::{AuthorizationRequest, Credential};
    use crate::sign_options::{CertificateValidator, ValidityValidator};

    fn provisioner() -> Provisioner {
        let mut p = Provisioner::Acme(Acme::new("test@acme-provisioner.com"));
        p.init(&config()).unwrap();
        p
    }

    #[test]
    fn init_checks_type_then_name() {
        let mut p = Acme::from_base(ProvisionerBase::new("", ""));
        assert!(matches!(p.init(&config()), Err(Error::EmptyType)));

        let mut p = Acme::from_base(ProvisionerBase::new("ACME", ""));
        assert!(matches!(p.init(&config()), Err(Error::EmptyName)));
    }

    #[test]
    fn init_rejects_zero_default_duration() {
        let claims = Claims {
            default_tls_cert_duration: Some(Duration::ZERO),
            ..Claims::default()
        };
        let mut p = Acme::from_base(ProvisionerBase::new("ACME", "foo").with_claims(claims));
        let err = p.init(&config()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "claims: DefaultTLSCertDuration must be greater than 0"
        );
    }

    #[test]
    fn authorize_sign_returns_four_options_in_order() {
        let p = provisioner();
        let options = p.authorize_sign(&AuthorizationRequest::sign()).unwrap();
        assert_eq!(
            options,
            vec![
                SignOption::DefaultDuration(Duration::from_secs(86_400)),
                SignOption::ProvisionerExtension(ProvisionerExtension::new(
                    ProvisionerType::Acme,
                    "test@acme-provisioner.com",
                    ""
                )),
                SignOption::Certificate(CertificateValidator::Validity(ValidityValidator::new(
                    Duration::from_secs(300),
                    Duration::from_secs(86_400)
                ))),
                SignOption::Certificate(CertificateValidator::DefaultPublicKey),
            ]
        );
    }

    #[test]
    fn authorize_sign_ignores_credential() {
        let p = provisioner();
        let request = AuthorizationRequest::new(
            crate::request::Method::Sign,
            Credential::Token(crate::request::TokenClaims::default()),
        );
        assert_eq!(p.authorize_sign(&request).unwrap().len(), 4);
    }

    #[test]
    fn validity_bounds_follow_claims() {
        let claims = Claims {
            min_tls_cert_duration: Some(Duration::from_mins(1)),
            max_tls_cert_duration: Some(Duration::from_hours(48)),
            ..Claims::default()
        };
        let mut p = Provisioner::Acme(Acme::from_base(
            ProvisionerBase::new("ACME", "foo").with_claims(claims),
        ));
        p.init(&config()).unwrap();
        let options = p.authorize_sign(&AuthorizationRequest::sign()).unwrap();
        assert_eq!(
            options[2],
            SignOption::Certificate(CertificateValidator::Validity(ValidityValidator::new(
                Duration::from_mins(1),
                Duration::from_hours(48)
            )))
        );
    }

    #[test]
    fn revoke_is_allowed() {
        assert!(provisioner().authorize_revoke(&Credential::None).is_ok());
    }
}

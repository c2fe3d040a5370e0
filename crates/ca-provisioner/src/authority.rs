//! Reference profile builder: applies sign options and issues the
//! certificate.

use ca_pki::{Certificate, CertificateAuthority, CertificateRequest, CertificateTemplate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::duration::Duration;
use crate::error::{Result, ValidationError};
use crate::sign_options::{CertificateValidator, SignOption};

/// Validity requested by the client, applied before duration options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequestOptions {
    /// Requested start; defaults to now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<DateTime<Utc>>,
    /// Requested end; defaults to start plus the duration option.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<DateTime<Utc>>,
}

/// Issues certificates under a CA, enforcing the sign options an
/// authorization returned.
#[derive(Debug)]
pub struct Authority {
    ca: CertificateAuthority,
}

impl Authority {
    /// Wraps a signing CA.
    #[must_use]
    pub const fn new(ca: CertificateAuthority) -> Self {
        Self { ca }
    }

    /// The signing CA.
    #[must_use]
    pub const fn ca(&self) -> &CertificateAuthority {
        &self.ca
    }

    /// Builds, checks and signs a certificate for `request`.
    ///
    /// Steps, in order:
    ///
    /// 1. request validators run against the request
    /// 2. a template is built from the request
    /// 3. duration, limit-duration and extension options are applied
    /// 4. validity is resolved: `not_before` is the requested start or now;
    ///    `not_after` is the requested end or `not_before` plus the duration,
    ///    capped by any limit
    /// 5. certificate validators run against the template
    /// 6. the template is signed
    ///
    /// # Errors
    ///
    /// Returns the first validator or signing error; nothing is issued.
    pub fn sign(
        &self,
        request: &CertificateRequest,
        options: Vec<SignOption>,
        requested: SignRequestOptions,
    ) -> Result<Certificate> {
        for option in &options {
            if let SignOption::Request(validator) = option {
                validator.validate(request)?;
            }
        }

        let not_before = requested.not_before.unwrap_or_else(Utc::now);
        let mut template = CertificateTemplate::from_request(request, not_before, not_before);
        let mut duration = Duration::ZERO;
        let mut limit = None;
        let mut validators: Vec<CertificateValidator> = Vec::new();

        for option in options {
            match option {
                SignOption::DefaultDuration(d) => duration = d,
                SignOption::LimitDuration { duration: d, not_after } => {
                    duration = d;
                    limit = Some(not_after);
                }
                SignOption::ProvisionerExtension(extension) => {
                    template.extensions.push(extension.to_extension());
                }
                SignOption::Request(_) => {}
                SignOption::Certificate(validator) => validators.push(validator),
            }
        }

        template.not_after = resolve_not_after(not_before, duration, requested.not_after, limit)?;

        for validator in &validators {
            validator.validate(&template)?;
        }

        let certificate = self.ca.sign(&template)?;
        info!(
            serial = certificate.serial(),
            subject = certificate.subject(),
            not_after = %certificate.not_after(),
            "certificate issued"
        );
        Ok(certificate)
    }
}

fn resolve_not_after(
    not_before: DateTime<Utc>,
    duration: Duration,
    requested: Option<DateTime<Utc>>,
    limit: Option<DateTime<Utc>>,
) -> std::result::Result<DateTime<Utc>, ValidationError> {
    if let Some(limit) = limit {
        if not_before > limit {
            return Err(ValidationError::NotBeforeAfterLimit {
                not_before: not_before.to_string(),
                limit: limit.to_string(),
            });
        }
    }

    let not_after = match requested {
        Some(not_after) => {
            if let Some(limit) = limit.filter(|limit| not_after > *limit) {
                return Err(ValidationError::NotAfterAfterLimit {
                    not_after: not_after.to_string(),
                    limit: limit.to_string(),
                });
            }
            not_after
        }
        None => {
            let computed = not_before
                .checked_add_signed(duration.to_chrono())
                .ok_or_else(|| ValidationError::DurationOutOfRange {
                    requested: duration.to_string(),
                })?;
            match limit {
                Some(limit) if computed > limit => {
                    debug!(%limit, "capping certificate lifetime");
                    limit
                }
                _ => computed,
            }
        }
    };
    Ok(not_after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::extension::{ProvisionerExtension, PROVISIONER_EXTENSION_OID};
    use crate::provisioner::ProvisionerType;
    use crate::sign_options::{RequestValidator, ValidityValidator};
    use ca_pki::{KeyAlgorithm, SubjectPublicKey};
    use chrono::Duration as ChronoDuration;

    fn authority() -> Authority {
        Authority::new(CertificateAuthority::new("Authority Test CA").unwrap())
    }

    fn request(cn: &str) -> CertificateRequest {
        let key = rcgen::KeyPair::generate().unwrap();
        CertificateRequest::builder(SubjectPublicKey::from_key_pair(&key))
            .common_name(cn)
            .dns(cn)
            .build()
    }

    fn acme_options() -> Vec<SignOption> {
        vec![
            SignOption::DefaultDuration(Duration::from_hours(24)),
            SignOption::ProvisionerExtension(ProvisionerExtension::new(ProvisionerType::Acme, "acme", "")),
            SignOption::Certificate(CertificateValidator::Validity(ValidityValidator::new(
                Duration::from_mins(5),
                Duration::from_hours(24),
            ))),
            SignOption::Certificate(CertificateValidator::DefaultPublicKey),
        ]
    }

    #[test]
    fn signs_with_default_duration_and_extension() {
        let cert = authority()
            .sign(&request("leaf.example.com"), acme_options(), SignRequestOptions::default())
            .unwrap();
        assert_eq!(cert.subject(), "leaf.example.com");
        assert_eq!(cert.not_after() - cert.not_before(), ChronoDuration::hours(24));

        let ext = cert.extension(PROVISIONER_EXTENSION_OID).unwrap();
        assert!(!ext.critical);
        let decoded = ProvisionerExtension::from_der(&ext.value).unwrap();
        assert_eq!(decoded.name, "acme");
        // the provisioner extension comes after the standard extensions
        assert_eq!(cert.extensions().last(), Some(ext));
    }

    #[test]
    fn requested_validity_is_checked() {
        let now = Utc::now();
        let requested = SignRequestOptions {
            not_before: Some(now),
            not_after: Some(now + ChronoDuration::hours(48)),
        };
        let err = authority()
            .sign(&request("leaf"), acme_options(), requested)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::DurationTooLong { .. })
        ));
    }

    #[test]
    fn request_validators_run_first() {
        let mut options = vec![SignOption::Request(RequestValidator::CommonName("other".into()))];
        options.extend(acme_options());
        let err = authority()
            .sign(&request("leaf"), options, SignRequestOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::CommonNameMismatch { .. })
        ));
    }

    #[test]
    fn public_key_policy_fails_closed() {
        let weak = CertificateRequest::builder(SubjectPublicKey::new(
            KeyAlgorithm::Rsa { bits: 1024 },
            vec![0; 128],
        ))
        .common_name("leaf")
        .build();
        let err = authority()
            .sign(&weak, acme_options(), SignRequestOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::PublicKey { .. })
        ));
    }

    #[test]
    fn p521_key_passes_policy_but_is_not_signed() {
        let request = CertificateRequest::builder(SubjectPublicKey::new(
            KeyAlgorithm::EcdsaP521,
            vec![4; 133],
        ))
        .common_name("leaf")
        .build();
        let err = authority()
            .sign(&request, acme_options(), SignRequestOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Pki(ca_pki::Error::UnsupportedKey(_))));
    }

    #[test]
    fn missing_duration_option_is_rejected_by_validity() {
        // without a duration NotAfter collapses onto NotBefore
        let options: Vec<SignOption> = acme_options().into_iter().skip(1).collect();
        let past = SignRequestOptions {
            not_before: Some(Utc::now() - ChronoDuration::minutes(1)),
            not_after: None,
        };
        let err = authority()
            .sign(&request("leaf"), options, past)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::NotAfterInPast { .. })
        ));

        let options: Vec<SignOption> = acme_options().into_iter().skip(1).collect();
        let future = SignRequestOptions {
            not_before: Some(Utc::now() + ChronoDuration::hours(1)),
            not_after: None,
        };
        let err = authority()
            .sign(&request("leaf"), options, future)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::DurationTooShort { .. })
        ));
    }

    #[test]
    fn limit_duration_caps_default() {
        let now = Utc::now();
        let limit = now + ChronoDuration::hours(2);
        let capped = resolve_not_after(now, Duration::from_hours(24), None, Some(limit)).unwrap();
        assert_eq!(capped, limit);

        let uncapped = resolve_not_after(now, Duration::from_hours(1), None, Some(limit)).unwrap();
        assert_eq!(uncapped, now + ChronoDuration::hours(1));
    }

    #[test]
    fn limit_duration_rejects_requests_past_limit() {
        let now = Utc::now();
        let limit = now + ChronoDuration::hours(2);
        assert!(matches!(
            resolve_not_after(now, Duration::from_hours(1), Some(now + ChronoDuration::hours(3)), Some(limit)),
            Err(ValidationError::NotAfterAfterLimit { .. })
        ));
        assert!(matches!(
            resolve_not_after(now + ChronoDuration::hours(3), Duration::from_hours(1), None, Some(limit)),
            Err(ValidationError::NotBeforeAfterLimit { .. })
        ));
    }

    #[test]
    fn oversized_duration_is_rejected() {
        let err = resolve_not_after(
            Utc::now(),
            Duration::new(std::time::Duration::from_secs(u64::MAX)),
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::DurationOutOfRange { .. }));
    }
}

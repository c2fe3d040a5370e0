//! Sign options: the ordered effects an authorization hands to the signer.
//!
//! A provisioner returns a `Vec<SignOption>` in this order:
//!
//! 1. request validators
//! 2. the duration option (`DefaultDuration` or `LimitDuration`)
//! 3. the provisioner extension
//! 4. the validity validator
//! 5. the default public-key validator, always last
//!
//! Consumers apply the template-modifying options (2, 3) before evaluating
//! certificate validators, which inspect the fields those options set.

use std::collections::HashSet;
use std::net::IpAddr;

use ca_pki::{CertificateRequest, CertificateTemplate, KeyAlgorithm};
use chrono::{DateTime, Utc};

use crate::duration::Duration;
use crate::error::ValidationError;
use crate::extension::ProvisionerExtension;

/// Minimum accepted RSA modulus size.
pub const MIN_RSA_KEY_BITS: usize = 2048;

/// One unit of effect applied during issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOption {
    /// Lifetime used when the request does not ask for one.
    DefaultDuration(Duration),
    /// Like `DefaultDuration`, but the certificate may not outlive
    /// `not_after`.
    LimitDuration {
        /// Requested default lifetime.
        duration: Duration,
        /// Upper bound for the certificate `NotAfter`.
        not_after: DateTime<Utc>,
    },
    /// Appends the provisioner identity extension to the certificate.
    ProvisionerExtension(ProvisionerExtension),
    /// Checks the certificate request before the template is built.
    Request(RequestValidator),
    /// Checks the template right before it is signed.
    Certificate(CertificateValidator),
}

/// Constraints on a certificate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestValidator {
    /// The common name must equal this value.
    CommonName(String),
    /// The DNS names must equal this set.
    DnsNames(Vec<String>),
    /// The IP addresses must equal this set.
    IpAddresses(Vec<IpAddr>),
    /// The only SAN must be this email address.
    EmailOnlyIdentity(String),
}

impl RequestValidator {
    /// Checks `request` against the constraint.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] describing the first violation.
    pub fn validate(&self, request: &CertificateRequest) -> Result<(), ValidationError> {
        match self {
            Self::CommonName(want) => validate_common_name(want, request),
            Self::DnsNames(want) => validate_dns_names(want, request),
            Self::IpAddresses(want) => validate_ip_addresses(want, request),
            Self::EmailOnlyIdentity(want) => validate_email_only(want, request),
        }
    }
}

fn validate_common_name(want: &str, request: &CertificateRequest) -> Result<(), ValidationError> {
    if request.common_name.is_empty() {
        return Err(ValidationError::EmptyCommonName);
    }
    if request.common_name != want {
        return Err(ValidationError::CommonNameMismatch {
            got: request.common_name.clone(),
            want: want.to_string(),
        });
    }
    Ok(())
}

fn validate_dns_names(want: &[String], request: &CertificateRequest) -> Result<(), ValidationError> {
    let got: Vec<&str> = request.dns_names().collect();
    let got_set: HashSet<&str> = got.iter().copied().collect();
    let want_set: HashSet<&str> = want.iter().map(String::as_str).collect();
    if got_set != want_set {
        return Err(ValidationError::DnsNamesMismatch {
            got: got.into_iter().map(str::to_string).collect(),
            want: want.to_vec(),
        });
    }
    Ok(())
}

fn validate_ip_addresses(want: &[IpAddr], request: &CertificateRequest) -> Result<(), ValidationError> {
    let got: Vec<IpAddr> = request.ip_addresses().collect();
    let got_set: HashSet<&IpAddr> = got.iter().collect();
    let want_set: HashSet<&IpAddr> = want.iter().collect();
    if got_set != want_set {
        return Err(ValidationError::IpAddressesMismatch {
            got: got.iter().map(IpAddr::to_string).collect(),
            want: want.iter().map(IpAddr::to_string).collect(),
        });
    }
    Ok(())
}

fn validate_email_only(want: &str, request: &CertificateRequest) -> Result<(), ValidationError> {
    if request.dns_names().next().is_some() {
        return Err(ValidationError::UnexpectedDnsNames);
    }
    if request.ip_addresses().next().is_some() {
        return Err(ValidationError::UnexpectedIpAddresses);
    }
    if request.uris().next().is_some() {
        return Err(ValidationError::UnexpectedUris);
    }
    let emails: Vec<&str> = request.email_addresses().collect();
    match emails.as_slice() {
        [] => Err(ValidationError::MissingEmail),
        [got] if *got == want => Ok(()),
        [got] => Err(ValidationError::EmailMismatch {
            got: (*got).to_string(),
            want: want.to_string(),
        }),
        _ => Err(ValidationError::TooManyEmails),
    }
}

/// Constraints on the certificate about to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateValidator {
    /// The lifetime must lie within bounds.
    Validity(ValidityValidator),
    /// The subject key must meet the default key policy.
    DefaultPublicKey,
}

impl CertificateValidator {
    /// Checks `template` against the constraint at the current time.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationError`] describing the violation.
    pub fn validate(&self, template: &CertificateTemplate) -> Result<(), ValidationError> {
        match self {
            Self::Validity(validity) => validity.validate(template),
            Self::DefaultPublicKey => validate_public_key(template.public_key.algorithm()),
        }
    }
}

/// Bounds on a certificate's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityValidator {
    /// Shortest accepted lifetime.
    pub min: Duration,
    /// Longest accepted lifetime.
    pub max: Duration,
}

impl ValidityValidator {
    /// Creates a validator for `[min, max]`.
    #[must_use]
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Checks `template` against the bounds at the current time.
    ///
    /// # Errors
    ///
    /// See [`ValidityValidator::validate_at`].
    pub fn validate(&self, template: &CertificateTemplate) -> Result<(), ValidationError> {
        self.validate_at(template, Utc::now())
    }

    /// Checks `template` against the bounds as of `now`.
    ///
    /// Checks run in order: expired, inverted window, too short, too long.
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn validate_at(
        &self,
        template: &CertificateTemplate,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        let (nb, na) = (template.not_before, template.not_after);

        if na < now {
            return Err(ValidationError::NotAfterInPast {
                not_after: na.to_string(),
            });
        }
        if na < nb {
            return Err(ValidationError::InvertedValidity {
                not_after: na.to_string(),
                not_before: nb.to_string(),
            });
        }
        let requested = Duration::from_chrono(na - nb);
        if requested < self.min {
            return Err(ValidationError::DurationTooShort {
                requested: requested.to_string(),
                min: self.min.to_string(),
            });
        }
        if requested > self.max {
            return Err(ValidationError::DurationTooLong {
                requested: requested.to_string(),
                max: self.max.to_string(),
            });
        }
        Ok(())
    }
}

/// RSA keys need at least [`MIN_RSA_KEY_BITS`]; NIST ECDSA curves and
/// Ed25519 are accepted; anything else is unrecognized.
fn validate_public_key(algorithm: &KeyAlgorithm) -> Result<(), ValidationError> {
    match algorithm {
        KeyAlgorithm::Rsa { bits } if *bits < MIN_RSA_KEY_BITS => Err(ValidationError::PublicKey {
            reason: format!("rsa key in CSR must be at least {MIN_RSA_KEY_BITS} bits ({bits})"),
        }),
        KeyAlgorithm::Rsa { .. }
        | KeyAlgorithm::EcdsaP256
        | KeyAlgorithm::EcdsaP384
        | KeyAlgorithm::EcdsaP521
        | KeyAlgorithm::Ed25519 => Ok(()),
        KeyAlgorithm::Unknown(oid) => Err(ValidationError::PublicKey {
            reason: format!("unrecognized public key of type '{oid}' in CSR"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_pki::SubjectPublicKey;
    use chrono::Duration as ChronoDuration;
    use test_case::test_case;

    fn key() -> SubjectPublicKey {
        SubjectPublicKey::new(KeyAlgorithm::EcdsaP256, vec![4; 65])
    }

    fn request_with_dns(names: &[&str]) -> CertificateRequest {
        names
            .iter()
            .fold(CertificateRequest::builder(key()).common_name("cn"), |b, n| b.dns(*n))
            .build()
    }

    fn template(nb: DateTime<Utc>, na: DateTime<Utc>) -> CertificateTemplate {
        let req = CertificateRequest::builder(key()).common_name("cn").build();
        CertificateTemplate::from_request(&req, nb, na)
    }

    #[test]
    fn common_name_validator() {
        let v = RequestValidator::CommonName("foo.com".into());
        let ok = CertificateRequest::builder(key()).common_name("foo.com").build();
        assert_eq!(v.validate(&ok), Ok(()));

        let empty = CertificateRequest::builder(key()).build();
        assert_eq!(v.validate(&empty), Err(ValidationError::EmptyCommonName));

        let wrong = CertificateRequest::builder(key()).common_name("bar.com").build();
        assert_eq!(
            v.validate(&wrong).unwrap_err().to_string(),
            "certificate request does not contain the valid common name, got bar.com, want foo.com"
        );
    }

    #[test_case(&["b.com", "a.com"], true ; "order independent")]
    #[test_case(&["a.com", "b.com", "a.com"], true ; "duplicates collapse")]
    #[test_case(&["a.com"], false ; "missing entry")]
    #[test_case(&["a.com", "c.com"], false ; "different entry")]
    #[test_case(&["a.com", "b.com", "c.com"], false ; "extra entry")]
    #[test_case(&[], false ; "no names")]
    fn dns_names_validator(names: &[&str], accepted: bool) {
        let v = RequestValidator::DnsNames(vec!["a.com".into(), "b.com".into()]);
        assert_eq!(v.validate(&request_with_dns(names)).is_ok(), accepted);
    }

    #[test]
    fn dns_names_error_carries_both_lists() {
        let v = RequestValidator::DnsNames(vec!["a.com".into(), "b.com".into()]);
        let err = v.validate(&request_with_dns(&["a.com"])).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DnsNamesMismatch {
                got: vec!["a.com".into()],
                want: vec!["a.com".into(), "b.com".into()],
            }
        );
    }

    #[test]
    fn ip_addresses_validator() {
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "::1".parse().unwrap();
        let v = RequestValidator::IpAddresses(vec![a, b]);

        let ok = CertificateRequest::builder(key()).ip(b).ip(a).build();
        assert!(v.validate(&ok).is_ok());

        let partial = CertificateRequest::builder(key()).ip(a).build();
        let err = v.validate(&partial).unwrap_err();
        assert_eq!(
            err.to_string(),
            "IP Addresses claim failed - got [10.0.0.1], want [10.0.0.1 ::1]"
        );

        assert!(RequestValidator::IpAddresses(vec![])
            .validate(&CertificateRequest::builder(key()).build())
            .is_ok());
    }

    #[test]
    fn email_only_identity_accepts_exact_email() {
        let v = RequestValidator::EmailOnlyIdentity("name@smallstep.com".into());
        let req = CertificateRequest::builder(key()).email("name@smallstep.com").build();
        assert!(v.validate(&req).is_ok());
    }

    #[test_case(CertificateRequest::builder(key()).dns("foo.com").email("a@b.com").build(), ValidationError::UnexpectedDnsNames ; "dns names")]
    #[test_case(CertificateRequest::builder(key()).ip("1.1.1.1".parse().unwrap()).build(), ValidationError::UnexpectedIpAddresses ; "ip addresses")]
    #[test_case(CertificateRequest::builder(key()).uri("https://foo.com").build(), ValidationError::UnexpectedUris ; "uris")]
    #[test_case(CertificateRequest::builder(key()).build(), ValidationError::MissingEmail ; "no email")]
    #[test_case(CertificateRequest::builder(key()).email("a@b.com").email("c@d.com").build(), ValidationError::TooManyEmails ; "two emails")]
    #[test_case(
        CertificateRequest::builder(key()).email("other@b.com").build(),
        ValidationError::EmailMismatch { got: "other@b.com".into(), want: "a@b.com".into() } ;
        "wrong email"
    )]
    fn email_only_identity_rejects(req: CertificateRequest, expected: ValidationError) {
        let v = RequestValidator::EmailOnlyIdentity("a@b.com".into());
        assert_eq!(v.validate(&req), Err(expected));
    }

    #[test]
    fn email_only_identity_messages_differ() {
        assert_ne!(
            ValidationError::MissingEmail.to_string(),
            ValidationError::TooManyEmails.to_string()
        );
    }

    #[test]
    fn validity_validator_checks_in_order() {
        let v = ValidityValidator::new(Duration::from_mins(5), Duration::from_hours(24));
        let now = Utc::now();

        let expired = template(now - ChronoDuration::hours(2), now - ChronoDuration::hours(1));
        assert!(matches!(
            v.validate_at(&expired, now),
            Err(ValidationError::NotAfterInPast { .. })
        ));

        let inverted = template(now + ChronoDuration::hours(2), now + ChronoDuration::hours(1));
        assert!(matches!(
            v.validate_at(&inverted, now),
            Err(ValidationError::InvertedValidity { .. })
        ));

        let short = template(now, now + ChronoDuration::minutes(1));
        assert_eq!(
            v.validate_at(&short, now).unwrap_err().to_string(),
            "requested duration of 1m is less than the authorized minimum certificate duration of 5m"
        );

        let long = template(now, now + ChronoDuration::hours(48));
        assert_eq!(
            v.validate_at(&long, now).unwrap_err().to_string(),
            "requested duration of 48h is more than the authorized maximum certificate duration of 24h"
        );

        let ok = template(now, now + ChronoDuration::hours(1));
        assert_eq!(v.validate_at(&ok, now), Ok(()));
    }

    #[test]
    fn validity_bounds_are_inclusive() {
        let v = ValidityValidator::new(Duration::from_mins(5), Duration::from_hours(24));
        let now = Utc::now();
        assert!(v.validate_at(&template(now, now + ChronoDuration::minutes(5)), now).is_ok());
        assert!(v.validate_at(&template(now, now + ChronoDuration::hours(24)), now).is_ok());
    }

    #[test_case(KeyAlgorithm::EcdsaP256, true ; "p256")]
    #[test_case(KeyAlgorithm::EcdsaP384, true ; "p384")]
    #[test_case(KeyAlgorithm::EcdsaP521, true ; "p521")]
    #[test_case(KeyAlgorithm::Ed25519, true ; "ed25519")]
    #[test_case(KeyAlgorithm::Rsa { bits: 2048 }, true ; "rsa 2048")]
    #[test_case(KeyAlgorithm::Rsa { bits: 4096 }, true ; "rsa 4096")]
    #[test_case(KeyAlgorithm::Rsa { bits: 1024 }, false ; "rsa 1024")]
    #[test_case(KeyAlgorithm::Unknown("1.2.3".into()), false ; "unknown")]
    fn default_public_key_policy(algorithm: KeyAlgorithm, accepted: bool) {
        let now = Utc::now();
        let mut t = template(now, now + ChronoDuration::hours(1));
        t.public_key = SubjectPublicKey::new(algorithm, vec![0; 32]);
        assert_eq!(CertificateValidator::DefaultPublicKey.validate(&t).is_ok(), accepted);
    }
}

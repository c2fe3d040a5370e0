//! Certificate Authority implementation.

use chrono::{DateTime, Duration, Utc};
use rcgen::{
    BasicConstraints, CertificateParams, CustomExtension, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, Ia5String, IsCa, KeyPair, KeyUsagePurpose, PublicKeyData, SanType,
    SerialNumber, SignatureAlgorithm,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{
    Certificate, CertificateTemplate, KeyAlgorithm, KeyUsage, SubjectAltName, SubjectPublicKey,
};

/// Certificate Authority that signs certificate templates.
pub struct CertificateAuthority {
    /// Root certificate.
    root_cert: Certificate,
    /// rcgen key pair for signing.
    key_pair: KeyPair,
}

impl CertificateAuthority {
    /// Creates a new Certificate Authority with a self-signed root certificate.
    ///
    /// # Arguments
    ///
    /// * `name` - The common name for the CA certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if certificate generation fails.
    pub fn new(name: &str) -> Result<Self> {
        info!("Creating new Certificate Authority: {}", name);

        let key_pair = KeyPair::generate()
            .map_err(|e| Error::Generation(format!("failed to generate key pair: {e}")))?;

        let params = root_params(name)?;
        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| Error::Generation(format!("failed to generate root certificate: {e}")))?;

        let root_cert = Certificate::from_der(cert.der())?;

        debug!("CA root certificate created successfully");

        Ok(Self {
            root_cert,
            key_pair,
        })
    }

    /// Returns a reference to the root certificate.
    #[must_use]
    pub const fn root_certificate(&self) -> &Certificate {
        &self.root_cert
    }

    /// Signs a template and returns the issued certificate.
    ///
    /// The template is taken as final: validity, SANs and extra extensions
    /// are encoded exactly as given, extra extensions after the standard ones
    /// and in template order.
    ///
    /// # Arguments
    ///
    /// * `template` - The leaf template, after sign options have been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the subject key algorithm cannot be signed for,
    /// a SAN is not IA5-encodable, or signing fails.
    pub fn sign(&self, template: &CertificateTemplate) -> Result<Certificate> {
        info!("Signing certificate for: {}", template.subject);

        let subject_key = SubjectKey::new(&template.public_key)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = DistinguishedName::new();
        if !template.subject.is_empty() {
            params
                .distinguished_name
                .push(DnType::CommonName, &template.subject);
        }
        params.is_ca = IsCa::NoCa;
        params.serial_number = Some(random_serial());

        params.extended_key_usages = template
            .key_usage
            .iter()
            .map(|usage| match usage {
                KeyUsage::ServerAuth => ExtendedKeyUsagePurpose::ServerAuth,
                KeyUsage::ClientAuth => ExtendedKeyUsagePurpose::ClientAuth,
                KeyUsage::CodeSigning => ExtendedKeyUsagePurpose::CodeSigning,
            })
            .collect();

        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];

        params.not_before = to_rcgen_time(template.not_before)?;
        params.not_after = to_rcgen_time(template.not_after)?;

        params.subject_alt_names = convert_sans(&template.san)?;

        params.custom_extensions = template
            .extensions
            .iter()
            .map(|ext| {
                let mut custom = CustomExtension::from_oid_content(&ext.oid, ext.value.clone());
                custom.set_criticality(ext.critical);
                custom
            })
            .collect();

        let issuer_cert = self.create_issuer_cert()?;

        let cert = params
            .signed_by(&subject_key, &issuer_cert, &self.key_pair)
            .map_err(|e| Error::Signing(format!("failed to sign certificate: {e}")))?;

        let certificate = Certificate::from_der(cert.der())?;

        debug!(
            serial = certificate.serial(),
            "Certificate signed successfully for: {}", template.subject
        );

        Ok(certificate)
    }

    /// Creates an issuer certificate for signing.
    fn create_issuer_cert(&self) -> Result<rcgen::Certificate> {
        root_params(self.root_cert.subject())?
            .self_signed(&self.key_pair)
            .map_err(|e| Error::Generation(format!("failed to create issuer cert: {e}")))
    }
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("root_cert", &self.root_cert)
            .field("key_pair", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Parameters shared by the self-signed root and the issuer handle.
fn root_params(name: &str) -> Result<CertificateParams> {
    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params.distinguished_name.push(DnType::CommonName, name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];

    // 10 years, backdated for clock skew
    let now = Utc::now();
    params.not_before = to_rcgen_time(now - Duration::hours(1))?;
    params.not_after = to_rcgen_time(now + Duration::days(3650))?;
    Ok(params)
}

/// The requester's public key in the form rcgen signs for.
struct SubjectKey<'a> {
    raw: &'a [u8],
    algorithm: &'static SignatureAlgorithm,
}

impl<'a> SubjectKey<'a> {
    /// P-521 subject keys are refused: the ring backend has no P-521
    /// algorithm identifier to encode them with.
    fn new(key: &'a SubjectPublicKey) -> Result<Self> {
        let algorithm = match key.algorithm() {
            KeyAlgorithm::EcdsaP256 => &rcgen::PKCS_ECDSA_P256_SHA256,
            KeyAlgorithm::EcdsaP384 => &rcgen::PKCS_ECDSA_P384_SHA384,
            KeyAlgorithm::Ed25519 => &rcgen::PKCS_ED25519,
            KeyAlgorithm::Rsa { .. } => &rcgen::PKCS_RSA_SHA256,
            other @ (KeyAlgorithm::EcdsaP521 | KeyAlgorithm::Unknown(_)) => {
                return Err(Error::UnsupportedKey(other.to_string()));
            }
        };
        Ok(Self {
            raw: key.raw(),
            algorithm,
        })
    }
}

impl PublicKeyData for SubjectKey<'_> {
    fn der_bytes(&self) -> &[u8] {
        self.raw
    }

    fn algorithm(&self) -> &'static SignatureAlgorithm {
        self.algorithm
    }
}

/// A random positive 128-bit serial number.
fn random_serial() -> SerialNumber {
    let mut bytes = *Uuid::new_v4().as_bytes();
    bytes[0] &= 0x7f;
    SerialNumber::from_slice(&bytes)
}

/// Converts `SubjectAltNames` to rcgen `SanTypes`.
fn convert_sans(sans: &[SubjectAltName]) -> Result<Vec<SanType>> {
    sans.iter()
        .map(|san| match san {
            SubjectAltName::Dns(dns) => {
                let ia5 = Ia5String::try_from(dns.clone())
                    .map_err(|e| Error::San(format!("invalid DNS name '{dns}': {e}")))?;
                Ok(SanType::DnsName(ia5))
            }
            SubjectAltName::Ip(ip) => Ok(SanType::IpAddress(*ip)),
            SubjectAltName::Email(email) => {
                let ia5 = Ia5String::try_from(email.clone())
                    .map_err(|e| Error::San(format!("invalid email '{email}': {e}")))?;
                Ok(SanType::Rfc822Name(ia5))
            }
            SubjectAltName::Uri(uri) => {
                let ia5 = Ia5String::try_from(uri.clone())
                    .map_err(|e| Error::San(format!("invalid URI '{uri}': {e}")))?;
                Ok(SanType::URI(ia5))
            }
        })
        .collect()
}

/// Converts a chrono `DateTime` to rcgen `OffsetDateTime`.
fn to_rcgen_time(dt: DateTime<Utc>) -> Result<time::OffsetDateTime> {
    time::OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| Error::Generation(format!("invalid timestamp: {e}")))
}

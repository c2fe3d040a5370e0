//! Core PKI types for certificate requests, templates and issued certificates.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::oid_registry::asn1_rs::oid;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;
use x509_parser::x509::{SubjectPublicKeyInfo, X509Name};

use crate::error::{Error, Result};

/// Key usage purposes for certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyUsage {
    /// TLS server authentication.
    ServerAuth,
    /// TLS client authentication.
    ClientAuth,
    /// Code signing.
    CodeSigning,
}

impl KeyUsage {
    /// Returns the OID string for this key usage.
    #[must_use]
    pub const fn oid(&self) -> &'static str {
        match self {
            Self::ServerAuth => "1.3.6.1.5.5.7.3.1",
            Self::ClientAuth => "1.3.6.1.5.5.7.3.2",
            Self::CodeSigning => "1.3.6.1.5.5.7.3.3",
        }
    }
}

/// Subject Alternative Name types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectAltName {
    /// DNS name.
    Dns(String),
    /// IP address.
    Ip(IpAddr),
    /// Email address.
    Email(String),
    /// URI.
    Uri(String),
}

impl SubjectAltName {
    /// Classifies a free-form SAN string the way token claims carry them:
    /// IP literals become [`SubjectAltName::Ip`], strings with an `@` become
    /// emails, strings with a scheme become URIs, everything else is a DNS name.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if let Ok(ip) = value.parse::<IpAddr>() {
            Self::Ip(ip)
        } else if value.contains("://") {
            Self::Uri(value.to_string())
        } else if value.contains('@') {
            Self::Email(value.to_string())
        } else {
            Self::Dns(value.to_string())
        }
    }
}

impl fmt::Display for SubjectAltName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dns(v) | Self::Email(v) | Self::Uri(v) => write!(f, "{v}"),
            Self::Ip(ip) => write!(f, "{ip}"),
        }
    }
}

/// Algorithm and strength of a subject public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// ECDSA on NIST P-256.
    EcdsaP256,
    /// ECDSA on NIST P-384.
    EcdsaP384,
    /// ECDSA on NIST P-521.
    EcdsaP521,
    /// Ed25519.
    Ed25519,
    /// RSA with the modulus size in bits.
    Rsa {
        /// Modulus size in bits.
        bits: usize,
    },
    /// Any other algorithm, identified by its OID.
    Unknown(String),
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EcdsaP256 => write!(f, "ecdsa P-256"),
            Self::EcdsaP384 => write!(f, "ecdsa P-384"),
            Self::EcdsaP521 => write!(f, "ecdsa P-521"),
            Self::Ed25519 => write!(f, "ed25519"),
            Self::Rsa { bits } => write!(f, "rsa {bits}"),
            Self::Unknown(oid) => write!(f, "unknown ({oid})"),
        }
    }
}

/// A subject public key: its algorithm plus the raw key bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectPublicKey {
    algorithm: KeyAlgorithm,
    raw: Vec<u8>,
}

impl SubjectPublicKey {
    /// Creates a public key from its algorithm and raw key bits.
    #[must_use]
    pub const fn new(algorithm: KeyAlgorithm, raw: Vec<u8>) -> Self {
        Self { algorithm, raw }
    }

    /// Returns the public half of an rcgen key pair.
    #[must_use]
    pub fn from_key_pair(key_pair: &rcgen::KeyPair) -> Self {
        let alg = key_pair.algorithm();
        let algorithm = if alg == &rcgen::PKCS_ECDSA_P256_SHA256 {
            KeyAlgorithm::EcdsaP256
        } else if alg == &rcgen::PKCS_ECDSA_P384_SHA384 {
            KeyAlgorithm::EcdsaP384
        } else if alg == &rcgen::PKCS_ED25519 {
            KeyAlgorithm::Ed25519
        } else {
            KeyAlgorithm::Unknown(format!("{alg:?}"))
        };
        Self::new(algorithm, key_pair.public_key_raw().to_vec())
    }

    /// Extracts the key from a parsed `SubjectPublicKeyInfo`.
    fn from_spki(spki: &SubjectPublicKeyInfo<'_>) -> Self {
        Self {
            algorithm: key_algorithm(spki),
            raw: spki.subject_public_key.data.to_vec(),
        }
    }

    /// Returns the key algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> &KeyAlgorithm {
        &self.algorithm
    }

    /// Returns the raw key bits.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

/// Maps a `SubjectPublicKeyInfo` algorithm identifier to a [`KeyAlgorithm`].
fn key_algorithm(spki: &SubjectPublicKeyInfo<'_>) -> KeyAlgorithm {
    let rsa_oid = oid!(1.2.840 .113549 .1 .1 .1);
    let ec_oid = oid!(1.2.840 .10045 .2 .1);
    let ed25519_oid = oid!(1.3.101 .112);
    let p256_oid = oid!(1.2.840 .10045 .3 .1 .7);
    let p384_oid = oid!(1.3.132 .0 .34);
    let p521_oid = oid!(1.3.132 .0 .35);

    let alg = &spki.algorithm.algorithm;
    if *alg == ed25519_oid {
        return KeyAlgorithm::Ed25519;
    }
    if *alg == rsa_oid {
        return match spki.parsed() {
            Ok(PublicKey::RSA(rsa)) => KeyAlgorithm::Rsa {
                bits: rsa.key_size(),
            },
            _ => KeyAlgorithm::Unknown(alg.to_id_string()),
        };
    }
    if *alg == ec_oid {
        let curve = spki
            .algorithm
            .parameters
            .as_ref()
            .and_then(|params| params.as_oid().ok());
        return match curve {
            Some(c) if c == p256_oid => KeyAlgorithm::EcdsaP256,
            Some(c) if c == p384_oid => KeyAlgorithm::EcdsaP384,
            Some(c) if c == p521_oid => KeyAlgorithm::EcdsaP521,
            Some(c) => KeyAlgorithm::Unknown(c.to_id_string()),
            None => KeyAlgorithm::Unknown(alg.to_id_string()),
        };
    }
    KeyAlgorithm::Unknown(alg.to_id_string())
}

/// A parsed certificate signing request.
///
/// The common name is kept verbatim (possibly empty) so request validators
/// can reject it with a precise message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRequest {
    /// Subject common name, empty when absent.
    pub common_name: String,
    /// Requested subject alternative names, in request order.
    pub san: Vec<SubjectAltName>,
    /// Public key the certificate will be bound to.
    pub public_key: SubjectPublicKey,
}

impl CertificateRequest {
    /// Creates a new certificate request builder.
    #[must_use]
    pub fn builder(public_key: SubjectPublicKey) -> CertificateRequestBuilder {
        CertificateRequestBuilder {
            common_name: String::new(),
            san: Vec::new(),
            public_key,
        }
    }

    /// Parses a DER-encoded PKCS#10 request and verifies its self-signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is malformed or its signature does
    /// not verify against the enclosed public key.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, csr) = X509CertificationRequest::from_der(der)
            .map_err(|e| Error::Parse(format!("failed to parse certificate request: {e}")))?;

        csr.verify_signature().map_err(|e| {
            Error::SignatureVerification(format!("certificate request signature: {e}"))
        })?;

        let info = &csr.certification_request_info;
        let common_name = common_name(&info.subject)?;

        let mut san = Vec::new();
        if let Some(extensions) = csr.requested_extensions() {
            for ext in extensions {
                if let ParsedExtension::SubjectAlternativeName(names) = ext {
                    san.extend(names.general_names.iter().filter_map(general_name_to_san));
                }
            }
        }

        Ok(Self {
            common_name,
            san,
            public_key: SubjectPublicKey::from_spki(&info.subject_pki),
        })
    }

    /// Returns the requested DNS names.
    pub fn dns_names(&self) -> impl Iterator<Item = &str> {
        self.san.iter().filter_map(|san| match san {
            SubjectAltName::Dns(dns) => Some(dns.as_str()),
            _ => None,
        })
    }

    /// Returns the requested IP addresses.
    pub fn ip_addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.san.iter().filter_map(|san| match san {
            SubjectAltName::Ip(ip) => Some(*ip),
            _ => None,
        })
    }

    /// Returns the requested email addresses.
    pub fn email_addresses(&self) -> impl Iterator<Item = &str> {
        self.san.iter().filter_map(|san| match san {
            SubjectAltName::Email(email) => Some(email.as_str()),
            _ => None,
        })
    }

    /// Returns the requested URIs.
    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.san.iter().filter_map(|san| match san {
            SubjectAltName::Uri(uri) => Some(uri.as_str()),
            _ => None,
        })
    }
}

/// Builder for certificate requests that were not received as DER.
#[derive(Debug)]
pub struct CertificateRequestBuilder {
    common_name: String,
    san: Vec<SubjectAltName>,
    public_key: SubjectPublicKey,
}

impl CertificateRequestBuilder {
    /// Sets the subject common name.
    #[must_use]
    pub fn common_name(mut self, cn: impl Into<String>) -> Self {
        self.common_name = cn.into();
        self
    }

    /// Adds a DNS subject alternative name.
    #[must_use]
    pub fn dns(mut self, dns: impl Into<String>) -> Self {
        self.san.push(SubjectAltName::Dns(dns.into()));
        self
    }

    /// Adds an IP subject alternative name.
    #[must_use]
    pub fn ip(mut self, ip: IpAddr) -> Self {
        self.san.push(SubjectAltName::Ip(ip));
        self
    }

    /// Adds an email subject alternative name.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.san.push(SubjectAltName::Email(email.into()));
        self
    }

    /// Adds a URI subject alternative name.
    #[must_use]
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.san.push(SubjectAltName::Uri(uri.into()));
        self
    }

    /// Builds the certificate request.
    #[must_use]
    pub fn build(self) -> CertificateRequest {
        CertificateRequest {
            common_name: self.common_name,
            san: self.san,
            public_key: self.public_key,
        }
    }
}

/// A raw X.509 extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    /// Object identifier arcs.
    pub oid: Vec<u64>,
    /// Criticality flag.
    pub critical: bool,
    /// DER-encoded extension value.
    pub value: Vec<u8>,
}

impl Extension {
    /// Returns the dotted form of the OID.
    #[must_use]
    pub fn oid_string(&self) -> String {
        self.oid
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// The certificate the signer is about to issue.
///
/// Sign options modify it and certificate validators inspect it before the
/// signature is produced.
#[derive(Debug, Clone)]
pub struct CertificateTemplate {
    /// Subject common name.
    pub subject: String,
    /// Subject alternative names.
    pub san: Vec<SubjectAltName>,
    /// Subject public key.
    pub public_key: SubjectPublicKey,
    /// Validity start.
    pub not_before: DateTime<Utc>,
    /// Validity end.
    pub not_after: DateTime<Utc>,
    /// Extended key usages.
    pub key_usage: Vec<KeyUsage>,
    /// Extra extensions, appended in order after the standard ones.
    pub extensions: Vec<Extension>,
}

impl CertificateTemplate {
    /// Creates a leaf template from a request: subject, SANs and key are
    /// copied, validity is `[not_before, not_after]`, and key usage defaults
    /// to server plus client authentication.
    ///
    /// # Arguments
    ///
    /// * `request` - The parsed certificate request.
    /// * `not_before` - Start of the validity window.
    /// * `not_after` - End of the validity window.
    #[must_use]
    pub fn from_request(
        request: &CertificateRequest,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> Self {
        Self {
            subject: request.common_name.clone(),
            san: request.san.clone(),
            public_key: request.public_key.clone(),
            not_before,
            not_after,
            key_usage: vec![KeyUsage::ServerAuth, KeyUsage::ClientAuth],
            extensions: Vec::new(),
        }
    }

    /// Returns the validity window length.
    #[must_use]
    pub fn validity(&self) -> Duration {
        self.not_after - self.not_before
    }
}

/// A DER-encoded X.509 certificate with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    /// DER-encoded certificate bytes.
    der: Vec<u8>,
    /// Serial number, colon separated hex.
    serial: String,
    /// Certificate validity start time.
    not_before: DateTime<Utc>,
    /// Certificate validity end time.
    not_after: DateTime<Utc>,
    /// Subject common name.
    subject: String,
    /// Issuer common name.
    issuer: String,
    /// Subject alternative names.
    san: Vec<SubjectAltName>,
    /// Subject public key.
    public_key: SubjectPublicKey,
    /// All extensions in certificate order.
    extensions: Vec<Extension>,
}

impl Certificate {
    /// Parses a certificate from DER-encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::Parse(format!("failed to parse certificate: {e}")))?;

        let not_before = DateTime::from_timestamp(cert.validity().not_before.timestamp(), 0)
            .ok_or_else(|| Error::Parse("invalid not_before timestamp".into()))?;
        let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| Error::Parse("invalid not_after timestamp".into()))?;

        let subject = common_name(cert.subject())?;
        let issuer = common_name(cert.issuer())?;
        let san = extract_san(&cert);

        let extensions = cert
            .extensions()
            .iter()
            .map(|ext| {
                let oid = ext
                    .oid
                    .iter()
                    .map(|arcs| arcs.collect::<Vec<u64>>())
                    .ok_or_else(|| Error::Parse(format!("oversized OID arc in {}", ext.oid)))?;
                Ok(Extension {
                    oid,
                    critical: ext.critical,
                    value: ext.value.to_vec(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            der: der.to_vec(),
            serial: cert.raw_serial_as_string(),
            not_before,
            not_after,
            subject,
            issuer,
            san,
            public_key: SubjectPublicKey::from_spki(cert.public_key()),
            extensions,
        })
    }

    /// Returns the DER-encoded certificate bytes.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the PEM-encoded certificate.
    #[must_use]
    pub fn pem(&self) -> String {
        use base64::Engine;
        let b64 = base64::engine::general_purpose::STANDARD.encode(&self.der);
        format!(
            "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
            b64.as_bytes()
                .chunks(64)
                .map(|chunk| std::str::from_utf8(chunk).unwrap_or(""))
                .collect::<Vec<_>>()
                .join("\n")
        )
    }

    /// Returns the serial number as colon separated hex.
    #[must_use]
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Returns the certificate validity start time.
    #[must_use]
    pub const fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// Returns the certificate validity end time.
    #[must_use]
    pub const fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Returns the subject common name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the issuer common name.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the subject alternative names.
    #[must_use]
    pub fn san(&self) -> &[SubjectAltName] {
        &self.san
    }

    /// Returns the subject public key.
    #[must_use]
    pub const fn public_key(&self) -> &SubjectPublicKey {
        &self.public_key
    }

    /// Returns every extension in certificate order.
    #[must_use]
    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Returns the first extension with the given OID arcs.
    ///
    /// # Returns
    ///
    /// `None` if the certificate carries no extension with that OID.
    #[must_use]
    pub fn extension(&self, oid: &[u64]) -> Option<&Extension> {
        self.extensions.iter().find(|ext| ext.oid == oid)
    }
}

/// Extracts the common name from an X.509 name; empty when absent.
fn common_name(name: &X509Name<'_>) -> Result<String> {
    match name.iter_common_name().next() {
        Some(attr) => attr
            .as_str()
            .map(String::from)
            .map_err(|e| Error::Parse(format!("failed to parse CN: {e}"))),
        None => Ok(String::new()),
    }
}

/// Extracts SANs from a certificate.
fn extract_san(cert: &X509Certificate<'_>) -> Vec<SubjectAltName> {
    match cert.subject_alternative_name() {
        Ok(Some(san_ext)) => san_ext
            .value
            .general_names
            .iter()
            .filter_map(general_name_to_san)
            .collect(),
        _ => Vec::new(),
    }
}

fn general_name_to_san(name: &GeneralName<'_>) -> Option<SubjectAltName> {
    match name {
        GeneralName::DNSName(dns) => Some(SubjectAltName::Dns((*dns).to_string())),
        GeneralName::IPAddress(ip_bytes) => parse_ip_bytes(ip_bytes).map(SubjectAltName::Ip),
        GeneralName::RFC822Name(email) => Some(SubjectAltName::Email((*email).to_string())),
        GeneralName::URI(uri) => Some(SubjectAltName::Uri((*uri).to_string())),
        _ => None,
    }
}

/// Parses IP address bytes into an `IpAddr`.
fn parse_ip_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(std::net::Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(std::net::Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

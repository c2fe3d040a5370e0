//! The provisioner identity extension.
//!
//! Every issued certificate carries a non-critical extension naming the
//! provisioner that authorized it:
//!
//! ```text
//! ProvisionerExtension ::= SEQUENCE {
//!     type          INTEGER,
//!     name          OCTET STRING,
//!     credentialID  OCTET STRING,
//!     keyValuePairs SEQUENCE OF DirectoryString OPTIONAL
//! }
//! ```
//!
//! `keyValuePairs` is only written when non-empty, so the three-field form is
//! unchanged for provisioners that never set it. Each pair is a
//! `PrintableString` when its characters allow it and a `UTF8String`
//! otherwise; both are accepted when decoding.

use ca_pki::{Certificate, Extension};
use serde::{Deserialize, Serialize};
use yasna::tags::{TAG_PRINTABLESTRING, TAG_UTF8STRING};
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, DERWriter};

use crate::error::{Error, Result};
use crate::provisioner::ProvisionerType;

/// OID arcs of the provisioner extension, `1.3.6.1.4.1.37476.9000.64.1`.
pub const PROVISIONER_EXTENSION_OID: &[u64] = &[1, 3, 6, 1, 4, 1, 37476, 9000, 64, 1];

/// Identity of the provisioner that authorized a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionerExtension {
    /// Provisioner type.
    pub provisioner_type: ProvisionerType,
    /// Provisioner name.
    pub name: String,
    /// Credential the provisioner authenticated with, empty when none.
    pub credential_id: String,
    /// Extra attributes as alternating keys and values.
    pub key_value_pairs: Vec<String>,
}

impl ProvisionerExtension {
    /// Creates an extension without key-value pairs.
    #[must_use]
    pub fn new(
        provisioner_type: ProvisionerType,
        name: impl Into<String>,
        credential_id: impl Into<String>,
    ) -> Self {
        Self {
            provisioner_type,
            name: name.into(),
            credential_id: credential_id.into(),
            key_value_pairs: Vec::new(),
        }
    }

    /// Adds key-value pairs.
    #[must_use]
    pub fn with_key_value_pairs(mut self, pairs: Vec<String>) -> Self {
        self.key_value_pairs = pairs;
        self
    }

    /// DER encoding of the extension value.
    #[must_use]
    pub fn to_der(&self) -> Vec<u8> {
        yasna::construct_der(|writer| {
            writer.write_sequence(|writer| {
                writer.next().write_i64(i64::from(self.provisioner_type.code()));
                writer.next().write_bytes(self.name.as_bytes());
                writer.next().write_bytes(self.credential_id.as_bytes());
                if !self.key_value_pairs.is_empty() {
                    writer.next().write_sequence_of(|writer| {
                        for pair in &self.key_value_pairs {
                            write_directory_string(writer.next(), pair);
                        }
                    });
                }
            });
        })
    }

    /// Decodes an extension value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Extension`] on malformed DER, non UTF-8 strings, or
    /// an unknown type code.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (code, name, credential_id, key_value_pairs) = yasna::parse_der(der, |reader| {
            reader.read_sequence(|reader| {
                let code = reader.next().read_i64()?;
                let name = reader.next().read_bytes()?;
                let credential_id = reader.next().read_bytes()?;
                let pairs = reader.read_optional(|reader| {
                    let mut pairs = Vec::new();
                    reader.read_sequence_of(|reader| {
                        pairs.push(read_directory_string(reader)?);
                        Ok(())
                    })?;
                    Ok(pairs)
                })?;
                Ok((code, name, credential_id, pairs.unwrap_or_default()))
            })
        })
        .map_err(|e| Error::Extension {
            reason: format!("invalid DER: {e}"),
        })?;

        let provisioner_type = u8::try_from(code)
            .ok()
            .and_then(ProvisionerType::from_code)
            .ok_or_else(|| Error::Extension {
                reason: format!("unknown provisioner type {code}"),
            })?;
        let utf8 = |bytes: Vec<u8>| {
            String::from_utf8(bytes).map_err(|e| Error::Extension {
                reason: e.to_string(),
            })
        };

        Ok(Self {
            provisioner_type,
            name: utf8(name)?,
            credential_id: utf8(credential_id)?,
            key_value_pairs,
        })
    }

    /// The certificate extension carrying this value, non-critical.
    #[must_use]
    pub fn to_extension(&self) -> Extension {
        Extension {
            oid: PROVISIONER_EXTENSION_OID.to_vec(),
            critical: false,
            value: self.to_der(),
        }
    }

    /// Finds and decodes the provisioner extension of an issued certificate.
    ///
    /// Returns `Ok(None)` when the certificate has no such extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Extension`] if the extension is present but invalid.
    pub fn from_certificate(cert: &Certificate) -> Result<Option<Self>> {
        cert.extension(PROVISIONER_EXTENSION_OID)
            .map(|ext| Self::from_der(&ext.value))
            .transpose()
    }
}

/// Characters allowed in an ASN.1 `PrintableString`, minus `*` and `&`.
fn is_printable(s: &str) -> bool {
    s.bytes().all(|b| {
        b.is_ascii_alphanumeric()
            || matches!(b, b' ' | b'\'' | b'(' | b')' | b'+' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?')
    })
}

fn write_directory_string(writer: DERWriter<'_>, value: &str) {
    if is_printable(value) {
        writer.write_printable_string(value);
    } else {
        writer.write_utf8_string(value);
    }
}

fn read_directory_string(reader: BERReader<'_, '_>) -> yasna::ASN1Result<String> {
    match reader.lookahead_tag()? {
        TAG_PRINTABLESTRING => reader.read_printable_string(),
        TAG_UTF8STRING => reader.read_utf8string(),
        _ => Err(ASN1Error::new(ASN1ErrorKind::Invalid)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn acme_encoding_is_bit_exact() {
        let ext = ProvisionerExtension::new(ProvisionerType::Acme, "test@acme-provisioner.com", "");
        let mut expected = vec![0x30, 0x20, 0x02, 0x01, 0x06, 0x04, 0x19];
        expected.extend_from_slice(b"test@acme-provisioner.com");
        expected.extend_from_slice(&[0x04, 0x00]);
        assert_eq!(ext.to_der(), expected);
    }

    #[test]
    fn acme_round_trip() {
        let ext = ProvisionerExtension::new(ProvisionerType::Acme, "test@acme-provisioner.com", "");
        let decoded = ProvisionerExtension::from_der(&ext.to_der()).unwrap();
        assert_eq!(decoded, ext);
        assert_eq!(decoded.provisioner_type.code(), 6);
    }

    #[test]
    fn key_value_pairs_round_trip() {
        let ext = ProvisionerExtension::new(ProvisionerType::Aws, "aws", "123456789")
            .with_key_value_pairs(vec!["InstanceID".into(), "i-0abc".into()]);
        let der = ext.to_der();
        assert_eq!(ProvisionerExtension::from_der(&der).unwrap(), ext);
        // trailing SEQUENCE OF follows the credential id
        assert!(der.len() > ProvisionerExtension::new(ProvisionerType::Aws, "aws", "123456789").to_der().len());
    }

    #[test]
    fn printable_pairs_use_printable_string() {
        let ext = ProvisionerExtension::new(ProvisionerType::Aws, "aws", "123")
            .with_key_value_pairs(vec!["InstanceID".into(), "i-0abc".into()]);

        let mut expected = vec![0x30, 0x23, 0x02, 0x01, 0x04, 0x04, 0x03];
        expected.extend_from_slice(b"aws");
        expected.extend_from_slice(&[0x04, 0x03]);
        expected.extend_from_slice(b"123");
        expected.extend_from_slice(&[0x30, 0x14, 0x13, 0x0a]);
        expected.extend_from_slice(b"InstanceID");
        expected.extend_from_slice(&[0x13, 0x06]);
        expected.extend_from_slice(b"i-0abc");
        assert_eq!(ext.to_der(), expected);
    }

    #[test]
    fn non_printable_pairs_use_utf8_string() {
        let ext = ProvisionerExtension::new(ProvisionerType::Gcp, "gcp", "")
            .with_key_value_pairs(vec!["owner".into(), "ops@example.com".into()]);
        let der = ext.to_der();
        // '@' is outside the PrintableString alphabet
        assert!(der.windows(2).any(|w| w == [0x0c, 0x0f]));
        assert_eq!(ProvisionerExtension::from_der(&der).unwrap(), ext);
    }

    #[test]
    fn decodes_utf8_tagged_printable_pairs() {
        let mut der = vec![0x30, 0x14, 0x02, 0x01, 0x04, 0x04, 0x01, b'a', 0x04, 0x00];
        der.extend_from_slice(&[0x30, 0x0a, 0x0c, 0x02]);
        der.extend_from_slice(b"id");
        der.extend_from_slice(&[0x13, 0x04]);
        der.extend_from_slice(b"i-01");
        let ext = ProvisionerExtension::from_der(&der).unwrap();
        assert_eq!(ext.key_value_pairs, vec!["id".to_string(), "i-01".to_string()]);
    }

    #[test]
    fn extension_is_non_critical() {
        let ext = ProvisionerExtension::new(ProvisionerType::Jwk, "admin", "kid-1").to_extension();
        assert!(!ext.critical);
        assert_eq!(ext.oid_string(), "1.3.6.1.4.1.37476.9000.64.1");
    }

    #[test_case(&[] ; "empty input")]
    #[test_case(&[0x30, 0x03, 0x02, 0x01, 0x06] ; "truncated sequence")]
    #[test_case(&[0x30, 0x07, 0x02, 0x01, 0x63, 0x04, 0x00, 0x04, 0x00] ; "unknown type code")]
    #[test_case(&[0x30, 0x08, 0x02, 0x01, 0x01, 0x04, 0x01, 0xff, 0x04, 0x00] ; "name not utf8")]
    #[test_case(&[0x30, 0x0d, 0x02, 0x01, 0x04, 0x04, 0x00, 0x04, 0x00, 0x30, 0x04, 0x16, 0x02, b'i', b'd'] ; "ia5 pair")]
    fn rejects_malformed(der: &[u8]) {
        let err = ProvisionerExtension::from_der(der).unwrap_err();
        assert!(matches!(err, Error::Extension { .. }));
        assert!(err.to_string().starts_with("error marshaling provisioner extension"));
    }
}

//! X.509 building blocks for the provisioner authorization core.
//!
//! This crate holds the certificate-side types that provisioners and sign
//! options operate on, plus a small in-process signer.
//!
//! # Overview
//!
//! - Parsing PKCS#10 certificate requests ([`CertificateRequest`])
//! - The mutable leaf template sign options apply to ([`CertificateTemplate`])
//! - Signing a template with a CA key ([`CertificateAuthority`])
//! - Parsing and validating issued certificates ([`Certificate`])
//!
//! # Example
//!
//! ```
//! use ca_pki::{CertificateAuthority, CertificateRequest, CertificateTemplate, SubjectPublicKey};
//! use chrono::{Duration, Utc};
//!
//! let ca = CertificateAuthority::new("Example Root CA").unwrap();
//!
//! let key = rcgen::KeyPair::generate().unwrap();
//! let request = CertificateRequest::builder(SubjectPublicKey::from_key_pair(&key))
//!     .common_name("node-1.example.internal")
//!     .dns("node-1.example.internal")
//!     .build();
//!
//! let now = Utc::now();
//! let template = CertificateTemplate::from_request(&request, now, now + Duration::hours(24));
//! let cert = ca.sign(&template).unwrap();
//!
//! assert_eq!(cert.subject(), "node-1.example.internal");
//! ```
//!
//! # Modules
//!
//! - [`ca`] - Certificate Authority signer
//! - [`validation`] - Issued certificate validation utilities
//! - [`types`] - Requests, templates, certificates and keys
//! - [`error`] - Error types

#![forbid(unsafe_code)]

pub mod ca;
pub mod error;
pub mod types;
pub mod validation;

// Re-export commonly used types at crate root
pub use ca::CertificateAuthority;
pub use error::{Error, Result};
pub use types::{
    Certificate, CertificateRequest, CertificateRequestBuilder, CertificateTemplate, Extension,
    KeyAlgorithm, KeyUsage, SubjectAltName, SubjectPublicKey,
};
pub use validation::{is_expired, is_not_yet_valid, validate_certificate};

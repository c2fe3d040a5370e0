//! Test helpers for E2E tests.

#![allow(dead_code)]

use ca_pki::{CertificateAuthority, CertificateRequest};
use ca_provisioner::{Audiences, Authority, Claims, Collection, Config};
use serde_json::json;

/// Audience accepted for sign tokens.
pub const SIGN_AUDIENCE: &str = "https://ca.example.com/1.0/sign";
/// Audience accepted for revoke tokens.
pub const REVOKE_AUDIENCE: &str = "https://ca.example.com/1.0/revoke";
/// Issuer of the OIDC provisioner.
pub const OIDC_ISSUER: &str = "https://accounts.example.com";
/// Client ID of the OIDC provisioner.
pub const OIDC_CLIENT_ID: &str = "step-ca-client";

/// Installs a test subscriber honoring `RUST_LOG`; safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// CA-wide configuration used by every test.
pub fn config() -> Config {
    Config {
        claims: Claims::global_defaults(),
        audiences: Audiences {
            sign: vec![SIGN_AUDIENCE.into()],
            revoke: vec![REVOKE_AUDIENCE.into()],
        },
    }
}

/// A test CA wrapped in an authority.
pub fn authority() -> Authority {
    Authority::new(CertificateAuthority::new("E2E Root CA").unwrap())
}

/// PEM of a freshly generated root, for X5C trust.
pub fn x5c_roots() -> String {
    CertificateAuthority::new("E2E X5C Root")
        .unwrap()
        .root_certificate()
        .pem()
}

/// Provisioner configuration covering every variant, plus two entries that
/// fail to initialize.
pub fn provisioners_json() -> String {
    json!([
        {"type": "ACME", "name": "acme"},
        {
            "type": "JWK",
            "name": "admin@example.com",
            "key": {"kid": "jwk-kid", "kty": "EC", "alg": "ES256", "crv": "P-256", "x": "x", "y": "y"},
            "encryptedKey": "eyJhbGciOiJQQkVTMi1IUzI1NitBMTI4S1ciLCJlbmMiOiJBMTI4R0NNIn0"
        },
        {
            "type": "OIDC",
            "name": "google",
            "clientID": OIDC_CLIENT_ID,
            "issuer": OIDC_ISSUER,
            "admins": ["admin@example.com"],
            "domains": ["example.com"]
        },
        {"type": "X5C", "name": "x5c", "roots": x5c_roots()},
        {
            "type": "K8sSA",
            "name": "cluster",
            "publicKeys": "-----BEGIN PUBLIC KEY-----\nMFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAE\n-----END PUBLIC KEY-----\n"
        },
        {"type": "AWS", "name": "aws", "accounts": ["123456789012"], "disableCustomSANs": true},
        {"type": "GCP", "name": "gcp", "projectIDs": ["project-1"], "claims": {"disableRenewal": true}},
        {"type": "ACME", "name": "broken", "claims": {"minTLSCertDuration": "48h"}},
        {"type": "OIDC", "name": "no-client", "issuer": OIDC_ISSUER}
    ])
    .to_string()
}

/// The collection built from [`provisioners_json`].
pub fn collection() -> Collection {
    Collection::from_json(&provisioners_json(), &config()).unwrap()
}

/// Generates a key and a real PKCS#10 request for `common_name` with the
/// given SANs (IP literals become IP SANs).
pub fn csr(common_name: &str, sans: &[&str]) -> CertificateRequest {
    let key = rcgen::KeyPair::generate().unwrap();
    let sans: Vec<String> = sans.iter().map(ToString::to_string).collect();
    let mut params = rcgen::CertificateParams::new(sans).unwrap();
    params.distinguished_name = rcgen::DistinguishedName::new();
    if !common_name.is_empty() {
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, common_name);
    }
    let csr = params.serialize_request(&key).unwrap();
    CertificateRequest::from_der(csr.der()).unwrap()
}

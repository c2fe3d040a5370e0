//! Provisioner authorization core for a certificate authority.
//!
//! Given a request attributed to a provisioner and a verified credential,
//! this crate decides whether issuance (or revocation, or renewal) is
//! allowed and, for signing, returns the ordered [`SignOption`]s the issuer
//! must apply.
//!
//! # Example
//!
//! ```
//! use ca_provisioner::{authorize, Authorization, AuthorizationRequest, Collection, Config};
//!
//! let config = Config::default();
//! let collection = Collection::from_json(r#"[{"type": "ACME", "name": "acme"}]"#, &config).unwrap();
//! let provisioner = collection.get("acme/acme").unwrap();
//!
//! let Authorization::Sign(options) =
//!     authorize(provisioner, &AuthorizationRequest::sign(), None).unwrap()
//! else {
//!     unreachable!()
//! };
//! assert_eq!(options.len(), 4);
//! ```
//!
//! # Modules
//!
//! - [`duration`] - Text-serialized durations
//! - [`claims`] - Claims, global config and the per-provisioner [`Claimer`]
//! - [`request`] - Methods and verified credentials
//! - [`sign_options`] - Sign options and validators
//! - [`extension`] - The provisioner identity extension
//! - [`provisioner`] - Provisioner variants
//! - [`dispatch`] - Method routing
//! - [`collection`] - Registry of initialized provisioners
//! - [`authority`] - Applies sign options and issues certificates

#![forbid(unsafe_code)]

pub mod authority;
pub mod claims;
pub mod collection;
pub mod dispatch;
pub mod duration;
pub mod error;
pub mod extension;
pub mod provisioner;
pub mod request;
pub mod sign_options;

pub use authority::{Authority, SignRequestOptions};
pub use claims::{Audiences, Claimer, Claims, Config};
pub use collection::Collection;
pub use dispatch::{authorize, Authorization};
pub use duration::Duration;
pub use error::{Error, Result, ValidationError};
pub use extension::{ProvisionerExtension, PROVISIONER_EXTENSION_OID};
pub use provisioner::{
    Acme, Cloud, JsonWebKey, Jwk, K8sSa, Oidc, Provisioner, ProvisionerBase, ProvisionerType, X5c,
    K8S_SA_ISSUER,
};
pub use request::{AuthorizationRequest, Credential, InstanceIdentity, Method, TokenClaims, X5cCredential};
pub use sign_options::{CertificateValidator, RequestValidator, SignOption, ValidityValidator};

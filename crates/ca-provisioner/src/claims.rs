//! Certificate lifetime claims and their per-provisioner resolution.

use serde::{Deserialize, Serialize};

use crate::duration::Duration;
use crate::error::{Error, Result};

/// Lifetime policy attached to a provisioner or to the whole CA.
///
/// Every field is optional; a missing field inherits the global value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Lifetime used when the request does not ask for one.
    #[serde(rename = "defaultTLSCertDuration", default, skip_serializing_if = "Option::is_none")]
    pub default_tls_cert_duration: Option<Duration>,
    /// Shortest lifetime a certificate may have.
    #[serde(rename = "minTLSCertDuration", default, skip_serializing_if = "Option::is_none")]
    pub min_tls_cert_duration: Option<Duration>,
    /// Longest lifetime a certificate may have.
    #[serde(rename = "maxTLSCertDuration", default, skip_serializing_if = "Option::is_none")]
    pub max_tls_cert_duration: Option<Duration>,
    /// Refuse renewals of certificates issued by the provisioner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_renewal: Option<bool>,
}

impl Claims {
    /// The CA-wide defaults: 24h default, 5m minimum, 24h maximum, renewal
    /// enabled.
    #[must_use]
    pub const fn global_defaults() -> Self {
        Self {
            default_tls_cert_duration: Some(Duration::from_hours(24)),
            min_tls_cert_duration: Some(Duration::from_mins(5)),
            max_tls_cert_duration: Some(Duration::from_hours(24)),
            disable_renewal: Some(false),
        }
    }
}

/// Audiences a token must be issued for, per method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audiences {
    /// Accepted audiences for signing.
    #[serde(default)]
    pub sign: Vec<String>,
    /// Accepted audiences for revocation.
    #[serde(default)]
    pub revoke: Vec<String>,
}

/// CA-wide settings handed to every provisioner at `init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Global claims every provisioner's overrides are merged onto.
    #[serde(default = "Claims::global_defaults")]
    pub claims: Claims,
    /// Token audiences.
    #[serde(default)]
    pub audiences: Audiences,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            claims: Claims::global_defaults(),
            audiences: Audiences::default(),
        }
    }
}

/// Claims resolved for one provisioner.
///
/// Values are merged and validated once in [`Claimer::new`]; the accessors
/// only read them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claimer {
    default_duration: Duration,
    min_duration: Duration,
    max_duration: Duration,
    disable_renewal: bool,
}

impl Claimer {
    /// Merges `overrides` onto `global` and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClaims`] naming the first bound that fails.
    pub fn new(overrides: Option<&Claims>, global: &Claims) -> Result<Self> {
        let pick = |field: fn(&Claims) -> Option<Duration>| {
            overrides
                .and_then(field)
                .or_else(|| field(global))
                .unwrap_or_default()
        };

        let claimer = Self {
            default_duration: pick(|c| c.default_tls_cert_duration),
            min_duration: pick(|c| c.min_tls_cert_duration),
            max_duration: pick(|c| c.max_tls_cert_duration),
            disable_renewal: overrides
                .and_then(|c| c.disable_renewal)
                .or(global.disable_renewal)
                .unwrap_or(false),
        };
        claimer.validate()?;
        Ok(claimer)
    }

    fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(Error::InvalidClaims { reason });
        let (def, min, max) = (self.default_duration, self.min_duration, self.max_duration);

        if min.is_zero() {
            return fail("MinTLSCertDuration must be greater than 0".into());
        }
        if max.is_zero() {
            return fail("MaxTLSCertDuration must be greater than 0".into());
        }
        if def.is_zero() {
            return fail("DefaultTLSCertDuration must be greater than 0".into());
        }
        if max < min {
            return fail(format!(
                "MaxCertDuration cannot be less than MinCertDuration: MaxCertDuration - {max}, MinCertDuration - {min}"
            ));
        }
        if def < min {
            return fail(format!(
                "DefaultCertDuration cannot be less than MinCertDuration: DefaultCertDuration - {def}, MinCertDuration - {min}"
            ));
        }
        if max < def {
            return fail(format!(
                "MaxCertDuration cannot be less than DefaultCertDuration: MaxCertDuration - {max}, DefaultCertDuration - {def}"
            ));
        }
        Ok(())
    }

    /// Lifetime applied when a request does not specify one.
    #[must_use]
    pub const fn default_tls_cert_duration(&self) -> Duration {
        self.default_duration
    }

    /// Shortest accepted certificate lifetime.
    #[must_use]
    pub const fn min_tls_cert_duration(&self) -> Duration {
        self.min_duration
    }

    /// Longest accepted certificate lifetime.
    #[must_use]
    pub const fn max_tls_cert_duration(&self) -> Duration {
        self.max_duration
    }

    /// Whether renewals are refused.
    #[must_use]
    pub const fn is_renewal_disabled(&self) -> bool {
        self.disable_renewal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn claims(def: Option<u64>, min: Option<u64>, max: Option<u64>) -> Claims {
        Claims {
            default_tls_cert_duration: def.map(Duration::from_secs),
            min_tls_cert_duration: min.map(Duration::from_secs),
            max_tls_cert_duration: max.map(Duration::from_secs),
            disable_renewal: None,
        }
    }

    #[test]
    fn no_overrides_uses_globals() {
        let claimer = Claimer::new(None, &Claims::global_defaults()).unwrap();
        assert_eq!(claimer.default_tls_cert_duration(), Duration::from_hours(24));
        assert_eq!(claimer.min_tls_cert_duration(), Duration::from_mins(5));
        assert_eq!(claimer.max_tls_cert_duration(), Duration::from_hours(24));
        assert!(!claimer.is_renewal_disabled());
    }

    #[test]
    fn overrides_win_field_by_field() {
        let overrides = Claims {
            default_tls_cert_duration: Some(Duration::from_hours(1)),
            disable_renewal: Some(true),
            ..Claims::default()
        };
        let claimer = Claimer::new(Some(&overrides), &Claims::global_defaults()).unwrap();
        assert_eq!(claimer.default_tls_cert_duration(), Duration::from_hours(1));
        assert_eq!(claimer.min_tls_cert_duration(), Duration::from_mins(5));
        assert_eq!(claimer.max_tls_cert_duration(), Duration::from_hours(24));
        assert!(claimer.is_renewal_disabled());
    }

    #[test_case(claims(Some(60), Some(0), Some(120)), "claims: MinTLSCertDuration must be greater than 0" ; "zero min")]
    #[test_case(claims(Some(60), Some(30), Some(0)), "claims: MaxTLSCertDuration must be greater than 0" ; "zero max")]
    #[test_case(claims(Some(0), Some(30), Some(120)), "claims: DefaultTLSCertDuration must be greater than 0" ; "zero default")]
    #[test_case(claims(Some(0), Some(0), Some(0)), "claims: MinTLSCertDuration must be greater than 0" ; "min checked first")]
    #[test_case(
        claims(Some(60), Some(120), Some(90)),
        "claims: MaxCertDuration cannot be less than MinCertDuration: MaxCertDuration - 1m30s, MinCertDuration - 2m" ;
        "max below min"
    )]
    #[test_case(
        claims(Some(60), Some(90), Some(120)),
        "claims: DefaultCertDuration cannot be less than MinCertDuration: DefaultCertDuration - 1m, MinCertDuration - 1m30s" ;
        "default below min"
    )]
    #[test_case(
        claims(Some(180), Some(60), Some(120)),
        "claims: MaxCertDuration cannot be less than DefaultCertDuration: MaxCertDuration - 2m, DefaultCertDuration - 3m" ;
        "max below default"
    )]
    fn invalid_bounds(overrides: Claims, message: &str) {
        let err = Claimer::new(Some(&overrides), &Claims::global_defaults()).unwrap_err();
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn missing_global_value_is_zero() {
        let global = claims(None, Some(60), Some(120));
        let err = Claimer::new(None, &global).unwrap_err();
        assert!(err.to_string().contains("DefaultTLSCertDuration must be greater than 0"));
    }

    #[test]
    fn claims_json_field_names() {
        let json = r#"{
            "defaultTLSCertDuration": "1h",
            "minTLSCertDuration": "5m",
            "maxTLSCertDuration": "24h",
            "disableRenewal": true
        }"#;
        let parsed: Claims = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.default_tls_cert_duration, Some(Duration::from_hours(1)));
        assert_eq!(parsed.min_tls_cert_duration, Some(Duration::from_mins(5)));
        assert_eq!(parsed.max_tls_cert_duration, Some(Duration::from_hours(24)));
        assert_eq!(parsed.disable_renewal, Some(true));

        let out = serde_json::to_value(&parsed).unwrap();
        assert_eq!(out["defaultTLSCertDuration"], "1h");
        assert_eq!(out["disableRenewal"], true);
    }

    #[test]
    fn config_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.claims, Claims::global_defaults());
    }

    proptest! {
        #[test]
        fn prop_valid_bounds_are_accepted(min in 1u64..1000, extra_def in 0u64..1000, extra_max in 0u64..1000) {
            let def = min + extra_def;
            let max = def + extra_max;
            let overrides = claims(Some(def), Some(min), Some(max));
            let claimer = Claimer::new(Some(&overrides), &Claims::global_defaults()).unwrap();
            prop_assert!(claimer.min_tls_cert_duration() <= claimer.default_tls_cert_duration());
            prop_assert!(claimer.default_tls_cert_duration() <= claimer.max_tls_cert_duration());
        }
    }
}

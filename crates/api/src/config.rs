//! Runtime configuration (environment variables, optionally from `.env`).

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use nexhire_core::{OrganizationId, UserId};
use nexhire_integrations::{HealthConfig, HealthConfigError};

pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not valid: {message}")]
    Invalid { key: &'static str, message: String },

    #[error(transparent)]
    Health(#[from] HealthConfigError),
}

/// Organization to provision at startup, with its first Owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bootstrap {
    pub organization_id: OrganizationId,
    pub owner_id: UserId,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// True when `JWT_SECRET` was missing and the dev secret is in use.
    pub jwt_secret_defaulted: bool,
    pub log_filter: String,
    pub health: HealthConfig,
    pub delivery_timeout: Duration,
    pub bootstrap: Option<Bootstrap>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_secret_defaulted: true,
            log_filter: "info".to_string(),
            health: HealthConfig::default(),
            delivery_timeout: Duration::from_millis(5_000),
            bootstrap: None,
        }
    }
}

impl ApiConfig {
    /// Load from the process environment after merging a `.env` file, if any.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = parse_or(&lookup, "NEXHIRE_BIND_ADDR", defaults.bind_addr)?;

        let (jwt_secret, jwt_secret_defaulted) = match lookup("JWT_SECRET") {
            Some(secret) if !secret.trim().is_empty() => (secret, false),
            _ => (defaults.jwt_secret, true),
        };

        let log_filter = lookup("NEXHIRE_LOG")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.log_filter);

        let health = HealthConfig::new(
            parse_or(&lookup, "NEXHIRE_HEALTH_FAILURE_THRESHOLD", defaults.health.failure_threshold)?,
            parse_or(&lookup, "NEXHIRE_HEALTH_WINDOW", defaults.health.window)?,
        )?;

        let timeout_ms: u64 = parse_or(
            &lookup,
            "NEXHIRE_DELIVERY_TIMEOUT_MS",
            defaults.delivery_timeout.as_millis() as u64,
        )?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "NEXHIRE_DELIVERY_TIMEOUT_MS",
                message: "must be greater than zero".to_string(),
            });
        }

        let bootstrap = match (
            lookup("NEXHIRE_BOOTSTRAP_ORGANIZATION_ID"),
            lookup("NEXHIRE_BOOTSTRAP_OWNER_ID"),
        ) {
            (None, None) => None,
            (Some(org), Some(owner)) => Some(Bootstrap {
                organization_id: parse_value("NEXHIRE_BOOTSTRAP_ORGANIZATION_ID", &org)?,
                owner_id: parse_value("NEXHIRE_BOOTSTRAP_OWNER_ID", &owner)?,
            }),
            _ => {
                return Err(ConfigError::Invalid {
                    key: "NEXHIRE_BOOTSTRAP_OWNER_ID",
                    message: "bootstrap organization and owner must be set together".to_string(),
                });
            }
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_secret_defaulted,
            log_filter,
            health,
            delivery_timeout: Duration::from_millis(timeout_ms),
            bootstrap,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => parse_value(key, &raw),
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: format!("{raw:?}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert!(config.jwt_secret_defaulted);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.health, HealthConfig::default());
        assert_eq!(config.delivery_timeout, Duration::from_secs(5));
        assert_eq!(config.bootstrap, None);
    }

    #[test]
    fn bootstrap_needs_both_ids() {
        let (org, owner) = (OrganizationId::new(), UserId::new());
        let config = load(&[
            ("NEXHIRE_BOOTSTRAP_ORGANIZATION_ID", org.to_string().as_str()),
            ("NEXHIRE_BOOTSTRAP_OWNER_ID", owner.to_string().as_str()),
        ])
        .unwrap();
        assert_eq!(
            config.bootstrap,
            Some(Bootstrap {
                organization_id: org,
                owner_id: owner
            })
        );

        assert!(load(&[("NEXHIRE_BOOTSTRAP_ORGANIZATION_ID", org.to_string().as_str())]).is_err());
        assert!(matches!(
            load(&[
                ("NEXHIRE_BOOTSTRAP_ORGANIZATION_ID", "not-a-uuid"),
                ("NEXHIRE_BOOTSTRAP_OWNER_ID", owner.to_string().as_str()),
            ]),
            Err(ConfigError::Invalid { key: "NEXHIRE_BOOTSTRAP_ORGANIZATION_ID", .. })
        ));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("NEXHIRE_BIND_ADDR", "127.0.0.1:9000"),
            ("JWT_SECRET", "s3cret"),
            ("NEXHIRE_LOG", "nexhire=debug"),
            ("NEXHIRE_HEALTH_FAILURE_THRESHOLD", "0.5"),
            ("NEXHIRE_HEALTH_WINDOW", "20"),
            ("NEXHIRE_DELIVERY_TIMEOUT_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.jwt_secret, "s3cret");
        assert!(!config.jwt_secret_defaulted);
        assert_eq!(config.log_filter, "nexhire=debug");
        assert_eq!(config.health, HealthConfig::new(0.5, 20).unwrap());
        assert_eq!(config.delivery_timeout, Duration::from_millis(250));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            load(&[("NEXHIRE_BIND_ADDR", "nowhere")]),
            Err(ConfigError::Invalid { key: "NEXHIRE_BIND_ADDR", .. })
        ));
        assert!(matches!(
            load(&[("NEXHIRE_HEALTH_FAILURE_THRESHOLD", "1.5")]),
            Err(ConfigError::Health(HealthConfigError::ThresholdOutOfRange(_)))
        ));
        assert!(matches!(
            load(&[("NEXHIRE_HEALTH_WINDOW", "0")]),
            Err(ConfigError::Health(HealthConfigError::EmptyWindow))
        ));
        assert!(matches!(
            load(&[("NEXHIRE_DELIVERY_TIMEOUT_MS", "0")]),
            Err(ConfigError::Invalid { .. })
        ));
    }
}

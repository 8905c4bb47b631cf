// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values, and the
//! typed configuration loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; HTTPS when both set | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `JWT_SECRET` | Shared secret for local tokens | Required |
//! | `LOCAL_ISSUER` | Issuer/audience of local tokens | `baristacms-local` |
//! | `LOCAL_TOKEN_TTL_SECS` | Lifetime of issued local tokens | `86400` |
//! | `AZURE_AD_TENANT_ID` | Azure AD tenant; enables federated sign-in | unset |
//! | `AZURE_AD_CLIENT_ID` | Azure AD application id | Required with tenant |
//! | `AZURE_AD_AUDIENCES` | Comma list of accepted audiences | client id, `api://<client id>` |
//! | `AZURE_AD_ISSUERS` | Comma list of accepted issuers | v2.0 and `sts.windows.net` forms |
//! | `AZURE_AD_JWKS_URL` | Key discovery endpoint | tenant v2.0 keys URL |
//! | `JWKS_CACHE_TTL_SECS` | Key cache TTL | `600` |
//! | `JWKS_CACHE_MAX_ENTRIES` | Key cache size | `5` |
//! | `JWKS_REQUESTS_PER_MINUTE` | Key fetch rate limit | `10` |
//! | `JWKS_FETCH_TIMEOUT_SECS` | Key fetch HTTP timeout | `10` |
//! | `AUTH_BYPASS` | Skip token verification (development only) | `false` |
//! | `AUTH_BYPASS_EMAIL` / `AUTH_BYPASS_NAME` | Bypass identity | `dev@localhost` / `Developer` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::auth::federated::{default_audiences, default_issuers};
use crate::auth::keys::{
    Clock, DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_REQUESTS_PER_MINUTE,
};
use crate::auth::{
    AuthError, AuthGate, BypassConfig, FederatedVerifier, FederationConfig, HttpKeyProvider,
    LocalVerifier, SigningKeySet, SystemClock, LOCAL_ISSUER,
};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Environment variable name for the local token signing secret.
///
/// Anyone holding this value can mint tokens for any user.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const LOCAL_ISSUER_ENV: &str = "LOCAL_ISSUER";
pub const LOCAL_TOKEN_TTL_ENV: &str = "LOCAL_TOKEN_TTL_SECS";

pub const AZURE_TENANT_ID_ENV: &str = "AZURE_AD_TENANT_ID";
pub const AZURE_CLIENT_ID_ENV: &str = "AZURE_AD_CLIENT_ID";
pub const AZURE_AUDIENCES_ENV: &str = "AZURE_AD_AUDIENCES";
pub const AZURE_ISSUERS_ENV: &str = "AZURE_AD_ISSUERS";
pub const AZURE_JWKS_URL_ENV: &str = "AZURE_AD_JWKS_URL";
pub const JWKS_CACHE_TTL_ENV: &str = "JWKS_CACHE_TTL_SECS";
pub const JWKS_CACHE_MAX_ENTRIES_ENV: &str = "JWKS_CACHE_MAX_ENTRIES";
pub const JWKS_REQUESTS_PER_MINUTE_ENV: &str = "JWKS_REQUESTS_PER_MINUTE";
pub const JWKS_FETCH_TIMEOUT_ENV: &str = "JWKS_FETCH_TIMEOUT_SECS";

/// Environment variable name for bypass mode.
///
/// Only the exact value `true` enables it. Bypass skips all token
/// verification and must never be set outside local development.
pub const AUTH_BYPASS_ENV: &str = "AUTH_BYPASS";
pub const AUTH_BYPASS_EMAIL_ENV: &str = "AUTH_BYPASS_EMAIL";
pub const AUTH_BYPASS_NAME_ENV: &str = "AUTH_BYPASS_NAME";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LOCAL_TOKEN_TTL: Duration = Duration::from_secs(86_400);
const DEFAULT_BYPASS_EMAIL: &str = "dev@localhost";
const DEFAULT_BYPASS_NAME: &str = "Developer";

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("invalid auth configuration: {0}")]
    Auth(#[from] AuthError),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// HTTPS certificate and key paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub tls: Option<TlsConfig>,
    pub log_format: LogFormat,
}

/// Azure AD settings plus key cache tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationSettings {
    pub federation: FederationConfig,
    pub jwks_url: String,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub requests_per_minute: u32,
    pub fetch_timeout: Duration,
}

/// Everything the auth gate is built from.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub local_issuer: String,
    pub local_token_ttl: Duration,
    pub federation: Option<FederationSettings>,
    pub bypass: Option<BypassConfig>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("local_issuer", &self.local_issuer)
            .field("local_token_ttl", &self.local_token_ttl)
            .field("federation", &self.federation)
            .field("bypass", &self.bypass)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port: u16 = parse_or(&lookup, PORT_ENV, DEFAULT_PORT)?;
        let addr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name: HOST_ENV,
                value: host,
            })?;

        let cert_path = non_empty(&lookup, TLS_CERT_PATH_ENV);
        let key_path = non_empty(&lookup, TLS_KEY_PATH_ENV);
        let tls = match (cert_path, key_path) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: cert.into(),
                key_path: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        Ok(Self {
            addr,
            tls,
            log_format: log_format(&lookup),
        })
    }
}

/// Log format from `LOG_FORMAT`; anything but `json` is pretty.
pub fn log_format(lookup: &impl Fn(&str) -> Option<String>) -> LogFormat {
    match lookup(LOG_FORMAT_ENV).as_deref().map(str::trim) {
        Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = non_empty(&lookup, JWT_SECRET_ENV)
            .ok_or(ConfigError::Missing(JWT_SECRET_ENV))?;
        let local_issuer = non_empty(&lookup, LOCAL_ISSUER_ENV)
            .unwrap_or_else(|| LOCAL_ISSUER.to_string());
        let local_token_ttl = Duration::from_secs(parse_or(
            &lookup,
            LOCAL_TOKEN_TTL_ENV,
            DEFAULT_LOCAL_TOKEN_TTL.as_secs(),
        )?);

        let federation = match non_empty(&lookup, AZURE_TENANT_ID_ENV) {
            Some(tenant_id) => Some(federation_settings(&lookup, tenant_id)?),
            None => None,
        };

        let bypass = (lookup(AUTH_BYPASS_ENV).as_deref() == Some("true")).then(|| BypassConfig {
            email: non_empty(&lookup, AUTH_BYPASS_EMAIL_ENV)
                .unwrap_or_else(|| DEFAULT_BYPASS_EMAIL.to_string()),
            name: non_empty(&lookup, AUTH_BYPASS_NAME_ENV)
                .unwrap_or_else(|| DEFAULT_BYPASS_NAME.to_string()),
        });

        Ok(Self {
            jwt_secret,
            local_issuer,
            local_token_ttl,
            federation,
            bypass,
        })
    }

    /// Build the gate with the real clock and HTTPS key provider.
    pub fn build_gate(&self) -> Result<AuthGate, ConfigError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let mut gate = AuthGate::new(LocalVerifier::new(
            self.jwt_secret.as_bytes(),
            self.local_issuer.clone(),
        ));

        if let Some(settings) = &self.federation {
            let provider = HttpKeyProvider::new(&settings.jwks_url, settings.fetch_timeout)?;
            let keys = SigningKeySet::new(Arc::new(provider), clock.clone())
                .with_cache_ttl(settings.cache_ttl)
                .with_max_entries(settings.cache_max_entries)
                .with_requests_per_minute(settings.requests_per_minute);
            gate = gate.with_federation(FederatedVerifier::new(
                settings.federation.clone(),
                Arc::new(keys),
                clock,
            ));
        }

        if let Some(bypass) = &self.bypass {
            tracing::warn!(
                email = %bypass.email,
                "AUTH BYPASS ENABLED: token verification is disabled for every request"
            );
            gate = gate.with_bypass(bypass.clone());
        }

        Ok(gate)
    }
}

fn federation_settings(
    lookup: &impl Fn(&str) -> Option<String>,
    tenant_id: String,
) -> Result<FederationSettings, ConfigError> {
    let client_id = non_empty(lookup, AZURE_CLIENT_ID_ENV)
        .ok_or(ConfigError::Missing(AZURE_CLIENT_ID_ENV))?;

    let audiences = list(lookup, AZURE_AUDIENCES_ENV)
        .unwrap_or_else(|| default_audiences(&client_id));
    let issuers = list(lookup, AZURE_ISSUERS_ENV).unwrap_or_else(|| default_issuers(&tenant_id));
    let jwks_url = non_empty(lookup, AZURE_JWKS_URL_ENV).unwrap_or_else(|| {
        format!("https://login.microsoftonline.com/{tenant_id}/discovery/v2.0/keys")
    });

    let requests_per_minute = parse_or(
        lookup,
        JWKS_REQUESTS_PER_MINUTE_ENV,
        DEFAULT_REQUESTS_PER_MINUTE,
    )?;
    let cache_max_entries =
        parse_or(lookup, JWKS_CACHE_MAX_ENTRIES_ENV, DEFAULT_CACHE_MAX_ENTRIES)?;
    if cache_max_entries == 0 {
        return Err(ConfigError::Invalid {
            name: JWKS_CACHE_MAX_ENTRIES_ENV,
            value: "0".into(),
        });
    }

    Ok(FederationSettings {
        federation: FederationConfig {
            tenant_id,
            client_id,
            audiences,
            issuers,
        },
        jwks_url,
        cache_ttl: Duration::from_secs(parse_or(
            lookup,
            JWKS_CACHE_TTL_ENV,
            DEFAULT_CACHE_TTL.as_secs(),
        )?),
        cache_max_entries,
        requests_per_minute,
        fetch_timeout: Duration::from_secs(parse_or(
            lookup,
            JWKS_FETCH_TIMEOUT_ENV,
            DEFAULT_FETCH_TIMEOUT.as_secs(),
        )?),
    })
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn list(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<Vec<String>> {
    let items: Vec<String> = non_empty(lookup, name)?
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match non_empty(lookup, name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn server_defaults() {
        let config = ServerConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8080".parse().unwrap());
        assert!(config.tls.is_none());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn server_tls_requires_both_paths() {
        let config = ServerConfig::from_lookup(env(&[
            (TLS_CERT_PATH_ENV, "/certs/cms.pem"),
            (TLS_KEY_PATH_ENV, "/certs/cms.key"),
            (LOG_FORMAT_ENV, "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.tls.unwrap().cert_path, PathBuf::from("/certs/cms.pem"));
        assert_eq!(config.log_format, LogFormat::Json);

        let result = ServerConfig::from_lookup(env(&[(TLS_CERT_PATH_ENV, "/certs/cms.pem")]));
        assert!(matches!(result, Err(ConfigError::Missing(TLS_KEY_PATH_ENV))));
    }

    #[test]
    fn bad_port_is_reported() {
        let result = ServerConfig::from_lookup(env(&[(PORT_ENV, "eighty")]));
        assert!(matches!(result, Err(ConfigError::Invalid { name: PORT_ENV, .. })));
    }

    #[test]
    fn secret_is_required() {
        let result = AuthConfig::from_lookup(env(&[]));
        assert!(matches!(result, Err(ConfigError::Missing(JWT_SECRET_ENV))));
    }

    #[test]
    fn defaults_have_no_federation_and_no_bypass() {
        let config = AuthConfig::from_lookup(env(&[(JWT_SECRET_ENV, "s3cret")])).unwrap();
        assert_eq!(config.local_issuer, LOCAL_ISSUER);
        assert_eq!(config.local_token_ttl, DEFAULT_LOCAL_TOKEN_TTL);
        assert!(config.federation.is_none());
        assert!(config.bypass.is_none());

        let gate = config.build_gate().unwrap();
        assert!(!gate.bypass_enabled());
        assert!(gate.signing_keys().is_none());
    }

    #[test]
    fn bypass_needs_literal_true() {
        for value in ["1", "yes", "TRUE", "on", ""] {
            let lookup = env(&[(JWT_SECRET_ENV, "s"), (AUTH_BYPASS_ENV, value)]);
            let config = AuthConfig::from_lookup(lookup).unwrap();
            assert!(config.bypass.is_none(), "{value:?} must not enable bypass");
        }

        let config = AuthConfig::from_lookup(env(&[
            (JWT_SECRET_ENV, "s"),
            (AUTH_BYPASS_ENV, "true"),
            (AUTH_BYPASS_EMAIL_ENV, "qa@barista.cms"),
        ]))
        .unwrap();
        assert_eq!(
            config.bypass,
            Some(BypassConfig {
                email: "qa@barista.cms".into(),
                name: DEFAULT_BYPASS_NAME.into(),
            })
        );
    }

    #[test]
    fn federation_defaults_derive_from_tenant_and_client() {
        let config = AuthConfig::from_lookup(env(&[
            (JWT_SECRET_ENV, "s"),
            (AZURE_TENANT_ID_ENV, "tenant-1"),
            (AZURE_CLIENT_ID_ENV, "client-1"),
        ]))
        .unwrap();

        let settings = config.federation.clone().unwrap();
        assert_eq!(settings.federation.audiences, vec!["client-1", "api://client-1"]);
        assert_eq!(
            settings.federation.issuers,
            vec![
                "https://login.microsoftonline.com/tenant-1/v2.0",
                "https://sts.windows.net/tenant-1/",
            ]
        );
        assert_eq!(
            settings.jwks_url,
            "https://login.microsoftonline.com/tenant-1/discovery/v2.0/keys"
        );
        assert_eq!(settings.cache_ttl, DEFAULT_CACHE_TTL);
        assert_eq!(settings.cache_max_entries, DEFAULT_CACHE_MAX_ENTRIES);
        assert_eq!(settings.requests_per_minute, DEFAULT_REQUESTS_PER_MINUTE);

        let gate = config.build_gate().unwrap();
        assert!(gate.signing_keys().is_some_and(|keys| keys.is_empty()));
    }

    #[test]
    fn federation_overrides_and_validation() {
        let config = AuthConfig::from_lookup(env(&[
            (JWT_SECRET_ENV, "s"),
            (AZURE_TENANT_ID_ENV, "tenant-1"),
            (AZURE_CLIENT_ID_ENV, "client-1"),
            (AZURE_AUDIENCES_ENV, "a1, a2 ,"),
            (JWKS_CACHE_TTL_ENV, "60"),
            (JWKS_REQUESTS_PER_MINUTE_ENV, "3"),
        ]))
        .unwrap();
        let settings = config.federation.unwrap();
        assert_eq!(settings.federation.audiences, vec!["a1", "a2"]);
        assert_eq!(settings.cache_ttl, Duration::from_secs(60));
        assert_eq!(settings.requests_per_minute, 3);

        let result = AuthConfig::from_lookup(env(&[
            (JWT_SECRET_ENV, "s"),
            (AZURE_TENANT_ID_ENV, "tenant-1"),
        ]));
        assert!(matches!(result, Err(ConfigError::Missing(AZURE_CLIENT_ID_ENV))));

        let result = AuthConfig::from_lookup(env(&[
            (JWT_SECRET_ENV, "s"),
            (AZURE_TENANT_ID_ENV, "tenant-1"),
            (AZURE_CLIENT_ID_ENV, "client-1"),
            (JWKS_CACHE_MAX_ENTRIES_ENV, "0"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn insecure_jwks_url_fails_gate_construction() {
        let config = AuthConfig::from_lookup(env(&[
            (JWT_SECRET_ENV, "s"),
            (AZURE_TENANT_ID_ENV, "tenant-1"),
            (AZURE_CLIENT_ID_ENV, "client-1"),
            (AZURE_JWKS_URL_ENV, "http://keys.example.com/jwks"),
        ]))
        .unwrap();
        assert!(matches!(config.build_gate(), Err(ConfigError::Auth(_))));
    }

    #[test]
    fn secret_is_redacted_in_debug_output() {
        let lookup = env(&[(JWT_SECRET_ENV, "super-secret-value")]);
        let config = AuthConfig::from_lookup(lookup).unwrap();
        assert!(!format!("{config:?}").contains("super-secret-value"));
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Azure AD token verification.
//!
//! Two paths, selected by the classifier:
//!
//! - **standard**: signature checked against the tenant's published JWKS,
//!   audience and issuer checked against the configured allowlists, `exp`
//!   required and compared with the injected [`Clock`]. On an
//!   invalid signature the whole key cache is dropped and verification runs
//!   exactly once more, which absorbs upstream key rotation.
//! - **delegated**: tokens minted for another audience (e.g. Microsoft Graph)
//!   carry a header `nonce` and are signed with key material this service
//!   cannot obtain.
//!
//! ## Security
//!
//! The delegated path does NOT verify a signature. It only checks that the
//! issuer names the configured tenant and that the token is not expired.
//! This is a deliberately reduced trust tier; integrators relying on it
//! accept that a delegated token's contents are not cryptographically bound
//! to the tenant.

use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde_json::{Map, Value};

use super::error::AuthError;
use super::identity::FederatedClaims;
use super::keys::{Clock, SigningKeySet};
use super::token::{claim_expiry, InspectedToken};

/// Azure AD tenant settings the verifier checks against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationConfig {
    /// Directory (tenant) id
    pub tenant_id: String,
    /// Application (client) id
    pub client_id: String,
    /// Accepted `aud` values
    pub audiences: Vec<String>,
    /// Accepted `iss` values
    pub issuers: Vec<String>,
}

impl FederationConfig {
    /// Settings with the usual Azure AD audience and issuer forms.
    ///
    /// Audiences: the bare client id and `api://<client id>`.
    /// Issuers: the v2.0 endpoint and the legacy `sts.windows.net` form.
    pub fn for_tenant(tenant_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        let tenant_id = tenant_id.into();
        let client_id = client_id.into();
        Self {
            audiences: default_audiences(&client_id),
            issuers: default_issuers(&tenant_id),
            tenant_id,
            client_id,
        }
    }
}

pub fn default_audiences(client_id: &str) -> Vec<String> {
    vec![client_id.to_string(), format!("api://{client_id}")]
}

pub fn default_issuers(tenant_id: &str) -> Vec<String> {
    vec![
        format!("https://login.microsoftonline.com/{tenant_id}/v2.0"),
        format!("https://sts.windows.net/{tenant_id}/"),
    ]
}

/// Verifies federated tokens for one tenant.
pub struct FederatedVerifier {
    config: FederationConfig,
    keys: Arc<SigningKeySet>,
    clock: Arc<dyn Clock>,
}

impl FederatedVerifier {
    pub fn new(config: FederationConfig, keys: Arc<SigningKeySet>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            keys,
            clock,
        }
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    pub fn signing_keys(&self) -> &Arc<SigningKeySet> {
        &self.keys
    }

    /// Reduced-trust check for delegated tokens. No signature verification.
    ///
    /// Returns the raw payload on success.
    pub fn verify_delegated(
        &self,
        token: InspectedToken<'_>,
    ) -> Result<Map<String, Value>, AuthError> {
        let issuer = token
            .issuer()
            .ok_or_else(|| AuthError::ClaimMismatch("missing issuer".into()))?;
        if !issuer.contains(&self.config.tenant_id) {
            return Err(AuthError::ClaimMismatch("issuer is not the configured tenant".into()));
        }

        if let Some(exp) = token.expiry() {
            if exp <= self.clock.unix_timestamp() {
                return Err(AuthError::TokenExpired);
            }
        }

        tracing::debug!(issuer, "accepted delegated token without signature check");
        Ok(token.into_payload())
    }

    /// Full verification with one key-cache reset on signature failure.
    pub async fn verify_standard(&self, token: &str) -> Result<FederatedClaims, AuthError> {
        match self.verify_with_cached_keys(token).await {
            Err(err) if err.is_signature_failure() => {
                tracing::warn!(
                    "federated signature check failed, refreshing signing keys and retrying once"
                );
                self.keys.invalidate_all();
                self.verify_with_cached_keys(token).await
            }
            outcome => outcome,
        }
    }

    async fn verify_with_cached_keys(&self, token: &str) -> Result<FederatedClaims, AuthError> {
        let header = decode_header(token)?;
        if !is_asymmetric(header.alg) {
            return Err(AuthError::MalformedToken(format!(
                "algorithm {:?} not accepted for federated tokens",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::MalformedToken("missing key id".into()))?;

        let Some(signing_key) = self.keys.get(&kid).await? else {
            tracing::debug!(kid, "no published signing key matches token");
            return Err(AuthError::SignatureInvalid);
        };

        let mut validation = Validation::new(signing_key.algorithm.unwrap_or(header.alg));
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "aud", "iss"]);
        validation.set_audience(&self.config.audiences);
        validation.set_issuer(&self.config.issuers);

        let data = decode::<Map<String, Value>>(token, &signing_key.key, &validation)?;
        let payload = data.claims;

        let exp = claim_expiry(&payload)
            .ok_or_else(|| AuthError::ClaimMismatch("exp is not a number".into()))?;
        if exp <= self.clock.unix_timestamp() {
            return Err(AuthError::TokenExpired);
        }

        serde_json::from_value(Value::Object(payload))
            .map_err(|e| AuthError::MalformedToken(e.to_string()))
    }
}

fn is_asymmetric(alg: Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified claims and the normalized identity handed to route handlers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::AuthError;

/// Claims carried by a locally issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalClaims {
    /// Subject (the user's email for tokens minted by this server)
    pub sub: String,
    /// User email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Issuer (always the local issuer)
    pub iss: String,
    /// Audience (always the local issuer)
    pub aud: String,
    /// Issued at timestamp
    #[serde(default)]
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Claims read from an Azure AD token, standard or delegated.
///
/// Only the fields the gate maps are named; issuer and audience have
/// already been checked by the verifier by the time this is built.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FederatedClaims {
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub upn: Option<String>,
    /// Directory object id of the user
    #[serde(default)]
    pub oid: Option<String>,
    /// Tenant the token was issued for
    #[serde(default)]
    pub tid: Option<String>,
}

impl FederatedClaims {
    /// First non-empty of `preferred_username`, `email`, `upn`.
    pub fn resolved_email(&self) -> Option<&str> {
        [&self.preferred_username, &self.email, &self.upn]
            .into_iter()
            .filter_map(|claim| claim.as_deref())
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}

/// Output of a successful verifier run, tagged by trust domain.
#[derive(Debug, Clone)]
pub enum VerifiedClaims {
    Local(LocalClaims),
    Federated(FederatedClaims),
}

/// Which trust domain vouched for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    Local,
    Federated,
}

/// Normalized identity attached to every authenticated request.
///
/// Built fresh per request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedIdentity {
    pub email: String,
    pub name: String,
    pub auth_kind: AuthKind,
    /// Azure AD object id (federated identities only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// Azure AD tenant id (federated identities only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl VerifiedIdentity {
    /// Identity for a caller without a verified token (bypass mode).
    pub fn local(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            auth_kind: AuthKind::Local,
            object_id: None,
            tenant_id: None,
        }
    }

    /// Map verified claims to an identity.
    ///
    /// Fails with [`AuthError::ClaimMismatch`] when no usable email can be
    /// found in the claims.
    pub fn from_claims(claims: VerifiedClaims) -> Result<Self, AuthError> {
        match claims {
            VerifiedClaims::Local(claims) => {
                let email = claims
                    .email
                    .filter(|email| !email.is_empty())
                    .unwrap_or(claims.sub);
                if email.is_empty() {
                    return Err(AuthError::ClaimMismatch("missing email".into()));
                }
                let name = claims
                    .name
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| email.clone());
                Ok(Self::local(email, name))
            }
            VerifiedClaims::Federated(claims) => {
                let email = claims
                    .resolved_email()
                    .ok_or_else(|| AuthError::ClaimMismatch("missing email".into()))?
                    .to_string();
                let name = claims
                    .name
                    .clone()
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| email.clone());
                Ok(Self {
                    email,
                    name,
                    auth_kind: AuthKind::Federated,
                    object_id: claims.oid,
                    tenant_id: claims.tid,
                })
            }
        }
    }
}

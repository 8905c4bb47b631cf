// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication gate for Axum.
//!
//! Every request outside the public allowlist goes through
//! [`require_auth`]:
//!
//! ```text
//! request → bypass? ─yes→ fixed/header identity
//!         → Authorization header → "Bearer <token>"
//!         → classify (local | federated-delegated | federated-standard)
//!         → matching verifier → VerifiedIdentity in request extensions
//! ```
//!
//! Any failure ends in a [`Rejection`] (401 with a fixed message). Verifier
//! errors are translated here and nowhere else.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::error::{AuthError, Rejection};
use super::federated::FederatedVerifier;
use super::identity::{FederatedClaims, VerifiedClaims, VerifiedIdentity};
use super::keys::SigningKeySet;
use super::local::LocalVerifier;
use super::token::{InspectedToken, TokenKind};
use crate::state::AppState;

/// Paths that never require authentication.
pub const PUBLIC_PATHS: &[&str] = &["/api/health"];

/// Header overriding the bypass identity's email.
pub const BYPASS_EMAIL_HEADER: &str = "x-user-email";
/// Header overriding the bypass identity's display name.
pub const BYPASS_NAME_HEADER: &str = "x-user-name";

/// Development bypass: skip verification and act as a fixed user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassConfig {
    pub email: String,
    pub name: String,
}

impl BypassConfig {
    /// Default identity, overridable per request by the bypass headers.
    fn identity(&self, headers: &HeaderMap) -> VerifiedIdentity {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        VerifiedIdentity::local(
            header(BYPASS_EMAIL_HEADER).unwrap_or(&self.email),
            header(BYPASS_NAME_HEADER).unwrap_or(&self.name),
        )
    }
}

/// Classifier plus verifiers plus bypass policy.
pub struct AuthGate {
    local: LocalVerifier,
    federated: Option<FederatedVerifier>,
    bypass: Option<BypassConfig>,
}

impl AuthGate {
    /// Gate that only trusts locally issued tokens.
    pub fn new(local: LocalVerifier) -> Self {
        Self {
            local,
            federated: None,
            bypass: None,
        }
    }

    pub fn with_federation(mut self, federated: FederatedVerifier) -> Self {
        self.federated = Some(federated);
        self
    }

    /// Enable bypass mode. Never called unless configuration asks for it.
    pub fn with_bypass(mut self, bypass: BypassConfig) -> Self {
        self.bypass = Some(bypass);
        self
    }

    pub fn local(&self) -> &LocalVerifier {
        &self.local
    }

    pub fn signing_keys(&self) -> Option<&SigningKeySet> {
        self.federated
            .as_ref()
            .map(|federated| &**federated.signing_keys())
    }

    pub fn bypass_enabled(&self) -> bool {
        self.bypass.is_some()
    }

    pub fn is_public(path: &str) -> bool {
        PUBLIC_PATHS.contains(&path)
    }

    /// Run the full gate for one request's headers.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<VerifiedIdentity, Rejection> {
        if let Some(bypass) = &self.bypass {
            return Ok(bypass.identity(headers));
        }

        let token = bearer_token(headers)?;

        let outcome = match self.verify(token).await {
            Ok(claims) => VerifiedIdentity::from_claims(claims),
            Err(err) => Err(err),
        };

        outcome.map_err(|err| {
            let rejection = Rejection::from(&err);
            tracing::debug!(error = %err, rejection = %rejection, "request rejected");
            rejection
        })
    }

    /// Classify the token and run exactly the matching verifier.
    pub async fn verify(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        let inspected = InspectedToken::parse(token)?;
        let kind = inspected.classify(self.local.issuer());
        tracing::debug!(%kind, "token classified");

        match kind {
            TokenKind::Local => self.local.verify(token).map(VerifiedClaims::Local),
            TokenKind::FederatedDelegated => {
                let payload = self.federation()?.verify_delegated(inspected)?;
                let claims: FederatedClaims = serde_json::from_value(payload.into())
                    .map_err(|e| AuthError::MalformedToken(e.to_string()))?;
                Ok(VerifiedClaims::Federated(claims))
            }
            TokenKind::FederatedStandard => self
                .federation()?
                .verify_standard(token)
                .await
                .map(VerifiedClaims::Federated),
        }
    }

    fn federation(&self) -> Result<&FederatedVerifier, AuthError> {
        self.federated
            .as_ref()
            .ok_or_else(|| AuthError::ClaimMismatch("federated sign-in is not configured".into()))
    }
}

/// Extract the token from an exact `Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, Rejection> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(Rejection::MissingHeader)?
        .to_str()
        .map_err(|_| Rejection::InvalidHeaderFormat)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        _ => Err(Rejection::InvalidHeaderFormat),
    }
}

/// Axum middleware enforcing the gate on everything but [`PUBLIC_PATHS`].
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/api/users/me", get(users::get_current_user))
///     .layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if AuthGate::is_public(request.uri().path()) {
        return next.run(request).await;
    }

    match state.auth.authenticate(request.headers()).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    }
}

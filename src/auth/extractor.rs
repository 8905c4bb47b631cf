// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for the identity established by the gate.
//!
//! ```rust,ignore
//! async fn my_handler(Auth(identity): Auth) -> impl IntoResponse {
//!     // identity is VerifiedIdentity
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{Rejection, VerifiedIdentity};

/// Authenticated caller of a handler behind [`require_auth`](super::require_auth).
pub struct Auth(pub VerifiedIdentity);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<VerifiedIdentity>() {
            Some(identity) => Ok(Auth(identity.clone())),
            None => {
                tracing::error!("handler requires an identity but the auth gate did not run");
                Err(Rejection::AuthenticationFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn reads_identity_from_extensions() {
        let mut parts = Request::builder()
            .uri("/api/users/me")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        parts
            .extensions
            .insert(VerifiedIdentity::local("editor@barista.cms", "Editor"));

        let Auth(identity) = Auth::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(identity.email, "editor@barista.cms");
    }

    #[tokio::test]
    async fn rejects_when_gate_did_not_run() {
        let mut parts = Request::builder()
            .uri("/api/users/me")
            .body(())
            .unwrap()
            .into_parts()
            .0;

        let result = Auth::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(Rejection::AuthenticationFailed)));
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! Two layers:
//!
//! - [`AuthError`] is what the classifier and verifiers return. Variants are
//!   typed so the federated verifier can tell a signature failure (retryable
//!   once) from everything else.
//! - [`Rejection`] is what the gate sends back. It is the only thing a caller
//!   ever sees, always a 401 with a fixed message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Verification failure raised by the classifier or one of the verifiers.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token could not be structurally parsed.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Signature did not verify against the selected key.
    #[error("token signature is invalid")]
    SignatureInvalid,

    /// Expiry claim is in the past.
    #[error("token has expired")]
    TokenExpired,

    /// Issuer, audience or another required claim did not match.
    #[error("claim mismatch: {0}")]
    ClaimMismatch(String),

    /// Signing keys could not be fetched from the identity provider.
    #[error("signing key fetch failed: {0}")]
    KeyFetch(String),
}

impl AuthError {
    /// True for the one failure kind that warrants a key cache reset.
    pub fn is_signature_failure(&self) -> bool {
        matches!(self, AuthError::SignatureInvalid)
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidIssuer => AuthError::ClaimMismatch("issuer".into()),
            ErrorKind::InvalidAudience => AuthError::ClaimMismatch("audience".into()),
            ErrorKind::ImmatureSignature => AuthError::ClaimMismatch("not yet valid".into()),
            ErrorKind::MissingRequiredClaim(claim) => {
                AuthError::ClaimMismatch(format!("missing {claim}"))
            }
            _ => AuthError::MalformedToken(err.to_string()),
        }
    }
}

/// Terminal outcome of the authentication gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No `Authorization` header present
    MissingHeader,
    /// Header is not exactly `Bearer <token>`
    InvalidHeaderFormat,
    /// Token verified structurally but is expired
    TokenExpired,
    /// Bad signature or unparsable token
    InvalidToken,
    /// Anything else (claim mismatch, key fetch failure, ...)
    AuthenticationFailed,
}

#[derive(Serialize)]
struct RejectionBody {
    message: &'static str,
}

impl Rejection {
    /// User-facing message. Never carries internal detail.
    pub fn message(&self) -> &'static str {
        match self {
            Rejection::MissingHeader => "Missing authorization header",
            Rejection::InvalidHeaderFormat => "Invalid authorization header format",
            Rejection::TokenExpired => "Token expired",
            Rejection::InvalidToken => "Invalid token",
            Rejection::AuthenticationFailed => "Authentication failed",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl From<&AuthError> for Rejection {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::TokenExpired => Rejection::TokenExpired,
            AuthError::SignatureInvalid | AuthError::MalformedToken(_) => Rejection::InvalidToken,
            AuthError::ClaimMismatch(_) | AuthError::KeyFetch(_) => Rejection::AuthenticationFailed,
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = Json(RejectionBody {
            message: self.message(),
        });
        (self.status_code(), body).into_response()
    }
}

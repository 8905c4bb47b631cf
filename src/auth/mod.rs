// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Dual-mode bearer token authentication for the BaristaCMS admin API.
//!
//! ## Auth Flow
//!
//! 1. The React admin signs the user in, either with local credentials
//!    (server-issued HS256 token) or through Azure AD (MSAL).
//! 2. The front end sends `Authorization: Bearer <token>`.
//! 3. The gate:
//!    - classifies the token from its unverified contents
//!    - runs the local verifier or the federated verifier
//!    - attaches a [`VerifiedIdentity`] to the request
//!
//! ## Security
//!
//! - All API endpoints except `/api/health` require authentication
//! - Federated keys are fetched over HTTPS, cached with TTL and size bounds,
//!   and rate limited
//! - Delegated federated tokens are accepted WITHOUT signature verification
//!   (see [`federated`])
//! - Bypass mode exists for local development only and is off unless
//!   `AUTH_BYPASS=true`

pub mod error;
pub mod extractor;
pub mod federated;
pub mod gate;
pub mod identity;
pub mod keys;
pub mod local;
pub mod token;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{AuthError, Rejection};
pub use extractor::Auth;
pub use federated::{FederatedVerifier, FederationConfig};
pub use gate::{require_auth, AuthGate, BypassConfig};
pub use identity::{AuthKind, VerifiedIdentity};
pub use keys::{HttpKeyProvider, SigningKeySet, SystemClock};
pub use local::{LocalVerifier, LOCAL_ISSUER};

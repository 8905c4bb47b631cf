// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Locally issued tokens: HS256 with a single shared secret.
//!
//! The same string is used as issuer and audience (`baristacms-local` by
//! default), so a token minted here can never be mistaken for an Azure AD
//! token by the classifier.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::error::AuthError;
use super::identity::LocalClaims;

/// Default issuer and audience of locally issued tokens.
pub const LOCAL_ISSUER: &str = "baristacms-local";

/// Algorithm for locally issued tokens.
const LOCAL_ALGORITHM: Algorithm = Algorithm::HS256;

/// Verifies (and mints) tokens signed with the local shared secret.
#[derive(Clone)]
pub struct LocalVerifier {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for LocalVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalVerifier")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl LocalVerifier {
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(LOCAL_ALGORITHM);
        validation.leeway = 0;
        validation.set_issuer(&[&issuer]);
        validation.set_audience(&[&issuer]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Verify signature, expiry, issuer and audience.
    pub fn verify(&self, token: &str) -> Result<LocalClaims, AuthError> {
        let data = decode::<LocalClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Mint a token for a user who signed in with local credentials.
    pub fn issue(
        &self,
        email: &str,
        name: Option<&str>,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = LocalClaims {
            sub: email.to_string(),
            email: Some(email.to_string()),
            name: name.map(str::to_string),
            iss: self.issuer.clone(),
            aud: self.issuer.clone(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
        };

        encode(&Header::new(LOCAL_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::MalformedToken(format!("failed to encode local token: {e}")))
    }
}

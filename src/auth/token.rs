// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Unverified token inspection and classification.
//!
//! The gate decides which verifier runs by looking at the token contents
//! only: no key lookup, no signature check, no network. Classification is
//! evaluated in order:
//!
//! 1. payload `iss` equals the local issuer → [`TokenKind::Local`]
//! 2. header carries a `nonce` → [`TokenKind::FederatedDelegated`]
//! 3. otherwise → [`TokenKind::FederatedStandard`]

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};

use super::error::AuthError;

/// Verification path selected for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Issued by this server, HS256 with the shared secret.
    Local,
    /// Federated token minted for another audience (header `nonce` present).
    FederatedDelegated,
    /// Federated token for this application, verified against the JWKS.
    FederatedStandard,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Local => write!(f, "local"),
            TokenKind::FederatedDelegated => write!(f, "federated-delegated"),
            TokenKind::FederatedStandard => write!(f, "federated-standard"),
        }
    }
}

/// A bearer token with its header and payload decoded but not verified.
#[derive(Debug, Clone)]
pub struct InspectedToken<'a> {
    raw: &'a str,
    header: Map<String, Value>,
    payload: Map<String, Value>,
}

impl<'a> InspectedToken<'a> {
    /// Decode the header and payload segments of `raw`.
    ///
    /// Fails with [`AuthError::MalformedToken`] if the token does not have
    /// exactly three segments, a segment is not base64url, or the header or
    /// payload is not a JSON object.
    pub fn parse(raw: &'a str) -> Result<Self, AuthError> {
        let mut segments = raw.split('.');
        let (Some(header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::MalformedToken(
                "expected three dot-separated segments".into(),
            ));
        };

        Ok(Self {
            raw,
            header: decode_segment(header, "header")?,
            payload: decode_segment(payload, "payload")?,
        })
    }

    /// Pick the verification path. Pure: depends only on the token contents.
    pub fn classify(&self, local_issuer: &str) -> TokenKind {
        if self.issuer() == Some(local_issuer) {
            TokenKind::Local
        } else if self.header.contains_key("nonce") {
            TokenKind::FederatedDelegated
        } else {
            TokenKind::FederatedStandard
        }
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn header(&self) -> &Map<String, Value> {
        &self.header
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn into_payload(self) -> Map<String, Value> {
        self.payload
    }

    /// `iss` claim, if present and a string.
    pub fn issuer(&self) -> Option<&str> {
        self.payload.get("iss").and_then(Value::as_str)
    }

    /// `exp` claim as seconds since the epoch, if present and numeric.
    pub fn expiry(&self) -> Option<i64> {
        claim_expiry(&self.payload)
    }
}

/// `exp` of a decoded payload; fractional seconds are floored.
pub fn claim_expiry(payload: &Map<String, Value>) -> Option<i64> {
    payload.get("exp").and_then(|exp| {
        exp.as_i64()
            .or_else(|| exp.as_f64().map(|secs| secs.floor() as i64))
    })
}

fn decode_segment(segment: &str, name: &str) -> Result<Map<String, Value>, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| AuthError::MalformedToken(format!("{name} is not base64url: {e}")))?;

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AuthError::MalformedToken(format!("{name} is not a JSON object"))),
        Err(e) => Err(AuthError::MalformedToken(format!("{name} is not JSON: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testutil::craft_raw_jwt;
    use serde_json::json;

    const LOCAL: &str = "baristacms-local";

    #[test]
    fn local_issuer_wins_regardless_of_header() {
        let token = craft_raw_jwt(
            &json!({ "alg": "HS256", "nonce": "abc", "kid": "whatever" }),
            &json!({ "iss": LOCAL, "aud": LOCAL }),
        );
        let inspected = InspectedToken::parse(&token).unwrap();
        assert_eq!(inspected.classify(LOCAL), TokenKind::Local);
    }

    #[test]
    fn nonce_header_with_foreign_issuer_is_delegated() {
        let token = craft_raw_jwt(
            &json!({ "alg": "RS256", "nonce": "n-0S6_WzA2Mj" }),
            &json!({ "iss": "https://sts.windows.net/tenant/" }),
        );
        let inspected = InspectedToken::parse(&token).unwrap();
        assert_eq!(inspected.classify(LOCAL), TokenKind::FederatedDelegated);
    }

    #[test]
    fn everything_else_is_federated_standard() {
        let token = craft_raw_jwt(
            &json!({ "alg": "RS256", "kid": "k1" }),
            &json!({ "iss": "https://login.microsoftonline.com/tenant/v2.0" }),
        );
        let inspected = InspectedToken::parse(&token).unwrap();
        assert_eq!(inspected.classify(LOCAL), TokenKind::FederatedStandard);

        let no_issuer = craft_raw_jwt(&json!({ "alg": "RS256" }), &json!({ "sub": "x" }));
        let inspected = InspectedToken::parse(&no_issuer).unwrap();
        assert_eq!(inspected.classify(LOCAL), TokenKind::FederatedStandard);
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert!(matches!(
            InspectedToken::parse("a.b"),
            Err(AuthError::MalformedToken(_))
        ));
        assert!(matches!(
            InspectedToken::parse("a.b.c.d"),
            Err(AuthError::MalformedToken(_))
        ));
        assert!(matches!(
            InspectedToken::parse(""),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn rejects_bad_encoding_and_non_object_payload() {
        assert!(matches!(
            InspectedToken::parse("!!!.e30.sig"),
            Err(AuthError::MalformedToken(_))
        ));

        let array_payload = format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(b"[1,2,3]")
        );
        assert!(matches!(
            InspectedToken::parse(&array_payload),
            Err(AuthError::MalformedToken(_))
        ));

        let not_json = format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(b"not json")
        );
        assert!(matches!(
            InspectedToken::parse(&not_json),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn expiry_accepts_integer_and_float() {
        let token = craft_raw_jwt(&json!({ "alg": "none" }), &json!({ "exp": 1700000000 }));
        assert_eq!(InspectedToken::parse(&token).unwrap().expiry(), Some(1700000000));

        let token = craft_raw_jwt(&json!({ "alg": "none" }), &json!({ "exp": 1700000000.9 }));
        assert_eq!(InspectedToken::parse(&token).unwrap().expiry(), Some(1700000000));

        let token = craft_raw_jwt(&json!({ "alg": "none" }), &json!({}));
        assert_eq!(InspectedToken::parse(&token).unwrap().expiry(), None);
    }
}

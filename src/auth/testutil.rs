// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared fixtures for auth tests: token signers, a fake key provider and a
//! manually advanced clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::{json, Value};

use super::error::AuthError;
use super::keys::{Clock, KeyProvider};

pub const TEST_TENANT_ID: &str = "8f1c2a3b-4d5e-6f70-8192-a3b4c5d6e7f8";
pub const TEST_CLIENT_ID: &str = "3e4f5a6b-7c8d-9e0f-1a2b-3c4d5e6f7a8b";

/// Build a `header.payload.` string from arbitrary JSON, with an empty
/// signature segment.
pub fn craft_raw_jwt(header: &Value, payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap());
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
    format!("{header}.{payload}.")
}

/// Sign `claims` with HS256.
pub fn sign_hs256(secret: &[u8], claims: &Value) -> String {
    encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret)).unwrap()
}

/// Deterministic Ed25519 signer standing in for an identity provider key.
pub struct TestSigner {
    kid: String,
    public_key: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl TestSigner {
    pub fn new(seed: u8, kid: &str) -> Self {
        let mut seed_bytes = [0u8; 32];
        seed_bytes[0] = seed;
        for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
            *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes).unwrap();

        // PKCS#8 v1 wrapper around the raw seed.
        let mut pkcs8 = vec![
            0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22,
            0x04, 0x20,
        ];
        pkcs8.extend_from_slice(&seed_bytes);

        Self {
            kid: kid.to_string(),
            public_key: key_pair.public_key().as_ref().to_vec(),
            private_key_pkcs8: pkcs8,
        }
    }

    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(self.kid.clone());
        self.sign_with_header(header, claims)
    }

    pub fn sign_without_kid(&self, claims: &Value) -> String {
        self.sign_with_header(Header::new(Algorithm::EdDSA), claims)
    }

    fn sign_with_header(&self, header: Header, claims: &Value) -> String {
        let key = EncodingKey::from_ed_der(&self.private_key_pkcs8);
        encode(&header, claims, &key).unwrap()
    }

    pub fn jwk_json(&self) -> Value {
        json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "kid": self.kid,
            "x": URL_SAFE_NO_PAD.encode(&self.public_key),
            "alg": "EdDSA",
            "use": "sig",
        })
    }

    pub fn jwk(&self) -> Jwk {
        serde_json::from_value(self.jwk_json()).unwrap()
    }
}

/// In-memory key provider that counts fetches.
pub struct FakeKeyProvider {
    keys: Mutex<Vec<Jwk>>,
    fail: bool,
    fetches: AtomicUsize,
}

impl FakeKeyProvider {
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self {
            keys: Mutex::new(keys),
            fail: false,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn set_keys(&self, keys: Vec<Jwk>) {
        *self.keys.lock().unwrap() = keys;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyProvider for FakeKeyProvider {
    async fn fetch_keys(&self) -> Result<JwkSet, AuthError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AuthError::KeyFetch("connection refused".into()));
        }
        Ok(JwkSet {
            keys: self.keys.lock().unwrap().clone(),
        })
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    start: Instant,
    start_unix: i64,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            start_unix: Utc::now().timestamp(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock().unwrap()
    }

    fn unix_timestamp(&self) -> i64 {
        self.start_unix + self.offset.lock().unwrap().as_secs() as i64
    }
}

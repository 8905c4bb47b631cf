// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Federated signing keys: discovery fetch and process-wide cache.
//!
//! ## Cache rules
//!
//! - Entries expire after a fixed TTL and the map holds at most
//!   `max_entries` keys (LRU eviction).
//! - A miss on a key id fetches the whole JWKS document once.
//! - Discovery fetches are rate limited over a rolling minute.
//! - [`SigningKeySet::invalidate_all`] drops every entry at once. There is no
//!   per-key invalidation; the next lookup repopulates lazily.
//!
//! Concurrent misses may each fetch; the cache does not deduplicate them.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use lru::LruCache;
use url::Url;

use super::error::AuthError;

/// Default key cache TTL (10 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Default number of cached keys.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 5;

/// Default discovery fetches allowed per minute.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 10;

/// Default discovery HTTP timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Time source for cache expiry, rate limiting and expiry checks.
pub trait Clock: Send + Sync {
    /// Monotonic instant.
    fn now(&self) -> Instant;
    /// Wall clock, seconds since the Unix epoch.
    fn unix_timestamp(&self) -> i64;
}

/// The real clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_timestamp(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Source of the identity provider's published key set.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    async fn fetch_keys(&self) -> Result<JwkSet, AuthError>;
}

/// Fetches the JWKS document over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpKeyProvider {
    jwks_url: Url,
    client: reqwest::Client,
}

impl HttpKeyProvider {
    /// Create a provider for `jwks_url`.
    ///
    /// Only `https` is accepted, except plain `http` to `localhost` or
    /// `127.0.0.1`.
    pub fn new(jwks_url: &str, timeout: Duration) -> Result<Self, AuthError> {
        let jwks_url = Url::parse(jwks_url)
            .map_err(|e| AuthError::KeyFetch(format!("invalid JWKS URL: {e}")))?;

        let allowed = match jwks_url.scheme() {
            "https" => true,
            "http" => matches!(jwks_url.host_str(), Some("localhost") | Some("127.0.0.1")),
            _ => false,
        };
        if !allowed {
            return Err(AuthError::KeyFetch(format!(
                "JWKS URL must use https: {jwks_url}"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::KeyFetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { jwks_url, client })
    }

    pub fn jwks_url(&self) -> &Url {
        &self.jwks_url
    }
}

#[async_trait]
impl KeyProvider for HttpKeyProvider {
    async fn fetch_keys(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .client
            .get(self.jwks_url.clone())
            .send()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeyFetch(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))
    }
}

/// A usable verification key.
#[derive(Clone)]
pub struct SigningKey {
    pub kid: String,
    pub key: Arc<DecodingKey>,
    /// Algorithm pinned by the JWK, if it declares one.
    pub algorithm: Option<Algorithm>,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

struct CacheEntry {
    key: SigningKey,
    inserted_at: Instant,
}

/// Process-wide cache of the identity provider's signing keys.
pub struct SigningKeySet {
    provider: Arc<dyn KeyProvider>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    requests_per_minute: u32,
    entries: Mutex<LruCache<String, CacheEntry>>,
    recent_fetches: Mutex<VecDeque<Instant>>,
}

impl SigningKeySet {
    pub fn new(provider: Arc<dyn KeyProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            clock,
            ttl: DEFAULT_CACHE_TTL,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            entries: Mutex::new(LruCache::new(non_zero(DEFAULT_CACHE_MAX_ENTRIES))),
            recent_fetches: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.entries = Mutex::new(LruCache::new(non_zero(max_entries)));
        self
    }

    pub fn with_requests_per_minute(mut self, requests_per_minute: u32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    /// Look up a key by id, fetching the key set on a miss.
    ///
    /// Returns `Ok(None)` when the freshly fetched set does not contain
    /// `kid`. Fetch failures (including the rate limit) are
    /// [`AuthError::KeyFetch`].
    pub async fn get(&self, kid: &str) -> Result<Option<SigningKey>, AuthError> {
        if let Some(key) = self.cached(kid) {
            tracing::debug!(kid, "signing key cache hit");
            return Ok(Some(key));
        }
        tracing::debug!(kid, "signing key cache miss");

        let fetched = self.fetch().await?;

        let mut entries = self.lock_entries();
        let now = self.clock.now();
        let mut wanted = None;
        for key in fetched {
            if key.kid == kid {
                wanted = Some(key);
            } else {
                entries.put(key.kid.clone(), CacheEntry { key, inserted_at: now });
            }
        }
        // Inserted last so capacity eviction never drops the key just asked for.
        if let Some(key) = &wanted {
            entries.put(
                key.kid.clone(),
                CacheEntry {
                    key: key.clone(),
                    inserted_at: now,
                },
            );
        }

        Ok(wanted)
    }

    /// Discard every cached key.
    pub fn invalidate_all(&self) {
        let mut entries = self.lock_entries();
        let dropped = entries.len();
        entries.clear();
        tracing::info!(dropped, "signing key cache invalidated");
    }

    /// Number of live (unexpired) cached keys.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock_entries()
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.inserted_at) < self.ttl)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cached(&self, kid: &str) -> Option<SigningKey> {
        let now = self.clock.now();
        let mut entries = self.lock_entries();
        if let Some(entry) = entries.get(kid) {
            if now.duration_since(entry.inserted_at) < self.ttl {
                return Some(entry.key.clone());
            }
            entries.pop(kid);
        }
        None
    }

    async fn fetch(&self) -> Result<Vec<SigningKey>, AuthError> {
        self.acquire_fetch_slot()?;

        let jwks = self.provider.fetch_keys().await.inspect_err(|e| {
            tracing::warn!(error = %e, "signing key fetch failed");
        })?;

        let keys: Vec<SigningKey> = jwks.keys.iter().filter_map(to_signing_key).collect();
        tracing::info!(
            published = jwks.keys.len(),
            usable = keys.len(),
            "fetched signing keys"
        );
        Ok(keys)
    }

    fn acquire_fetch_slot(&self) -> Result<(), AuthError> {
        let now = self.clock.now();
        let mut recent = self
            .recent_fetches
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        while recent
            .front()
            .is_some_and(|at| now.duration_since(*at) >= RATE_WINDOW)
        {
            recent.pop_front();
        }

        if recent.len() >= self.requests_per_minute as usize {
            tracing::warn!(
                limit = self.requests_per_minute,
                "signing key fetch rate limit exceeded"
            );
            return Err(AuthError::KeyFetch("rate limit exceeded".into()));
        }

        recent.push_back(now);
        Ok(())
    }

    fn lock_entries(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

/// Convert a published JWK to a verification key.
///
/// Keys without a `kid`, encryption keys, and key types the decoder does not
/// understand are skipped.
fn to_signing_key(jwk: &Jwk) -> Option<SigningKey> {
    let kid = jwk.common.key_id.clone()?;

    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        return None;
    }

    let key = match DecodingKey::from_jwk(jwk) {
        Ok(key) => key,
        Err(e) => {
            tracing::debug!(kid, error = %e, "skipping unusable JWK");
            return None;
        }
    };

    let algorithm = jwk.common.key_algorithm.and_then(|alg| match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    });

    Some(SigningKey {
        kid,
        key: Arc::new(key),
        algorithm,
    })
}

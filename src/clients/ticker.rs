//! Ticker lookups against the security catalogue, cached per security id
//! (§4.B/§6). Uses `DashMap` for lock-free concurrent reads the way
//! `api_auth::ts_store` caches per-key nonce state.

use dashmap::DashMap;
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::error::EngineError;

#[derive(Debug, Deserialize)]
struct SecurityResponse {
    ticker: String,
}

struct CacheEntry {
    ticker: String,
    fetched_at: Instant,
}

/// HTTP client for `GET /api/v1/security/{securityId}`, with a TTL cache
/// so a hot security id is only re-resolved once per `ttl`.
pub struct TickerCacheClient {
    http: reqwest::Client,
    base_url: String,
    ttl: Duration,
    cache: DashMap<String, CacheEntry>,
}

impl TickerCacheClient {
    pub fn new(http: reqwest::Client, base_url: String, ttl: Duration) -> Self {
        Self {
            http,
            base_url,
            ttl,
            cache: DashMap::new(),
        }
    }

    /// Resolve a security id to its ticker, serving from cache when the
    /// entry is younger than `ttl`.
    pub async fn resolve(&self, security_id: &str) -> Result<String, EngineError> {
        if let Some(entry) = self.cache.get(security_id) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.ticker.clone());
            }
        }

        let url = format!("{}/api/v1/security/{security_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::CatalogUnavailable { status: status_of(&e) })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::CatalogUnavailable {
                status: status.as_u16(),
            });
        }

        let body: SecurityResponse = response
            .json()
            .await
            .map_err(|_| EngineError::Malformed(format!("bad security response for {security_id}")))?;

        self.cache.insert(
            security_id.to_string(),
            CacheEntry {
                ticker: body.ticker.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(body.ticker)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

fn status_of(err: &reqwest::Error) -> u16 {
    err.status().map(|s| s.as_u16()).unwrap_or(0)
}

//! Offline fallback cache with the same policies the app's service worker
//! applied: cache-first for static assets, network-first with an offline
//! fallback for API payloads and pages. No TTL and no eviction; entries
//! are overwritten on each successful fetch.

use anyhow::Result;
use sled::Db;
use std::future::Future;
use std::path::Path;

/// Served when an API fetch fails and nothing is cached.
pub const OFFLINE_JSON: &[u8] =
    b"{\"offline\":true,\"message\":\"Connexion indisponible, r\xc3\xa9essayez plus tard.\"}";

/// Served when a page fetch fails and nothing is cached.
pub const OFFLINE_HTML: &[u8] = b"<!doctype html><html lang=\"fr\"><head><meta charset=\"utf-8\"><title>Hors ligne</title></head><body><h1>Hors ligne</h1><p>Connexion indisponible, r\xc3\xa9essayez plus tard.</p></body></html>";

/// Where a payload came from, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Network,
    Cache,
    OfflineFallback,
}

pub struct OfflineCache {
    db: Db,
}

impl OfflineCache {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    /// In-memory cache for tests.
    pub fn temporary() -> Result<Self> {
        Ok(Self {
            db: sled::Config::new().temporary(true).open()?,
        })
    }

    fn assets_tree(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree("assets")?)
    }

    fn responses_tree(&self) -> Result<sled::Tree> {
        Ok(self.db.open_tree("responses")?)
    }

    /// Static assets: the cached copy wins; the network is only consulted
    /// on a miss.
    pub async fn cache_first<F, Fut>(&self, key: &str, fetch: F) -> Result<(Vec<u8>, FetchSource)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        let assets = self.assets_tree()?;
        if let Some(cached) = assets.get(key.as_bytes())? {
            return Ok((cached.to_vec(), FetchSource::Cache));
        }

        let bytes = fetch().await?;
        assets.insert(key.as_bytes(), bytes.as_slice())?;
        Ok((bytes, FetchSource::Network))
    }

    /// API payloads and pages: always try the network; on failure fall
    /// back to the last good copy, else to the canned offline payload.
    pub async fn network_first<F, Fut>(
        &self,
        key: &str,
        fallback: &[u8],
        fetch: F,
    ) -> Result<(Vec<u8>, FetchSource)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
    {
        let responses = self.responses_tree()?;
        match fetch().await {
            Ok(bytes) => {
                responses.insert(key.as_bytes(), bytes.as_slice())?;
                Ok((bytes, FetchSource::Network))
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "network fetch failed, serving fallback");
                match responses.get(key.as_bytes())? {
                    Some(cached) => Ok((cached.to_vec(), FetchSource::Cache)),
                    None => Ok((fallback.to_vec(), FetchSource::OfflineFallback)),
                }
            }
        }
    }
}

//! Summary cache over the durable key-value store.
//!
//! Entries expire after a fixed TTL and are purged lazily on read. When the
//! namespace grows past its bound the oldest batch (by write timestamp) is
//! evicted in one pass. Reads never refresh timestamps, so a popular but old
//! entry is evicted exactly like a stale one.
//!
//! Every persistence error is logged and swallowed: a broken store behaves
//! like an empty cache.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::KvStore;
use crate::config::CacheConfig;
use crate::error::StorageError;

/// Milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Hand-driven clock for tests and replay.
#[derive(Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Stored value. Overwritten wholesale, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub summary: String,
    pub timestamp: i64,
}

/// Short cache key for a URL: 32-bit `h * 31 + c` over UTF-16 code units,
/// absolute value in base 36.
pub fn fingerprint(url: &str) -> String {
    let hash = url
        .encode_utf16()
        .fold(0i32, |h, c| h.wrapping_shl(5).wrapping_sub(h).wrapping_add(c as i32));
    to_base36((hash as i64).unsigned_abs())
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".into();
    }
    let mut buf = Vec::with_capacity(7);
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub expired: usize,
}

#[derive(Clone)]
pub struct CacheStore {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl CacheStore {
    pub fn new(store: Arc<dyn KvStore>, config: CacheConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    pub fn with_clock(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn key_for(&self, url: &str) -> String {
        format!("{}{}", self.config.key_prefix, fingerprint(url))
    }

    /// Cached summary for `url`, if present and younger than the TTL.
    /// An expired or unreadable entry is deleted and reported as a miss.
    pub async fn lookup(&self, url: &str) -> Option<String> {
        match self.try_lookup(url).await {
            Ok(hit) => hit,
            Err(e) => {
                log::error!("Cache check error: {}", e);
                None
            }
        }
    }

    async fn try_lookup(&self, url: &str) -> Result<Option<String>, StorageError> {
        let key = self.key_for(url);
        let Some(raw) = self.store.get(&key).await? else {
            log::debug!("Cache MISS: {}", url);
            return Ok(None);
        };

        match serde_json::from_value::<CacheEntry>(raw) {
            Ok(entry) if self.clock.now_ms() - entry.timestamp < self.config.ttl_ms => {
                log::debug!("Cache HIT: {}", url);
                Ok(Some(entry.summary))
            }
            Ok(_) => {
                log::debug!("Cache EXPIRED: {}", url);
                self.store.remove(&[key]).await?;
                Ok(None)
            }
            Err(e) => {
                log::warn!("Dropping unreadable cache entry {}: {}", key, e);
                self.store.remove(&[key]).await?;
                Ok(None)
            }
        }
    }

    /// Write `summary` for `url` stamped with the current time, then enforce
    /// the size bound. Eviction failures never undo the write.
    pub async fn store(&self, url: &str, summary: &str) {
        let entry = CacheEntry {
            summary: summary.to_string(),
            timestamp: self.clock.now_ms(),
        };
        let written = match serde_json::to_value(&entry) {
            Ok(value) => self.store.set(&self.key_for(url), value).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            log::error!("Cache write error: {}", e);
            return;
        }

        if let Err(e) = self.enforce_limit().await {
            log::error!("Cache eviction error: {}", e);
        }
    }

    /// Evict the oldest batch once the namespace exceeds its bound.
    /// Entries without a timestamp sort first. Returns the number removed.
    pub async fn enforce_limit(&self) -> Result<usize, StorageError> {
        let all = self.store.get_all().await?;
        let mut entries: Vec<(String, i64)> = all
            .iter()
            .filter(|(key, _)| key.starts_with(&self.config.key_prefix))
            .map(|(key, value)| (key.clone(), entry_timestamp(value)))
            .collect();

        if entries.len() <= self.config.max_entries {
            return Ok(0);
        }

        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let victims: Vec<String> = entries
            .into_iter()
            .take(self.config.evict_batch)
            .map(|(key, _)| key)
            .collect();

        self.store.remove(&victims).await?;
        log::info!("Evicted {} old cache entries", victims.len());
        Ok(victims.len())
    }

    pub async fn stats(&self) -> Result<CacheStats, StorageError> {
        let now = self.clock.now_ms();
        let all = self.store.get_all().await?;
        let mut stats = CacheStats::default();
        for (_, value) in all.iter().filter(|(k, _)| k.starts_with(&self.config.key_prefix)) {
            stats.entries += 1;
            if now - entry_timestamp(value) >= self.config.ttl_ms {
                stats.expired += 1;
            }
        }
        Ok(stats)
    }

    /// Remove every cache entry, leaving other namespaces untouched.
    pub async fn clear(&self) -> Result<usize, StorageError> {
        let keys: Vec<String> = self
            .store
            .get_all()
            .await?
            .into_keys()
            .filter(|k| k.starts_with(&self.config.key_prefix))
            .collect();
        self.store.remove(&keys).await?;
        Ok(keys.len())
    }
}

fn entry_timestamp(value: &Value) -> i64 {
    value.get("timestamp").and_then(Value::as_i64).unwrap_or(0)
}

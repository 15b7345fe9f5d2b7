use super::{StoredTicket, TicketStore};
use crate::errors::{RecoveryHint, RegistryError, Result};
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tracing::trace;

struct CacheEntry {
    bytes: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

/// Bounded byte cache with per-entry TTL.
///
/// Behaves like a distributed ticket cache: every ticket crosses the
/// transcoder, the least recently used entry is evicted at capacity, and
/// entries vanish once their TTL elapses.
pub struct CacheTicketStore {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl CacheTicketStore {
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| RegistryError::Configuration {
            message: "ticket cache capacity must be positive".to_string(),
            recovery_hint: RecoveryHint::Manual {
                instructions: "set ticket.registry.cache.capacity above zero".to_string(),
            },
        })?;
        Ok(Self {
            entries: Mutex::new(LruCache::new(capacity)),
        })
    }
}

impl std::fmt::Debug for CacheTicketStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("CacheTicketStore")
            .field("len", &entries.len())
            .field("capacity", &entries.cap())
            .finish()
    }
}

#[async_trait]
impl TicketStore for CacheTicketStore {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn is_binary(&self) -> bool {
        true
    }

    async fn put(&self, key: &str, entry: StoredTicket, ttl: Option<Duration>) -> Result<()> {
        let StoredTicket::Encoded(bytes) = entry else {
            return Err(RegistryError::InvalidEntry {
                key: key.to_string(),
                reason: "cache store only holds encoded tickets".to_string(),
                recovery_hint: RecoveryHint::Manual {
                    instructions: "route tickets through the transcoder".to_string(),
                },
            });
        };
        let expires_at = ttl.and_then(|ttl| Instant::now().checked_add(ttl));
        let mut entries = self.entries.lock();
        if let Some((evicted, _)) = entries.push(key.to_string(), CacheEntry { bytes, expires_at }) {
            if evicted != key {
                trace!(key = %evicted, "evicted least recently used ticket");
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredTicket>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => {
                return Ok(Some(StoredTicket::Encoded(entry.bytes.clone())));
            }
            Some(_) => {}
            None => return Ok(None),
        }
        entries.pop(key);
        Ok(None)
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().pop(key).is_some())
    }

    async fn clear(&self) -> Result<usize> {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        Ok(count)
    }

    async fn entries(&self) -> Result<Vec<(String, StoredTicket)>> {
        let now = Instant::now();
        let entries = self.entries.lock();
        Ok(entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, entry)| (key.clone(), StoredTicket::Encoded(entry.bytes.clone())))
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .count())
    }
}

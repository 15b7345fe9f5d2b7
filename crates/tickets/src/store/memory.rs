use super::{StoredTicket, TicketStore};
use crate::errors::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;

/// Concurrent in-process map, the default backend.
///
/// Holds live ticket objects and ignores TTLs; the registry cleaner removes
/// expired tickets.
#[derive(Debug, Default)]
pub struct MemoryTicketStore {
    tickets: DashMap<String, StoredTicket>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_binary(&self) -> bool {
        false
    }

    async fn put(&self, key: &str, entry: StoredTicket, _ttl: Option<Duration>) -> Result<()> {
        self.tickets.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredTicket>> {
        Ok(self.tickets.get(key).map(|entry| entry.value().clone()))
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.tickets.remove(key).is_some())
    }

    async fn clear(&self) -> Result<usize> {
        let count = self.tickets.len();
        self.tickets.clear();
        Ok(count)
    }

    async fn entries(&self) -> Result<Vec<(String, StoredTicket)>> {
        Ok(self
            .tickets
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.tickets.len())
    }
}

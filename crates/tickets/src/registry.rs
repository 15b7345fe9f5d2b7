//! Ticket registry
//!
//! The registry owns ticket semantics on top of a [`TicketStore`]: expiry
//! checks on read (including the granting chain), typed lookups, cascading
//! deletes and the optional encryption of stored tickets.

use crate::cipher::TicketCipher;
use crate::errors::RegistryError;
use crate::store::{
    CacheTicketStore, FileTicketStore, MemoryTicketStore, StoredTicket, TicketStore,
};
use crate::ticket::{ServiceTicket, Ticket, TicketGrantingTicket, TicketKind};
use crate::transcoder::TicketTranscoder;
use cas_config::{TicketRegistryProperties, TicketStoreType};
use cas_core::{Authentication, Error, Result};
use cas_utils::XdgPaths;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on granting chain walks; deeper chains are treated as broken
const MAX_CHAIN_DEPTH: usize = 64;

/// Ticket registry over a pluggable store
pub struct TicketRegistry {
    store: Arc<dyn TicketStore>,
    transcoder: TicketTranscoder,
    cipher: Option<TicketCipher>,
}

impl std::fmt::Debug for TicketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketRegistry")
            .field("store", &self.store.name())
            .field("transcoder", &self.transcoder)
            .field("cipher", &self.cipher)
            .finish()
    }
}

impl Default for TicketRegistry {
    fn default() -> Self {
        Self::new(Arc::new(MemoryTicketStore::new()))
    }
}

impl TicketRegistry {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self {
            store,
            transcoder: TicketTranscoder::default(),
            cipher: None,
        }
    }

    #[must_use]
    pub fn with_cipher(mut self, cipher: TicketCipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    #[must_use]
    pub fn with_transcoder(mut self, transcoder: TicketTranscoder) -> Self {
        self.transcoder = transcoder;
        self
    }

    /// Build the configured store, cipher and transcoder
    pub fn from_properties(properties: &TicketRegistryProperties) -> Result<Self> {
        let store: Arc<dyn TicketStore> = match properties.store {
            TicketStoreType::Memory => Arc::new(MemoryTicketStore::new()),
            TicketStoreType::Cache => Arc::new(CacheTicketStore::new(properties.cache.capacity)?),
            TicketStoreType::File => {
                let directory = properties
                    .file
                    .directory
                    .clone()
                    .unwrap_or_else(XdgPaths::ticket_dir);
                Arc::new(FileTicketStore::new(directory)?)
            }
        };
        let mut registry = Self::new(store)
            .with_transcoder(TicketTranscoder::new(properties.compression_threshold));
        if let Some(cipher) = TicketCipher::from_properties(&properties.crypto)? {
            registry = registry.with_cipher(cipher);
        }
        info!(
            store = registry.store.name(),
            encrypted = registry.cipher.is_some(),
            "ticket registry ready"
        );
        Ok(registry)
    }

    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    pub async fn add_ticket(&self, ticket: impl Into<Ticket>) -> Result<()> {
        let ticket = ticket.into();
        debug!(ticket_id = %ticket.id(), kind = %ticket.kind(), "adding ticket");
        self.write(&ticket).await
    }

    /// Replace the stored state of an existing ticket
    pub async fn update_ticket(&self, ticket: impl Into<Ticket>) -> Result<()> {
        let ticket = ticket.into();
        debug!(ticket_id = %ticket.id(), "updating ticket");
        self.write(&ticket).await
    }

    /// Look up a ticket, evicting it when it or its granting chain expired
    pub async fn get_ticket(&self, id: &str) -> Result<Option<Ticket>> {
        self.get_ticket_at(id, Utc::now()).await
    }

    pub async fn get_ticket_at(&self, id: &str, now: DateTime<Utc>) -> Result<Option<Ticket>> {
        if id.is_empty() {
            return Ok(None);
        }
        let Some(ticket) = self.read(id).await? else {
            return Ok(None);
        };
        if ticket.is_expired_at(now) || self.is_chain_expired(&ticket, now).await? {
            debug!(ticket_id = %id, "ticket expired; removing it from the registry");
            self.store.remove(&self.storage_key(id)).await?;
            return Ok(None);
        }
        Ok(Some(ticket))
    }

    /// Ticket-granting or proxy-granting ticket
    pub async fn get_ticket_granting_ticket(&self, id: &str) -> Result<Option<TicketGrantingTicket>> {
        match self.get_ticket(id).await? {
            None => Ok(None),
            Some(Ticket::TicketGranting(ticket)) => Ok(Some(ticket)),
            Some(other) => Err(type_mismatch(&other, TicketKind::TicketGranting)),
        }
    }

    /// Service or proxy ticket
    pub async fn get_service_ticket(&self, id: &str) -> Result<Option<ServiceTicket>> {
        match self.get_ticket(id).await? {
            None => Ok(None),
            Some(Ticket::Service(ticket)) => Ok(Some(ticket)),
            Some(other) => Err(type_mismatch(&other, TicketKind::Service)),
        }
    }

    pub async fn get_proxy_granting_ticket(&self, id: &str) -> Result<Option<TicketGrantingTicket>> {
        match self.get_ticket(id).await? {
            None => Ok(None),
            Some(Ticket::TicketGranting(ticket)) if ticket.is_proxy_granting() => Ok(Some(ticket)),
            Some(other) => Err(type_mismatch(&other, TicketKind::ProxyGranting)),
        }
    }

    pub async fn get_proxy_ticket(&self, id: &str) -> Result<Option<ServiceTicket>> {
        match self.get_ticket(id).await? {
            None => Ok(None),
            Some(Ticket::Service(ticket)) if ticket.is_proxy() => Ok(Some(ticket)),
            Some(other) => Err(type_mismatch(&other, TicketKind::Proxy)),
        }
    }

    /// Delete a ticket and everything issued from it, returning how many
    /// tickets were removed.
    ///
    /// A proxy-granting ticket is detached from its parent first so the
    /// parent no longer reaches it on logout.
    pub async fn delete_ticket(&self, id: &str) -> Result<usize> {
        if id.is_empty() {
            return Ok(0);
        }
        let Some(ticket) = self.read(id).await? else {
            return Ok(0);
        };
        if let Ticket::TicketGranting(pgt) = &ticket {
            if let Some(parent_id) = pgt.parent_id() {
                self.detach_from_parent(parent_id, pgt.id()).await?;
            }
        }

        let mut pending = vec![id.to_string()];
        let mut seen = HashSet::new();
        let mut count = 0;
        while let Some(next) = pending.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            if let Some(Ticket::TicketGranting(granting)) = self.read(&next).await? {
                pending.extend(granting.services().keys().cloned());
                pending.extend(granting.proxy_granting_tickets().keys().cloned());
                pending.extend(granting.descendant_tickets().iter().cloned());
            }
            if self.store.remove(&self.storage_key(&next)).await? {
                count += 1;
            }
        }
        debug!(ticket_id = %id, removed = count, "deleted ticket");
        Ok(count)
    }

    pub async fn delete_all(&self) -> Result<usize> {
        let count = self.store.clear().await?;
        info!(removed = count, "cleared ticket registry");
        Ok(count)
    }

    /// Every stored ticket, expired or not
    pub async fn tickets(&self) -> Result<Vec<Ticket>> {
        let mut tickets = Vec::new();
        for (key, entry) in self.store.entries().await? {
            match self.decode(&key, entry) {
                Ok(ticket) => tickets.push(ticket),
                Err(e) if e.is_corruption() => {
                    warn!(key = %key, error = %e, "skipping unreadable ticket");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(tickets)
    }

    /// Unexpired ticket-granting tickets, proxy-granting tickets included
    pub async fn session_count(&self) -> Result<usize> {
        let now = Utc::now();
        Ok(self
            .tickets()
            .await?
            .iter()
            .filter(|t| matches!(t, Ticket::TicketGranting(_)) && !t.is_expired_at(now))
            .count())
    }

    /// Unexpired service tickets, proxy tickets included
    pub async fn service_ticket_count(&self) -> Result<usize> {
        let now = Utc::now();
        Ok(self
            .tickets()
            .await?
            .iter()
            .filter(|t| matches!(t, Ticket::Service(_)) && !t.is_expired_at(now))
            .count())
    }

    /// Authentications of a ticket-granting ticket followed by those of its
    /// ancestors, nearest first
    pub async fn chained_authentications(
        &self,
        ticket: &TicketGrantingTicket,
    ) -> Result<Vec<Authentication>> {
        let mut chain = vec![ticket.authentication().clone()];
        let mut parent = ticket.parent_id().map(str::to_string);
        while let Some(parent_id) = parent {
            if chain.len() > MAX_CHAIN_DEPTH {
                break;
            }
            match self.read(&parent_id).await? {
                Some(Ticket::TicketGranting(granting)) => {
                    chain.push(granting.authentication().clone());
                    parent = granting.parent_id().map(str::to_string);
                }
                _ => break,
            }
        }
        Ok(chain)
    }

    /// Whether any granting ancestor is missing or expired
    pub(crate) async fn is_chain_expired(&self, ticket: &Ticket, now: DateTime<Utc>) -> Result<bool> {
        let mut next = ticket.granting_ticket_id().map(str::to_string);
        let mut depth = 0;
        while let Some(id) = next {
            depth += 1;
            if depth > MAX_CHAIN_DEPTH {
                return Ok(true);
            }
            match self.read(&id).await? {
                Some(ancestor) if !ancestor.is_expired_at(now) => {
                    next = ancestor.granting_ticket_id().map(str::to_string);
                }
                _ => return Ok(true),
            }
        }
        Ok(false)
    }

    async fn detach_from_parent(&self, parent_id: &str, pgt_id: &str) -> Result<()> {
        if let Some(Ticket::TicketGranting(mut parent)) = self.read(parent_id).await? {
            if parent.remove_proxy_granting_ticket(pgt_id) {
                self.write(&Ticket::TicketGranting(parent)).await?;
            }
        }
        Ok(())
    }

    fn storage_key(&self, id: &str) -> String {
        match self.cipher {
            Some(_) => TicketCipher::digest_id(id),
            None => id.to_string(),
        }
    }

    async fn write(&self, ticket: &Ticket) -> Result<()> {
        let key = self.storage_key(ticket.id());
        let entry = self.encode(&key, ticket)?;
        let ttl = ticket.expiration_policy().time_to_live();
        self.store.put(&key, entry, ttl).await?;
        Ok(())
    }

    /// Raw read without expiry checks; unreadable entries are evicted
    async fn read(&self, id: &str) -> Result<Option<Ticket>> {
        let key = self.storage_key(id);
        let Some(entry) = self.store.get(&key).await? else {
            return Ok(None);
        };
        match self.decode(&key, entry) {
            Ok(ticket) => Ok(Some(ticket)),
            Err(e) if e.is_corruption() => {
                warn!(ticket_id = %id, error = %e, "evicting unreadable ticket");
                self.store.remove(&key).await?;
                Ok(None)
            }
            Err(e) => {
                warn!(ticket_id = %id, hint = ?e.recovery_hint(), "failed to read ticket");
                Err(e.into())
            }
        }
    }

    fn encode(&self, key: &str, ticket: &Ticket) -> std::result::Result<StoredTicket, RegistryError> {
        if self.cipher.is_none() && !self.store.is_binary() {
            return Ok(StoredTicket::Plain(Box::new(ticket.clone())));
        }
        let bytes = self.transcoder.encode(key, ticket)?;
        match &self.cipher {
            Some(cipher) => Ok(StoredTicket::Encoded(cipher.encode(key, &bytes)?)),
            None => Ok(StoredTicket::Encoded(bytes)),
        }
    }

    fn decode(&self, key: &str, entry: StoredTicket) -> std::result::Result<Ticket, RegistryError> {
        match entry {
            StoredTicket::Plain(ticket) => Ok(*ticket),
            StoredTicket::Encoded(bytes) => match &self.cipher {
                Some(cipher) => {
                    let plain = cipher.decode(key, &bytes)?;
                    self.transcoder.decode(key, &plain)
                }
                None => self.transcoder.decode(key, &bytes),
            },
        }
    }
}

fn type_mismatch(ticket: &Ticket, expected: TicketKind) -> Error {
    Error::TicketType {
        ticket_id: ticket.id().to_string(),
        expected: expected.name(),
        actual: ticket.kind().name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiration::ExpirationPolicy;
    use cas_core::{Principal, Service};
    use chrono::TimeDelta;
    use std::time::Duration;

    fn session(id: &str, policy: ExpirationPolicy) -> TicketGrantingTicket {
        TicketGrantingTicket::new(
            id,
            Authentication::builder(Principal::new("casuser")).build(),
            policy,
        )
    }

    #[tokio::test]
    async fn test_empty_id_is_ignored() {
        let registry = TicketRegistry::default();
        assert!(registry.get_ticket("").await.unwrap().is_none());
        assert_eq!(registry.delete_ticket("").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_child_of_expired_parent_is_evicted() {
        let registry = TicketRegistry::default();
        let mut tgt = session("TGT-1", ExpirationPolicy::timeout(Duration::from_secs(60)));
        let st = tgt.grant_service_ticket(
            "ST-1",
            Service::new("https://app.example.org/"),
            ExpirationPolicy::NeverExpires,
            false,
            true,
        );
        registry.add_ticket(tgt).await.unwrap();
        registry.add_ticket(st).await.unwrap();

        let later = Utc::now() + TimeDelta::seconds(120);
        assert!(registry.get_ticket_at("ST-1", later).await.unwrap().is_none());
        assert!(registry.get_ticket("ST-1").await.unwrap().is_none());
        assert!(registry.get_ticket("TGT-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_orphaned_service_ticket_is_expired() {
        let registry = TicketRegistry::default();
        let mut tgt = session("TGT-1", ExpirationPolicy::NeverExpires);
        let st = tgt.grant_service_ticket(
            "ST-1",
            Service::new("https://app.example.org/"),
            ExpirationPolicy::NeverExpires,
            false,
            true,
        );
        registry.add_ticket(st).await.unwrap();
        assert!(registry.get_ticket("ST-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_typed_lookup_mismatch_is_an_error() {
        let registry = TicketRegistry::default();
        registry
            .add_ticket(session("TGT-1", ExpirationPolicy::NeverExpires))
            .await
            .unwrap();

        let err = registry.get_service_ticket("TGT-1").await.unwrap_err();
        assert!(matches!(err, Error::TicketType { .. }));
        let err = registry.get_proxy_granting_ticket("TGT-1").await.unwrap_err();
        assert!(matches!(err, Error::TicketType { expected: "ProxyGrantingTicket", .. }));
        assert!(registry.get_service_ticket("ST-missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chained_authentications_follow_parents() {
        let registry = TicketRegistry::default();
        let mut tgt = session("TGT-1", ExpirationPolicy::NeverExpires);
        let mut st = tgt.grant_service_ticket(
            "ST-1",
            Service::new("https://proxy.example.org/"),
            ExpirationPolicy::NeverExpires,
            false,
            true,
        );
        let pgt = st
            .grant_proxy_granting_ticket(
                "PGT-1",
                Authentication::builder(Principal::new("https://proxy.example.org/pgt")).build(),
                ExpirationPolicy::NeverExpires,
            )
            .unwrap();
        registry.add_ticket(tgt).await.unwrap();

        let chain = registry.chained_authentications(&pgt).await.unwrap();
        let principals: Vec<&str> = chain.iter().map(|a| a.principal().id()).collect();
        assert_eq!(principals, vec!["https://proxy.example.org/pgt", "casuser"]);
    }
}

//! Pluggable ticket storage backends

mod cache;
mod file;
mod memory;

pub use cache::CacheTicketStore;
pub use file::FileTicketStore;
pub use memory::MemoryTicketStore;

use crate::errors::Result;
use crate::ticket::Ticket;
use async_trait::async_trait;
use std::time::Duration;

/// What a store holds for one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredTicket {
    /// Live ticket object, only accepted by in-process stores
    Plain(Box<Ticket>),
    /// Transcoded (and possibly sealed) bytes
    Encoded(Vec<u8>),
}

/// Storage backend of a ticket registry.
///
/// Stores are key-value maps with no knowledge of ticket semantics; expiry
/// and cascading deletes belong to the registry.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Backend name used in logs and errors
    fn name(&self) -> &'static str;

    /// Whether the backend only holds bytes, as a remote cache would
    fn is_binary(&self) -> bool;

    /// Insert or replace; `ttl` lets the backend drop the entry on its own
    async fn put(&self, key: &str, entry: StoredTicket, ttl: Option<Duration>) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<StoredTicket>>;

    /// Returns whether an entry was removed
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Remove everything, returning how many entries were dropped
    async fn clear(&self) -> Result<usize>;

    /// Snapshot of every live entry
    async fn entries(&self) -> Result<Vec<(String, StoredTicket)>>;

    async fn len(&self) -> Result<usize>;
}

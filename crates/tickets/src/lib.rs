//! Tickets, expiration policies and the ticket registry.
//!
//! ## Layout
//!
//! - **`ticket`**: ticket-granting, proxy-granting, service and proxy tickets
//!   plus id generation.
//! - **`expiration`**: expiration policies and their construction from
//!   configuration.
//! - **`registry`**: the [`TicketRegistry`] with expiry-on-read and cascading
//!   deletes, over one of the [`store`] backends.
//! - **`transcoder`** and **`cipher`**: the byte format of stored tickets.
//! - **`cleaner`** and **`logout`**: background removal of expired sessions and
//!   the single logout requests it produces.

pub mod cipher;
pub mod cleaner;
pub mod errors;
pub mod expiration;
pub mod logout;
pub mod registry;
pub mod store;
pub mod ticket;
pub mod transcoder;

pub use cipher::TicketCipher;
pub use cleaner::{
    AlwaysAcquireLockingStrategy, CleanupReport, InProcessLockingStrategy, LockingStrategy,
    RegistryCleaner,
};
pub use errors::{RecoveryHint, RegistryError};
pub use expiration::{ExpirationPolicy, ExpirationPolicyBuilder, TicketUsage};
pub use logout::{
    DefaultLogoutTypeResolver, LogoutManager, LogoutRequest, LogoutRequestStatus, LogoutType,
    LogoutTypeResolver,
};
pub use registry::TicketRegistry;
pub use store::{CacheTicketStore, FileTicketStore, MemoryTicketStore, StoredTicket, TicketStore};
pub use ticket::{
    ServiceTicket, Ticket, TicketGrantingTicket, TicketIdGenerator, TicketIdGenerators,
    TicketKind, UniqueTicketIdGenerator,
};
pub use transcoder::TicketTranscoder;

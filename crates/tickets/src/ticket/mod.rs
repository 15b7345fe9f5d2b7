//! Ticket model
//!
//! Ticket-granting tickets carry the SSO session; proxy-granting tickets are
//! ticket-granting tickets issued to a proxying service. Service tickets and
//! proxy tickets are one-shot credentials for a relying party. Children refer
//! to their granting ticket by id and the registry resolves the chain.

mod granting;
mod ids;
mod service;

pub use granting::TicketGrantingTicket;
pub use ids::{TicketIdGenerator, TicketIdGenerators, UniqueTicketIdGenerator};
pub use service::ServiceTicket;

use crate::expiration::{ExpirationPolicy, TicketUsage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Concrete ticket kind, used for typed lookups and error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketKind {
    TicketGranting,
    ProxyGranting,
    Service,
    Proxy,
}

impl TicketKind {
    pub const fn name(self) -> &'static str {
        match self {
            TicketKind::TicketGranting => "TicketGrantingTicket",
            TicketKind::ProxyGranting => "ProxyGrantingTicket",
            TicketKind::Service => "ServiceTicket",
            TicketKind::Proxy => "ProxyTicket",
        }
    }

    pub const fn prefix(self) -> &'static str {
        match self {
            TicketKind::TicketGranting => cas_core::TICKET_GRANTING_TICKET_PREFIX,
            TicketKind::ProxyGranting => cas_core::PROXY_GRANTING_TICKET_PREFIX,
            TicketKind::Service => cas_core::SERVICE_TICKET_PREFIX,
            TicketKind::Proxy => cas_core::PROXY_TICKET_PREFIX,
        }
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Any ticket held by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ticket {
    TicketGranting(TicketGrantingTicket),
    Service(ServiceTicket),
}

impl Ticket {
    pub fn id(&self) -> &str {
        match self {
            Ticket::TicketGranting(t) => t.id(),
            Ticket::Service(t) => t.id(),
        }
    }

    pub fn kind(&self) -> TicketKind {
        match self {
            Ticket::TicketGranting(t) if t.is_proxy_granting() => TicketKind::ProxyGranting,
            Ticket::TicketGranting(_) => TicketKind::TicketGranting,
            Ticket::Service(t) if t.is_proxy() => TicketKind::Proxy,
            Ticket::Service(_) => TicketKind::Service,
        }
    }

    pub fn usage(&self) -> &TicketUsage {
        match self {
            Ticket::TicketGranting(t) => t.usage(),
            Ticket::Service(t) => t.usage(),
        }
    }

    pub fn expiration_policy(&self) -> &ExpirationPolicy {
        match self {
            Ticket::TicketGranting(t) => t.expiration_policy(),
            Ticket::Service(t) => t.expiration_policy(),
        }
    }

    /// Id of the ticket-granting ticket this ticket was issued from
    pub fn granting_ticket_id(&self) -> Option<&str> {
        match self {
            Ticket::TicketGranting(t) => t.parent_id(),
            Ticket::Service(t) => Some(t.ticket_granting_ticket_id()),
        }
    }

    /// Whether the ticket itself is expired, ignoring its granting chain
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            Ticket::TicketGranting(t) => t.is_expired_at(now),
            Ticket::Service(t) => t.is_expired_at(now),
        }
    }

    pub fn mark_ticket_expired(&mut self) {
        match self {
            Ticket::TicketGranting(t) => t.mark_ticket_expired(),
            Ticket::Service(t) => t.mark_ticket_expired(),
        }
    }

    pub fn as_ticket_granting(&self) -> Option<&TicketGrantingTicket> {
        match self {
            Ticket::TicketGranting(t) => Some(t),
            Ticket::Service(_) => None,
        }
    }

    pub fn as_service(&self) -> Option<&ServiceTicket> {
        match self {
            Ticket::Service(t) => Some(t),
            Ticket::TicketGranting(_) => None,
        }
    }
}

impl From<TicketGrantingTicket> for Ticket {
    fn from(ticket: TicketGrantingTicket) -> Self {
        Ticket::TicketGranting(ticket)
    }
}

impl From<ServiceTicket> for Ticket {
    fn from(ticket: ServiceTicket) -> Self {
        Ticket::Service(ticket)
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

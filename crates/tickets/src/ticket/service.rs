use super::TicketGrantingTicket;
use crate::expiration::{ExpirationPolicy, TicketUsage};
use cas_core::{Authentication, Error, Result, Service};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Service ticket, or proxy ticket when `proxy` is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTicket {
    id: String,
    usage: TicketUsage,
    expiration_policy: ExpirationPolicy,
    expired: bool,
    ticket_granting_ticket_id: String,
    service: Service,
    from_new_login: bool,
    proxy: bool,
    granted_ticket_already: bool,
}

impl ServiceTicket {
    pub(crate) fn new(
        id: impl Into<String>,
        ticket_granting_ticket_id: String,
        service: Service,
        from_new_login: bool,
        proxy: bool,
        expiration_policy: ExpirationPolicy,
    ) -> Self {
        Self {
            id: id.into(),
            usage: TicketUsage::new(Utc::now()),
            expiration_policy,
            expired: false,
            ticket_granting_ticket_id,
            service,
            from_new_login,
            proxy,
            granted_ticket_already: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn usage(&self) -> &TicketUsage {
        &self.usage
    }

    pub fn expiration_policy(&self) -> &ExpirationPolicy {
        &self.expiration_policy
    }

    pub fn ticket_granting_ticket_id(&self) -> &str {
        &self.ticket_granting_ticket_id
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn is_from_new_login(&self) -> bool {
        self.from_new_login
    }

    pub fn is_proxy(&self) -> bool {
        self.proxy
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expired || self.expiration_policy.is_expired(&self.usage, false, now)
    }

    pub fn mark_ticket_expired(&mut self) {
        self.expired = true;
    }

    /// Count one validation attempt and check the ticket was issued to `service`.
    ///
    /// The use is recorded even when the service does not match, so a
    /// single-use ticket cannot be probed against several services.
    pub fn is_valid_for(&mut self, service: &Service) -> bool {
        self.usage.record_use(Utc::now());
        self.service.matches(service)
    }

    /// Issue a proxy-granting ticket to this ticket's service; allowed once
    pub fn grant_proxy_granting_ticket(
        &mut self,
        id: impl Into<String>,
        authentication: Authentication,
        expiration_policy: ExpirationPolicy,
    ) -> Result<TicketGrantingTicket> {
        if self.granted_ticket_already {
            return Err(Error::ticket_state(
                &self.id,
                "a proxy-granting ticket was already issued from this ticket",
            ));
        }
        self.granted_ticket_already = true;

        Ok(TicketGrantingTicket::proxy_granting(
            id,
            self.ticket_granting_ticket_id.clone(),
            self.service.clone(),
            authentication,
            expiration_policy,
        ))
    }
}

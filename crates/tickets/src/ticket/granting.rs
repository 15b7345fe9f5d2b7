use super::ServiceTicket;
use crate::expiration::{ExpirationPolicy, TicketUsage};
use cas_core::{Authentication, Error, Result, Service};
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ticket-granting ticket, the SSO session of one authenticated principal.
///
/// With `proxied_by` set it is a proxy-granting ticket issued to that service,
/// and `parent_id` names the ticket-granting ticket it descends from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketGrantingTicket {
    id: String,
    usage: TicketUsage,
    expiration_policy: ExpirationPolicy,
    expired: bool,
    authentication: Authentication,
    parent_id: Option<String>,
    proxied_by: Option<Service>,
    /// Service ticket id to the service it was issued for
    services: IndexMap<String, Service>,
    /// Proxy-granting ticket id to the proxying service
    proxy_granting_tickets: IndexMap<String, Service>,
    /// Every ticket ever issued from this one
    descendant_tickets: IndexSet<String>,
}

impl TicketGrantingTicket {
    pub fn new(
        id: impl Into<String>,
        authentication: Authentication,
        expiration_policy: ExpirationPolicy,
    ) -> Self {
        Self::with_time(id, authentication, expiration_policy, Utc::now())
    }

    pub fn with_time(
        id: impl Into<String>,
        authentication: Authentication,
        expiration_policy: ExpirationPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            usage: TicketUsage::new(now),
            expiration_policy,
            expired: false,
            authentication,
            parent_id: None,
            proxied_by: None,
            services: IndexMap::new(),
            proxy_granting_tickets: IndexMap::new(),
            descendant_tickets: IndexSet::new(),
        }
    }

    /// Proxy-granting ticket issued to `proxied_by` on behalf of `parent_id`
    pub(crate) fn proxy_granting(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        proxied_by: Service,
        authentication: Authentication,
        expiration_policy: ExpirationPolicy,
    ) -> Self {
        let mut ticket = Self::new(id, authentication, expiration_policy);
        ticket.parent_id = Some(parent_id.into());
        ticket.proxied_by = Some(proxied_by);
        ticket
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn usage(&self) -> &TicketUsage {
        &self.usage
    }

    pub fn count_of_uses(&self) -> u32 {
        self.usage.count_of_uses
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.usage.creation_time
    }

    pub fn expiration_policy(&self) -> &ExpirationPolicy {
        &self.expiration_policy
    }

    pub fn authentication(&self) -> &Authentication {
        &self.authentication
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn proxied_by(&self) -> Option<&Service> {
        self.proxied_by.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_proxy_granting(&self) -> bool {
        self.proxied_by.is_some()
    }

    pub fn services(&self) -> &IndexMap<String, Service> {
        &self.services
    }

    pub fn proxy_granting_tickets(&self) -> &IndexMap<String, Service> {
        &self.proxy_granting_tickets
    }

    pub fn descendant_tickets(&self) -> &IndexSet<String> {
        &self.descendant_tickets
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Own expiry only; the registry also checks the granting chain
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expired
            || self
                .expiration_policy
                .is_expired(&self.usage, self.authentication.is_remember_me(), now)
    }

    /// Force expiry, e.g. on logout
    pub fn mark_ticket_expired(&mut self) {
        self.expired = true;
    }

    /// Issue a service ticket for `service`.
    ///
    /// The ticket is from a new login when this session has never been used
    /// or the caller re-presented credentials. With
    /// `only_track_most_recent_session`, earlier sessions for the same service
    /// path are forgotten so single logout only reaches the latest one.
    pub fn grant_service_ticket(
        &mut self,
        id: impl Into<String>,
        service: Service,
        expiration_policy: ExpirationPolicy,
        credential_provided: bool,
        only_track_most_recent_session: bool,
    ) -> ServiceTicket {
        let from_new_login = credential_provided || self.usage.count_of_uses == 0;
        let ticket = ServiceTicket::new(
            id,
            self.id.clone(),
            service.clone(),
            from_new_login,
            false,
            expiration_policy,
        );
        self.track_service_session(ticket.id(), service, only_track_most_recent_session);
        ticket
    }

    /// Issue a proxy ticket from this proxy-granting ticket
    pub fn grant_proxy_ticket(
        &mut self,
        id: impl Into<String>,
        service: Service,
        expiration_policy: ExpirationPolicy,
        only_track_most_recent_session: bool,
    ) -> Result<ServiceTicket> {
        if !self.is_proxy_granting() {
            return Err(Error::ticket_state(
                &self.id,
                "only proxy-granting tickets can issue proxy tickets",
            ));
        }
        let ticket = ServiceTicket::new(
            id,
            self.id.clone(),
            service.clone(),
            false,
            true,
            expiration_policy,
        );
        self.track_service_session(ticket.id(), service, only_track_most_recent_session);
        Ok(ticket)
    }

    fn track_service_session(&mut self, ticket_id: &str, service: Service, only_most_recent: bool) {
        self.usage.record_use(Utc::now());

        if only_most_recent {
            let path = service.normalized_path().to_string();
            let before = self.services.len();
            self.services
                .retain(|_, existing| existing.normalized_path() != path);
            if self.services.len() < before {
                debug!(ticket_id = %self.id, service = %path, "replaced earlier session for service");
            }
        }

        self.services.insert(ticket_id.to_string(), service);
        self.descendant_tickets.insert(ticket_id.to_string());
    }

    /// Record a proxy-granting ticket issued from one of this ticket's service tickets
    pub fn track_proxy_granting_ticket(&mut self, id: impl Into<String>, service: Service) {
        let id = id.into();
        self.descendant_tickets.insert(id.clone());
        self.proxy_granting_tickets.insert(id, service);
    }

    pub fn remove_proxy_granting_ticket(&mut self, id: &str) -> bool {
        self.proxy_granting_tickets.shift_remove(id).is_some()
    }

    /// Forget every tracked service session
    pub fn remove_all_services(&mut self) {
        self.services.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas_core::Principal;

    fn authentication() -> Authentication {
        Authentication::builder(Principal::new("casuser")).build()
    }

    fn session() -> TicketGrantingTicket {
        TicketGrantingTicket::new("TGT-1", authentication(), ExpirationPolicy::NeverExpires)
    }

    fn grant(tgt: &mut TicketGrantingTicket, id: &str, url: &str, only_most_recent: bool) -> ServiceTicket {
        tgt.grant_service_ticket(
            id,
            Service::new(url),
            ExpirationPolicy::NeverExpires,
            false,
            only_most_recent,
        )
    }

    #[test]
    fn test_root_and_proxy_granting() {
        let root = session();
        assert!(root.is_root());
        assert!(!root.is_proxy_granting());

        let pgt = TicketGrantingTicket::proxy_granting(
            "PGT-1",
            "TGT-1",
            Service::new("https://proxy.example.org/"),
            authentication(),
            ExpirationPolicy::NeverExpires,
        );
        assert!(!pgt.is_root());
        assert!(pgt.is_proxy_granting());
    }

    #[test]
    fn test_first_service_ticket_is_from_new_login() {
        let mut tgt = session();
        let first = grant(&mut tgt, "ST-1", "https://app.example.org/", true);
        let second = grant(&mut tgt, "ST-2", "https://app.example.org/", true);
        assert!(first.is_from_new_login());
        assert!(!second.is_from_new_login());

        let renewed = tgt.grant_service_ticket(
            "ST-3",
            Service::new("https://app.example.org/"),
            ExpirationPolicy::NeverExpires,
            true,
            true,
        );
        assert!(renewed.is_from_new_login());
    }

    #[test]
    fn test_remove_all_services() {
        let mut tgt = session();
        grant(&mut tgt, "ST-1", "test", true);
        assert_eq!(tgt.services().len(), 1);
        assert_eq!(tgt.services().get("ST-1"), Some(&Service::new("test")));
        tgt.remove_all_services();
        assert!(tgt.services().is_empty());
    }

    #[test]
    fn test_mark_ticket_expired() {
        let mut tgt = session();
        grant(&mut tgt, "ST-1", "test", true);
        assert!(!tgt.is_expired());
        tgt.mark_ticket_expired();
        assert!(tgt.is_expired());
    }

    #[test]
    fn test_same_service_keeps_most_recent_session() {
        let mut tgt = session();
        grant(&mut tgt, "ST-1", "https://app.example.org/", true);
        grant(&mut tgt, "ST-2", "https://app.example.org/", true);
        assert_eq!(tgt.services().len(), 1);
        assert!(tgt.services().contains_key("ST-2"));
    }

    #[test]
    fn test_similar_services_keep_most_recent_session() {
        let mut tgt = session();
        grant(&mut tgt, "ST-1", "http://host.com?test", true);
        grant(&mut tgt, "ST-2", "http://host.com;JSESSIONID=xxx", true);
        assert_eq!(tgt.services().len(), 1);

        let mut tgt = session();
        grant(&mut tgt, "ST-1", "http://host.com/webapp1", true);
        grant(&mut tgt, "ST-2", "http://host.com/webapp1?test=true", true);
        assert_eq!(tgt.services().len(), 1);
    }

    #[test]
    fn test_all_sessions_kept_when_not_restricted() {
        let mut tgt = session();
        grant(&mut tgt, "ST-1", "https://app.example.org/", true);
        grant(&mut tgt, "ST-2", "https://app.example.org/", false);
        assert_eq!(tgt.services().len(), 2);
    }

    #[test]
    fn test_different_services_are_all_tracked() {
        let mut tgt = session();
        grant(&mut tgt, "ST-1", "https://app.example.org/", true);
        grant(&mut tgt, "ST-2", "https://other.example.org/", true);
        assert_eq!(tgt.services().len(), 2);

        let mut tgt = session();
        grant(&mut tgt, "ST-1", "http://host.com/webapp1", true);
        grant(&mut tgt, "ST-2", "http://host.com/webapp2", true);
        assert_eq!(tgt.services().len(), 2);
    }

    #[test]
    fn test_descendants_outlive_replaced_sessions() {
        let mut tgt = session();
        grant(&mut tgt, "ST-1", "https://app.example.org/", true);
        grant(&mut tgt, "ST-2", "https://app.example.org/", true);
        assert_eq!(tgt.descendant_tickets().len(), 2);
    }

    #[test]
    fn test_proxy_ticket_requires_proxy_granting_ticket() {
        let mut tgt = session();
        let result = tgt.grant_proxy_ticket(
            "PT-1",
            Service::new("https://backend.example.org/"),
            ExpirationPolicy::NeverExpires,
            true,
        );
        assert!(result.is_err());
    }
}

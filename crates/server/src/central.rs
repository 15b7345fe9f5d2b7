//! The ticket lifecycle: sessions, service tickets, validation, proxying and
//! logout

use crate::assertion::Assertion;
use cas_config::CasProperties;
use cas_core::{Authentication, Error, Principal, Result, Service};
use cas_services::{
    ensure_principal_access_allowed, ensure_service_access_allowed, RegisteredService,
    ServicesManager,
};
use cas_tickets::{
    ExpirationPolicyBuilder, LogoutManager, LogoutRequest, ServiceTicket, TicketGrantingTicket,
    TicketIdGenerators, TicketKind, TicketRegistry,
};
use cas_utils::tracing::{ticket_created, ticket_destroyed, ticket_span};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn, Instrument};

/// Credential type carried by proxy callback authentications
const PROXY_CALLBACK_CREDENTIAL_TYPE: &str = "HttpBasedServiceCredential";

/// One async mutex per ticket id with live callers.
///
/// Grants read a ticket, change it and write it back; holding the ticket's
/// lock across that sequence keeps concurrent grants on one session from
/// overwriting each other.
#[derive(Debug, Default)]
struct TicketLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TicketLocks {
    async fn lock(&self, id: &str) -> TicketLockGuard<'_> {
        let lock = self.locks.entry(id.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;
        TicketLockGuard {
            locks: &self.locks,
            id: id.to_string(),
            guard: Some(guard),
        }
    }
}

struct TicketLockGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TicketLockGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Entries only go once no other caller holds or awaits the lock.
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[derive(Debug)]
pub struct CentralAuthenticationService {
    registry: Arc<TicketRegistry>,
    services: Arc<ServicesManager>,
    logout: Arc<LogoutManager>,
    ids: TicketIdGenerators,
    expiration: ExpirationPolicyBuilder,
    only_track_most_recent_session: bool,
    locks: TicketLocks,
}

impl CentralAuthenticationService {
    pub fn new(
        registry: Arc<TicketRegistry>,
        services: Arc<ServicesManager>,
        ids: TicketIdGenerators,
        expiration: ExpirationPolicyBuilder,
    ) -> Self {
        let logout = Arc::new(LogoutManager::new(services.clone()));
        Self {
            registry,
            services,
            logout,
            ids,
            expiration,
            only_track_most_recent_session: true,
            locks: TicketLocks::default(),
        }
    }

    #[must_use]
    pub fn with_only_track_most_recent_session(mut self, enabled: bool) -> Self {
        self.only_track_most_recent_session = enabled;
        self
    }

    /// Registry, services and id generation as configured; the service
    /// definitions still have to be loaded
    pub fn from_properties(properties: &CasProperties) -> Result<Self> {
        let registry = Arc::new(TicketRegistry::from_properties(&properties.ticket.registry)?);
        let services = Arc::new(ServicesManager::from_properties(&properties.service_registry));
        Ok(Self::new(
            registry,
            services,
            TicketIdGenerators::from_properties(properties),
            ExpirationPolicyBuilder::new(properties.ticket.clone()),
        )
        .with_only_track_most_recent_session(properties.ticket.tgt.only_track_most_recent_session))
    }

    pub fn registry(&self) -> &Arc<TicketRegistry> {
        &self.registry
    }

    pub fn services(&self) -> &Arc<ServicesManager> {
        &self.services
    }

    pub fn logout_manager(&self) -> &Arc<LogoutManager> {
        &self.logout
    }

    /// Start an SSO session for an authenticated principal.
    ///
    /// When the login targets a service, the principal must be allowed to use it.
    pub async fn create_ticket_granting_ticket(
        &self,
        authentication: Authentication,
        service: Option<&Service>,
    ) -> Result<TicketGrantingTicket> {
        if let Some(service) = service {
            let registered = self.services.find_service_by(service);
            ensure_principal_access_allowed(service, registered.as_ref(), &authentication)?;
        }
        let id = self.ids.new_ticket_id(TicketKind::TicketGranting);
        let ticket = TicketGrantingTicket::new(
            id,
            authentication,
            self.expiration.ticket_granting_ticket(),
        );
        self.registry.add_ticket(ticket.clone()).await?;
        ticket_created(ticket.id(), ticket.authentication().principal().id());
        Ok(ticket)
    }

    /// Issue a service ticket from an existing session.
    ///
    /// `authentication` is the result of a renewed login, if the user
    /// presented credentials again; it must name the session's principal.
    pub async fn grant_service_ticket(
        &self,
        ticket_granting_ticket_id: &str,
        service: &Service,
        authentication: Option<&Authentication>,
    ) -> Result<ServiceTicket> {
        self.issue_service_ticket(ticket_granting_ticket_id, service, authentication)
            .instrument(ticket_span("grant_service_ticket", ticket_granting_ticket_id))
            .await
    }

    async fn issue_service_ticket(
        &self,
        ticket_granting_ticket_id: &str,
        service: &Service,
        authentication: Option<&Authentication>,
    ) -> Result<ServiceTicket> {
        let credential_provided = authentication.is_some();
        let _session = self.locks.lock(ticket_granting_ticket_id).await;
        let mut tgt = self.ticket_granting_ticket(ticket_granting_ticket_id).await?;
        let registered = self.services.find_service_by(service);
        let root = self.root_authentication(&tgt).await?;
        ensure_principal_access_allowed(service, registered.as_ref(), &root)?;

        if let Some(current) = authentication {
            let original = tgt.authentication().principal();
            if current.principal().id() != original.id() {
                warn!(
                    current = %current.principal(),
                    original = %original,
                    "renewed authentication names a different principal"
                );
                return Err(Error::principal_access(
                    current.principal().id(),
                    format!("session belongs to principal '{original}'"),
                ));
            }
        }

        let registered = registered.as_ref().ok_or_else(|| {
            Error::unauthorized_service(service.id(), "service is not found in the service registry")
        })?;
        if !credential_provided
            && tgt.count_of_uses() > 0
            && !registered.access_strategy.is_service_access_allowed_for_sso()
        {
            warn!(service = %service, "service does not take part in single sign-on");
            return Err(Error::UnauthorizedSso {
                service: service.id().to_string(),
            });
        }
        self.ensure_proxied_by_allowed(&tgt)?;

        let id = self.ids.new_ticket_id(TicketKind::Service);
        let ticket = tgt.grant_service_ticket(
            id,
            service.clone(),
            self.expiration.service_ticket(),
            credential_provided,
            self.only_track_most_recent_session,
        );
        self.registry.update_ticket(tgt).await?;
        self.registry.add_ticket(ticket.clone()).await?;
        info!(
            ticket_id = %ticket.id(),
            service = %service,
            principal = %root.principal(),
            "granted service ticket"
        );
        Ok(ticket)
    }

    /// Validate a service or proxy ticket presented by `service`.
    ///
    /// Every validation attempt counts as a use; the ticket is deleted once
    /// that use expires it, whether or not validation succeeded.
    pub async fn validate_service_ticket(
        &self,
        service_ticket_id: &str,
        service: &Service,
    ) -> Result<Assertion> {
        self.consume_service_ticket(service_ticket_id, service)
            .instrument(ticket_span("validate_service_ticket", service_ticket_id))
            .await
    }

    async fn consume_service_ticket(&self, service_ticket_id: &str, service: &Service) -> Result<Assertion> {
        let _ticket = self.locks.lock(service_ticket_id).await;
        let Some(mut ticket) = self.registry.get_service_ticket(service_ticket_id).await? else {
            warn!(ticket_id = %service_ticket_id, "service ticket does not exist");
            return Err(Error::invalid_ticket(
                service_ticket_id,
                "service ticket is not found or has expired",
            ));
        };

        let outcome = self.assert_ticket(&mut ticket, service).await;

        if ticket.is_expired() {
            debug!(ticket_id = %service_ticket_id, "service ticket used up; removing it");
            self.registry.delete_ticket(service_ticket_id).await?;
        } else {
            self.registry.update_ticket(ticket).await?;
        }
        outcome
    }

    async fn assert_ticket(&self, ticket: &mut ServiceTicket, service: &Service) -> Result<Assertion> {
        if !ticket.is_valid_for(service) {
            warn!(
                ticket_id = %ticket.id(),
                issued_for = %ticket.service(),
                presented = %service,
                "service ticket does not match the presented service"
            );
            return Err(Error::ServiceMismatch {
                ticket_id: ticket.id().to_string(),
                service: service.id().to_string(),
            });
        }

        let selected = ticket.service().clone();
        let registered = self.services.find_service_by(&selected);
        ensure_service_access_allowed(&selected, registered.as_ref())?;
        let registered = registered.as_ref().ok_or_else(|| {
            Error::unauthorized_service(selected.id(), "service is not found in the service registry")
        })?;

        let granting = self
            .ticket_granting_ticket(ticket.ticket_granting_ticket_id())
            .await?;
        let chain = self.registry.chained_authentications(&granting).await?;
        let root = chain
            .last()
            .cloned()
            .unwrap_or_else(|| granting.authentication().clone());

        let principal = released_principal(registered, root.principal(), &selected);
        let primary = root.to_builder().set_principal(principal).build();
        ensure_principal_access_allowed(&selected, Some(registered), &primary)?;

        debug!(
            ticket_id = %ticket.id(),
            principal = %primary.principal(),
            attributes = primary.principal().attributes().len(),
            "service ticket validated"
        );
        Ok(Assertion::new(
            primary,
            chain,
            selected,
            ticket.is_from_new_login(),
        ))
    }

    /// Issue a proxy-granting ticket to the service a ticket was validated
    /// for; `authentication` is the authenticated proxy callback
    pub async fn grant_proxy_granting_ticket(
        &self,
        service_ticket_id: &str,
        authentication: Authentication,
    ) -> Result<TicketGrantingTicket> {
        // Service ticket before its granting ticket, the order every caller uses.
        let _ticket = self.locks.lock(service_ticket_id).await;
        let Some(mut ticket) = self.registry.get_service_ticket(service_ticket_id).await? else {
            debug!(ticket_id = %service_ticket_id, "service ticket has expired or cannot be found");
            return Err(Error::invalid_ticket(
                service_ticket_id,
                "service ticket is not found or has expired",
            ));
        };
        let service = ticket.service().clone();
        let registered = self.services.find_service_by(&service);
        ensure_principal_access_allowed(&service, registered.as_ref(), &authentication)?;
        let registered = registered.as_ref().ok_or_else(|| {
            Error::unauthorized_service(service.id(), "service is not found in the service registry")
        })?;
        if !registered.is_allowed_to_proxy() {
            warn!(service = %service, "service attempted to proxy but is not allowed to");
            return Err(Error::unauthorized_service(service.id(), "service is not allowed to proxy"));
        }
        for credential in authentication.credentials() {
            if credential.credential_type == PROXY_CALLBACK_CREDENTIAL_TYPE
                && !registered.proxy_policy.is_allowed_proxy_callback_url(&credential.id)
            {
                warn!(callback = %credential.id, "proxy callback url is not allowed");
                return Err(Error::unauthorized_service(
                    service.id(),
                    format!("proxy callback '{}' is not allowed", credential.id),
                ));
            }
        }

        let parent_id = ticket.ticket_granting_ticket_id().to_string();
        let _session = self.locks.lock(&parent_id).await;
        let mut parent = self.ticket_granting_ticket(&parent_id).await?;
        let id = self.ids.new_ticket_id(TicketKind::ProxyGranting);
        let pgt = ticket.grant_proxy_granting_ticket(
            id,
            authentication,
            self.expiration.proxy_granting_ticket(),
        )?;
        parent.track_proxy_granting_ticket(pgt.id(), service.clone());

        self.registry.update_ticket(parent).await?;
        self.registry.update_ticket(ticket).await?;
        self.registry.add_ticket(pgt.clone()).await?;
        info!(
            ticket_id = %pgt.id(),
            service_ticket = %service_ticket_id,
            service = %service,
            "granted proxy-granting ticket"
        );
        Ok(pgt)
    }

    pub async fn grant_proxy_ticket(
        &self,
        proxy_granting_ticket_id: &str,
        service: &Service,
    ) -> Result<ServiceTicket> {
        let _session = self.locks.lock(proxy_granting_ticket_id).await;
        let Some(mut pgt) = self
            .registry
            .get_proxy_granting_ticket(proxy_granting_ticket_id)
            .await?
        else {
            return Err(Error::invalid_ticket(
                proxy_granting_ticket_id,
                "proxy-granting ticket is not found or has expired",
            ));
        };
        let registered = self.services.find_service_by(service);
        let root = self.root_authentication(&pgt).await?;
        match ensure_principal_access_allowed(service, registered.as_ref(), &root) {
            Ok(()) => {}
            Err(Error::PrincipalAccess { .. }) => {
                return Err(Error::UnauthorizedSso {
                    service: service.id().to_string(),
                })
            }
            Err(e) => return Err(e),
        }
        if registered
            .as_ref()
            .map_or(true, |r| !r.access_strategy.is_service_access_allowed_for_sso())
        {
            return Err(Error::UnauthorizedSso {
                service: service.id().to_string(),
            });
        }
        self.ensure_proxied_by_allowed(&pgt)?;

        let id = self.ids.new_ticket_id(TicketKind::Proxy);
        let ticket = pgt.grant_proxy_ticket(
            id,
            service.clone(),
            self.expiration.proxy_ticket(),
            self.only_track_most_recent_session,
        )?;
        self.registry.update_ticket(pgt).await?;
        self.registry.add_ticket(ticket.clone()).await?;
        info!(
            ticket_id = %ticket.id(),
            service = %service,
            principal = %root.principal(),
            "granted proxy ticket"
        );
        Ok(ticket)
    }

    /// End an SSO session and everything issued from it.
    ///
    /// Returns the single logout requests for the services the session
    /// reached; an unknown or expired session yields none.
    pub async fn destroy_ticket_granting_ticket(
        &self,
        ticket_granting_ticket_id: &str,
    ) -> Result<Vec<LogoutRequest>> {
        let _session = self.locks.lock(ticket_granting_ticket_id).await;
        let Some(mut tgt) = self
            .registry
            .get_ticket_granting_ticket(ticket_granting_ticket_id)
            .await?
        else {
            debug!(
                ticket_id = %ticket_granting_ticket_id,
                "ticket-granting ticket cannot be found in the registry"
            );
            return Ok(Vec::new());
        };
        tgt.mark_ticket_expired();
        let requests = self.logout.perform_logout(&tgt);
        let removed = self.registry.delete_ticket(ticket_granting_ticket_id).await?;
        ticket_destroyed(ticket_granting_ticket_id, removed);
        Ok(requests)
    }

    async fn ticket_granting_ticket(&self, id: &str) -> Result<TicketGrantingTicket> {
        self.registry
            .get_ticket_granting_ticket(id)
            .await?
            .ok_or_else(|| {
                Error::invalid_ticket(id, "ticket-granting ticket is not found or has expired")
            })
    }

    async fn root_authentication(&self, ticket: &TicketGrantingTicket) -> Result<Authentication> {
        let chain = self.registry.chained_authentications(ticket).await?;
        Ok(chain
            .into_iter()
            .last()
            .unwrap_or_else(|| ticket.authentication().clone()))
    }

    /// A proxy-granting ticket only works while its proxying service is
    /// still registered and allowed to proxy
    fn ensure_proxied_by_allowed(&self, ticket: &TicketGrantingTicket) -> Result<()> {
        let Some(proxied_by) = ticket.proxied_by() else {
            return Ok(());
        };
        match self.services.find_service_by(proxied_by) {
            Some(proxying) if proxying.is_allowed_to_proxy() => Ok(()),
            _ => {
                warn!(service = %proxied_by, "proxying service is no longer allowed to proxy");
                Err(Error::unauthorized_service(
                    proxied_by.id(),
                    "service is not allowed to proxy",
                ))
            }
        }
    }
}

/// Principal as seen by the service: its released attributes under the id
/// chosen by the username provider
fn released_principal(
    registered: &RegisteredService,
    principal: &Principal,
    service: &Service,
) -> Principal {
    let attributes = registered.attribute_release_policy.release(principal);
    let id = registered
        .username_attribute_provider
        .resolve_username(principal, service);
    Principal::with_attributes(id, attributes)
}
